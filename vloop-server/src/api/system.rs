//! System status for the operator dashboard

use axum::{extract::State, Json};
use chrono::Utc;
use std::net::IpAddr;
use tokio::net::UdpSocket;
use tracing::debug;
use vloop_common::api::SystemStatus;

use crate::AppState;

/// GET /api/system/status
pub async fn status(State(state): State<AppState>) -> Json<SystemStatus> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(SystemStatus {
        online: true,
        uptime: uptime.num_seconds().max(0) as u64,
        local_ips: local_ips().await,
        devices_online: state.service.online_device_count().await,
    })
}

/// The non-loopback IPv4 address devices can use to reach this host.
///
/// Only the address of the interface carrying the default route is
/// reported, not every interface. Connecting a UDP socket sends nothing; it
/// only makes the OS pick the outbound interface. Empty when the host has no
/// route.
async fn local_ips() -> Vec<String> {
    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(socket) => socket,
        Err(err) => {
            debug!("Cannot bind UDP socket for address lookup: {}", err);
            return Vec::new();
        }
    };
    if let Err(err) = socket.connect("192.0.2.1:9").await {
        debug!("No outbound route: {}", err);
        return Vec::new();
    }

    match socket.local_addr().map(|addr| addr.ip()) {
        Ok(ip @ IpAddr::V4(v4)) if !v4.is_loopback() && !v4.is_unspecified() => {
            vec![ip.to_string()]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_ips_reports_at_most_the_primary_ipv4() {
        let ips = local_ips().await;
        assert!(ips.len() <= 1);
        for ip in ips {
            let addr: IpAddr = ip.parse().unwrap();
            match addr {
                IpAddr::V4(v4) => assert!(!v4.is_loopback() && !v4.is_unspecified()),
                IpAddr::V6(_) => panic!("unexpected IPv6 address {}", addr),
            }
        }
    }
}
