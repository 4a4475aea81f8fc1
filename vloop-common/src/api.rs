//! API request/response types shared by the server and playback devices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// POST /api/profiles body
///
/// Without `id` a new profile is created. With `id` the existing profile is
/// updated: `name` only if non-empty, `videoIds` only if present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_ids: Option<Vec<String>>,
}

/// Generic acknowledgement body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// POST /api/profiles/:id/heartbeat response
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub success: bool,
    pub last_seen: DateTime<Utc>,
}

/// GET /api/system/status response
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub online: bool,
    /// Seconds since the server started
    pub uptime: u64,
    pub local_ips: Vec<String>,
    /// Profiles with a heartbeat inside [`crate::time::ONLINE_WINDOW`]
    #[serde(default)]
    pub devices_online: usize,
}

/// GET /health response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_request_create_shape() {
        let req: UpsertProfileRequest =
            serde_json::from_str(r#"{"name":"Lobby","videoIds":["a","b"]}"#).unwrap();
        assert!(req.id.is_none());
        assert_eq!(req.name, "Lobby");
        assert_eq!(req.video_ids.unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_upsert_request_missing_fields() {
        let req: UpsertProfileRequest = serde_json::from_str(r#"{"id":"p1"}"#).unwrap();
        assert_eq!(req.id.as_deref(), Some("p1"));
        assert!(req.name.is_empty());
        assert!(req.video_ids.is_none());
    }

    #[test]
    fn test_system_status_camel_case() {
        let status = SystemStatus {
            online: true,
            uptime: 12,
            local_ips: vec!["192.168.1.20".to_string()],
            devices_online: 2,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["localIps"][0], "192.168.1.20");
        assert_eq!(json["devicesOnline"], 2);
        assert_eq!(json["uptime"], 12);
    }
}
