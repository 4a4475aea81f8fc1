//! Id utilities
//!
//! Ids are opaque strings on the wire. New ids are UUIDv4 text, so an id is
//! never handed out twice even after the entity it named is deleted.

use uuid::Uuid;

/// Generate a new entity id
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_generate_is_uuid_text() {
        assert!(Uuid::parse_str(&generate()).is_ok());
    }
}
