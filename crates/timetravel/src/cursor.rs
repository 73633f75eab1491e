//! Cursor-based pagination for range scans (§4.8: "cursor encodes
//! `(last_modified_at, last_version, last_id)`").

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use oms_core::{Timestamp, Version};

/// Opaque position marker for resuming a range scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    /// `modified_at` of the last row returned.
    pub last_modified_at: Timestamp,
    /// `version` of the last row returned.
    pub last_version: Version,
    /// `entity_id` of the last row returned.
    pub last_id: String,
}

impl Cursor {
    /// Base64-encode as `<rfc3339>|<version>|<id>`.
    pub fn encode(&self) -> String {
        let raw = format!("{}|{}|{}", self.last_modified_at.to_rfc3339(), self.last_version.get(), self.last_id);
        BASE64.encode(raw)
    }

    /// Decode a token produced by [`Self::encode`].
    pub fn decode(token: &str) -> Option<Cursor> {
        let raw = BASE64.decode(token).ok()?;
        let raw = String::from_utf8(raw).ok()?;
        let mut parts = raw.splitn(3, '|');
        let ts = parts.next()?;
        let version = parts.next()?;
        let id = parts.next()?;
        Some(Cursor {
            last_modified_at: Timestamp::from_rfc3339(ts).ok()?,
            last_version: Version::new(version.parse().ok()?),
            last_id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cursor = Cursor {
            last_modified_at: Timestamp::from_rfc3339("2026-01-01T00:00:00Z").unwrap(),
            last_version: Version::new(3),
            last_id: "Asset".to_string(),
        };
        let token = cursor.encode();
        assert_eq!(Cursor::decode(&token), Some(cursor));
    }

    #[test]
    fn rejects_garbage_token() {
        assert_eq!(Cursor::decode("not-base64!!"), None);
    }
}
