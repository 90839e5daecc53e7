//! Artifact identifiers: `<PREFIX>_<UTC-timestamp>_<8-hex-digest>`.
//!
//! The timestamp gives coarse ordering when ids are sorted lexically; the
//! digest mixes in a random UUID so two ids minted in the same instant differ.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::hash::sha256_hex;

pub const ID_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%6fZ";

pub fn artifact_id(prefix: &str, at: DateTime<Utc>) -> String {
    let stamp = at.format(ID_TIMESTAMP_FORMAT).to_string();
    let digest = sha256_hex(format!("{}:{}:{}", prefix, stamp, Uuid::new_v4()));
    format!("{}_{}_{}", prefix, stamp, &digest[..8])
}

/// Split an id into `(prefix, timestamp, digest)` if it has the expected shape.
pub fn parse_artifact_id(id: &str) -> Option<(&str, &str, &str)> {
    let mut parts = id.rsplitn(3, '_');
    let digest = parts.next()?;
    let stamp = parts.next()?;
    let prefix = parts.next()?;
    let digest_ok = digest.len() == 8 && digest.chars().all(|c| c.is_ascii_hexdigit());
    let stamp_ok = stamp.ends_with('Z') && stamp.contains('T');
    (digest_ok && stamp_ok && !prefix.is_empty()).then_some((prefix, stamp, digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn id_has_prefix_timestamp_and_digest() {
        let id = artifact_id("TRD", Utc::now());
        let (prefix, stamp, digest) = parse_artifact_id(&id).unwrap();
        assert_eq!(prefix, "TRD");
        assert!(stamp.ends_with('Z'));
        assert_eq!(digest.len(), 8);
    }

    #[test]
    fn ids_minted_at_the_same_instant_are_unique() {
        let now = Utc::now();
        let ids: HashSet<String> = (0..500).map(|_| artifact_id("RCP", now)).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn ids_sort_by_time() {
        let earlier = artifact_id("MET", Utc::now() - chrono::Duration::seconds(5));
        let later = artifact_id("MET", Utc::now());
        assert!(earlier < later);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(parse_artifact_id("nonsense").is_none());
        assert!(parse_artifact_id("TRD_20250101T000000Z_xyz").is_none());
    }
}
