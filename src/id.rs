//! Timestamp and key helpers
//!
//! Provides timestamps for checkpoints and journal entries and the content-derived
//! deduplication key used for auto-spawned work.

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Current time as an RFC 3339 / ISO 8601 string with second precision
///
/// Example: `2026-01-17T09:30:00Z`
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Deduplication key for a piece of discovered work.
///
/// The title is whitespace-collapsed and lowercased, touches are sorted and
/// deduplicated, so cosmetic differences in a report do not produce a new key.
///
/// Format: 16 hex chars (first 8 bytes of SHA-256)
pub fn dedup_key(title: &str, touches: &[String]) -> String {
    let normalized_title = title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

    let mut sorted: Vec<&str> = touches.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(normalized_title.as_bytes());
    for touch in sorted {
        hasher.update(b"\0");
        hasher.update(touch.as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
