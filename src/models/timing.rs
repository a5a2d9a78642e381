use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Status indicator attached to a finished timing by the caller.
/// The cache stores it verbatim and never recomputes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DotColor {
    Gray,
    Green,
    Yellow,
    Red,
    Bell,
}

impl Default for DotColor {
    fn default() -> Self {
        DotColor::Gray
    }
}

/// One completed timing measurement. `name` is None for anonymous slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimingEntry {
    pub name: Option<String>,
    pub planned_duration_minutes: f64,
    pub started_at: i64,
    pub ended_at: i64,
    pub dot_color: DotColor,
}

/// Every timing recorded for one agenda segment of a meeting.
/// `entries` keeps insertion order and is never empty: a segment only
/// exists in the state once it has at least one entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentTiming {
    pub segment_id: String,
    pub segment_type: String,
    pub entries: Vec<TimingEntry>,
}

/// Cached timings for one meeting, keyed by segment id.
pub type TimingsState = HashMap<String, SegmentTiming>;

/// Persisted wrapper around the raw state; `cached_at` drives expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope {
    pub cached_at: i64,
    pub timings: TimingsState,
}

/// The two shapes found on disk: the current timestamped envelope, and the
/// legacy bare state written before envelopes existed. Detection stays at the
/// storage boundary; nothing past the adapter sees this union.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StoredCache {
    Envelope(CacheEnvelope),
    Legacy(TimingsState),
}
