//! Pure helpers over a meeting's cached timing state. No I/O here.

use crate::models::{SegmentTiming, TimingEntry, TimingsState};

/// Total number of cached entries across every segment. Drives the
/// "you have N unsaved timings" affordance.
pub fn unsaved_count(state: &TimingsState) -> usize {
    state.values().map(|segment| segment.entries.len()).sum()
}

/// Whether a segment has anything cached. A segment key is only ever
/// present once it holds at least one entry, so presence is enough.
pub fn has_unsaved(state: &TimingsState, segment_id: &str) -> bool {
    state.contains_key(segment_id)
}

/// The one insertion path into the state. Creates the segment lazily on
/// its first entry, so an empty entries vector never exists.
pub fn record_entry(
    state: &mut TimingsState,
    segment_id: &str,
    segment_type: &str,
    entry: TimingEntry,
) {
    state
        .entry(segment_id.to_string())
        .or_insert_with(|| SegmentTiming {
            segment_id: segment_id.to_string(),
            segment_type: segment_type.to_string(),
            entries: Vec::new(),
        })
        .entries
        .push(entry);
}
