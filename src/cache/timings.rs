use log::{info, warn};

use crate::{
    cache::reconcile::record_entry,
    models::{CacheEnvelope, StoredCache, TimingEntry, TimingsState},
    store::KvStore,
    timer::{RunningTimer, StoredRunningTimer},
    utils::time::now_ms,
};

/// One durable key per meeting, plus the single session-wide timer slot.
pub const CACHE_KEY_PREFIX: &str = "timing_cache_";
pub const RUNNING_TIMER_KEY: &str = "running_timer";

/// Envelopes older than this are treated as absent. Fixed, not configurable.
pub const CACHE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

pub fn cache_key(meeting_id: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{meeting_id}")
}

/// Persistence is best effort throughout: every public method collapses
/// storage failures to an empty/none result and a log line. Losing the
/// cache means the user re-times a speech, never a hard error.
#[derive(Clone)]
pub struct TimingCache {
    kv: KvStore,
}

impl TimingCache {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    /// Cached timings for a meeting. Absent, corrupt, or expired data all
    /// come back as an empty state; an expired envelope additionally has
    /// its key deleted. Legacy untimestamped payloads are returned as-is
    /// with no expiry applied (their age is unknowable).
    pub async fn load(&self, meeting_id: &str) -> TimingsState {
        let key = cache_key(meeting_id);
        let raw = match self.kv.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return TimingsState::new(),
            Err(err) => {
                warn!("Failed to read timing cache for meeting {meeting_id}: {err:#}");
                return TimingsState::new();
            }
        };

        match serde_json::from_str::<StoredCache>(&raw) {
            Ok(StoredCache::Envelope(envelope)) => {
                if now_ms() - envelope.cached_at > CACHE_TTL_MS {
                    info!("Timing cache for meeting {meeting_id} expired; dropping it");
                    if let Err(err) = self.kv.delete(&key).await {
                        warn!("Failed to drop expired timing cache {key}: {err:#}");
                    }
                    TimingsState::new()
                } else {
                    envelope.timings
                }
            }
            Ok(StoredCache::Legacy(state)) => state,
            Err(err) => {
                warn!("Unreadable timing cache for meeting {meeting_id}: {err}");
                TimingsState::new()
            }
        }
    }

    /// Writes the state under a fresh envelope. An empty state deletes the
    /// key instead, so cleared meetings leave nothing behind.
    pub async fn save(&self, meeting_id: &str, state: &TimingsState) {
        let key = cache_key(meeting_id);

        if state.is_empty() {
            if let Err(err) = self.kv.delete(&key).await {
                warn!("Failed to remove empty timing cache {key}: {err:#}");
            }
            return;
        }

        let envelope = CacheEnvelope {
            cached_at: now_ms(),
            timings: state.clone(),
        };

        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Failed to serialize timing cache for meeting {meeting_id}: {err}");
                return;
            }
        };

        if let Err(err) = self.kv.put(&key, payload).await {
            warn!("Failed to persist timing cache for meeting {meeting_id}: {err:#}");
        }
    }

    /// Drops a meeting's cache, e.g. after a successful remote batch save.
    pub async fn clear(&self, meeting_id: &str) {
        let key = cache_key(meeting_id);
        if let Err(err) = self.kv.delete(&key).await {
            warn!("Failed to clear timing cache {key}: {err:#}");
        }
    }

    /// Appends one finished timing as a single atomic read-modify-write on
    /// the store thread. Two callers landing in the same tick cannot clobber
    /// each other here the way separate load/save calls could. The segment
    /// is created on its first entry, so empty entry vectors never exist.
    pub async fn append_entry(
        &self,
        meeting_id: &str,
        segment_id: &str,
        segment_type: &str,
        entry: TimingEntry,
    ) {
        let key = cache_key(meeting_id);
        let segment_id = segment_id.to_string();
        let segment_type = segment_type.to_string();

        let result = self
            .kv
            .update(&key, move |current| {
                let mut state = match current.map(|raw| serde_json::from_str::<StoredCache>(&raw)) {
                    Some(Ok(StoredCache::Envelope(envelope))) => envelope.timings,
                    Some(Ok(StoredCache::Legacy(state))) => state,
                    Some(Err(_)) | None => TimingsState::new(),
                };

                record_entry(&mut state, &segment_id, &segment_type, entry);

                let envelope = CacheEnvelope {
                    cached_at: now_ms(),
                    timings: state,
                };
                Ok(Some(serde_json::to_string(&envelope)?))
            })
            .await;

        if let Err(err) = result {
            warn!("Failed to append timing entry for meeting {meeting_id}: {err:#}");
        }
    }

    /// The single running-timer slot, filtered to one meeting. A slot tagged
    /// for another meeting is treated as absent; so is anything unreadable.
    pub async fn load_running_timer(&self, meeting_id: &str) -> Option<RunningTimer> {
        let raw = match self.kv.get(RUNNING_TIMER_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("Failed to read running timer slot: {err:#}");
                return None;
            }
        };

        match serde_json::from_str::<StoredRunningTimer>(&raw) {
            Ok(stored) if stored.meeting_id == meeting_id => Some(stored.timer),
            Ok(_) => None,
            Err(err) => {
                warn!("Unreadable running timer slot: {err}");
                None
            }
        }
    }

    /// `None` clears the slot; `Some` overwrites it whole. The store does
    /// not check what was there before; keeping a second timer from starting
    /// is the owner's job.
    pub async fn save_running_timer(&self, meeting_id: &str, timer: Option<&RunningTimer>) {
        match timer {
            None => self.clear_running_timer().await,
            Some(timer) => {
                let stored = StoredRunningTimer {
                    meeting_id: meeting_id.to_string(),
                    timer: timer.clone(),
                };

                let payload = match serde_json::to_string(&stored) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!("Failed to serialize running timer: {err}");
                        return;
                    }
                };

                if let Err(err) = self.kv.put(RUNNING_TIMER_KEY, payload).await {
                    warn!("Failed to persist running timer: {err:#}");
                }
            }
        }
    }

    pub async fn clear_running_timer(&self) {
        if let Err(err) = self.kv.delete(RUNNING_TIMER_KEY).await {
            warn!("Failed to clear running timer slot: {err:#}");
        }
    }
}
