use anyhow::Result;
use log::{info, warn};
use rusqlite::params;

use crate::{
    cache::timings::{CACHE_KEY_PREFIX, CACHE_TTL_MS},
    models::StoredCache,
    store::KvStore,
    utils::time::now_ms,
};

/// Startup sweep over every `timing_cache_*` key: expired envelopes and
/// unreadable values are deleted, fresh envelopes stay, and legacy
/// untimestamped values stay too since their age cannot be determined.
/// Idempotent, and safe against concurrent saves: a save that lands after
/// the sweep simply recreates its key (last writer wins).
///
/// Returns the number of keys removed.
pub async fn cleanup_expired_caches(kv: &KvStore) -> Result<usize> {
    let cutoff = now_ms() - CACHE_TTL_MS;

    let removed = kv
        .execute(move |conn| {
            let pattern = format!("{}%", CACHE_KEY_PREFIX.replace('_', "\\_"));
            let entries = {
                let mut stmt =
                    conn.prepare("SELECT key, value FROM kv WHERE key LIKE ?1 ESCAPE '\\'")?;
                let mut rows = stmt.query(params![pattern])?;
                let mut entries: Vec<(String, String)> = Vec::new();
                while let Some(row) = rows.next()? {
                    entries.push((row.get(0)?, row.get(1)?));
                }
                entries
            };

            let mut doomed = Vec::new();
            for (key, value) in entries {
                match serde_json::from_str::<StoredCache>(&value) {
                    Ok(StoredCache::Envelope(envelope)) if envelope.cached_at < cutoff => {
                        doomed.push(key);
                    }
                    Ok(StoredCache::Envelope(_)) | Ok(StoredCache::Legacy(_)) => {}
                    Err(err) => {
                        warn!("Deleting unreadable timing cache {key}: {err}");
                        doomed.push(key);
                    }
                }
            }

            let removed = doomed.len();
            for key in doomed {
                conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            }

            Ok(removed)
        })
        .await?;

    if removed > 0 {
        info!("Janitor removed {removed} expired timing cache(s)");
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::reconcile::record_entry;
    use crate::cache::timings::{cache_key, TimingCache, RUNNING_TIMER_KEY};
    use crate::models::{CacheEnvelope, DotColor, TimingEntry, TimingsState};

    fn sample_state() -> TimingsState {
        let mut state = TimingsState::new();
        record_entry(
            &mut state,
            "seg1",
            "Table Topics",
            TimingEntry {
                name: None,
                planned_duration_minutes: 1.0,
                started_at: 0,
                ended_at: 30_000,
                dot_color: DotColor::Gray,
            },
        );
        state
    }

    async fn put_envelope(kv: &KvStore, meeting_id: &str, cached_at: i64) {
        let envelope = CacheEnvelope {
            cached_at,
            timings: sample_state(),
        };
        kv.put(
            &cache_key(meeting_id),
            serde_json::to_string(&envelope).unwrap(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn sweeps_exactly_the_expired_timestamped_keys() {
        let kv = KvStore::in_memory().unwrap();

        put_envelope(&kv, "expired", now_ms() - 25 * 60 * 60 * 1000).await;
        put_envelope(&kv, "fresh", now_ms() - 60 * 60 * 1000).await;
        // Legacy bare state: no timestamp, never swept.
        kv.put(
            &cache_key("legacy"),
            serde_json::to_string(&sample_state()).unwrap(),
        )
        .await
        .unwrap();
        kv.put(&cache_key("corrupt"), "not json at all".into())
            .await
            .unwrap();

        let removed = cleanup_expired_caches(&kv).await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(kv.get(&cache_key("expired")).await.unwrap(), None);
        assert_eq!(kv.get(&cache_key("corrupt")).await.unwrap(), None);
        assert!(kv.get(&cache_key("fresh")).await.unwrap().is_some());
        assert!(kv.get(&cache_key("legacy")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn leaves_unrelated_keys_alone() {
        let kv = KvStore::in_memory().unwrap();
        kv.put(RUNNING_TIMER_KEY, "definitely not a cache".into())
            .await
            .unwrap();

        let removed = cleanup_expired_caches(&kv).await.unwrap();

        assert_eq!(removed, 0);
        assert!(kv.get(RUNNING_TIMER_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn is_idempotent() {
        let kv = KvStore::in_memory().unwrap();
        put_envelope(&kv, "expired", now_ms() - 48 * 60 * 60 * 1000).await;

        assert_eq!(cleanup_expired_caches(&kv).await.unwrap(), 1);
        assert_eq!(cleanup_expired_caches(&kv).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn swept_meeting_loads_as_empty_afterwards() {
        let kv = KvStore::in_memory().unwrap();
        put_envelope(&kv, "m1", now_ms() - 25 * 60 * 60 * 1000).await;

        cleanup_expired_caches(&kv).await.unwrap();

        let cache = TimingCache::new(kv);
        assert!(cache.load("m1").await.is_empty());
    }
}
