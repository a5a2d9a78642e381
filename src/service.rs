use std::path::PathBuf;

use anyhow::{anyhow, Result};
use log::warn;

use crate::{
    cache::{cleanup_expired_caches, TimingCache},
    store::KvStore,
    timer::TimerOwner,
};

/// Entry point that wires the subsystem together: opens the durable store,
/// runs the janitor sweep once, and hands out cache handles and per-meeting
/// timer owners.
pub struct TimingService {
    kv: KvStore,
    cache: TimingCache,
}

impl TimingService {
    pub fn default_data_dir() -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("gaveltime"))
    }

    pub fn default_db_path() -> Result<PathBuf> {
        Ok(Self::default_data_dir()?.join("timing_cache.sqlite3"))
    }

    /// Opens the store at `db_path`. If the database cannot be opened the
    /// cache degrades to an in-memory store for this session instead of
    /// failing; timings just won't survive a restart.
    pub async fn open(db_path: PathBuf) -> Result<Self> {
        let kv = match KvStore::new(db_path) {
            Ok(kv) => kv,
            Err(err) => {
                warn!("Falling back to in-memory timing store: {err:#}");
                KvStore::in_memory()?
            }
        };

        if let Err(err) = cleanup_expired_caches(&kv).await {
            warn!("Timing cache janitor sweep failed: {err:#}");
        }

        Ok(Self {
            cache: TimingCache::new(kv.clone()),
            kv,
        })
    }

    pub async fn open_default() -> Result<Self> {
        Self::open(Self::default_db_path()?).await
    }

    pub fn cache(&self) -> TimingCache {
        self.cache.clone()
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    pub async fn attach_timer(&self, meeting_id: impl Into<String>) -> TimerOwner {
        TimerOwner::attach(self.cache.clone(), meeting_id).await
    }
}
