//! Timing cache core for club meetings: durable per-meeting caching of
//! speech timings, a single session-wide running-timer slot, reconciliation
//! helpers over the cached state, and a startup janitor that evicts caches
//! older than 24 hours.
//!
//! Persistence is best effort. Storage failures are logged and collapse to
//! empty results; losing the cache means a speech gets re-timed, nothing
//! worse. Timings already committed to the remote API are never touched.

pub mod cache;
pub mod models;
pub mod service;
pub mod store;
pub mod timer;
pub mod utils;

pub use cache::{cleanup_expired_caches, TimingCache, CACHE_TTL_MS};
pub use models::{CacheEnvelope, DotColor, SegmentTiming, TimingEntry, TimingsState};
pub use service::TimingService;
pub use store::KvStore;
pub use timer::{RunningTimer, TimerObserver, TimerOwner, TimerSnapshot};
pub use utils::logging;
