pub mod janitor;
pub mod reconcile;
pub mod timings;

pub use janitor::cleanup_expired_caches;
pub use timings::{TimingCache, CACHE_TTL_MS};
