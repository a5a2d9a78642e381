pub mod timing;

pub use timing::{CacheEnvelope, DotColor, SegmentTiming, StoredCache, TimingEntry, TimingsState};
