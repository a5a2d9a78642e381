use chrono::Utc;

/// Current wall-clock time in milliseconds since the Unix epoch, the unit
/// every persisted timestamp in the cache uses.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
