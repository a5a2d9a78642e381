use serde::{Deserialize, Serialize};

/// The session-wide running timer as callers see it. The store records the
/// start instant only; elapsed time is always reconciled against the wall
/// clock, never ticked into storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunningTimer {
    pub segment_id: String,
    pub is_running: bool,
    pub started_at: Option<i64>,
    pub speaker_name: String,
}

impl RunningTimer {
    pub fn begin(segment_id: String, speaker_name: String, now_ms: i64) -> Self {
        Self {
            segment_id,
            is_running: true,
            started_at: Some(now_ms),
            speaker_name,
        }
    }

    /// Wall-clock reconciliation for a timer loaded after a remount or
    /// navigation. Zero when not running or when no start was recorded.
    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        match (self.is_running, self.started_at) {
            (true, Some(started_at)) => (now_ms - started_at).max(0),
            _ => 0,
        }
    }

    pub fn finish(&mut self) {
        self.is_running = false;
    }
}

/// On-disk shape of the single `running_timer` slot: the timer plus the
/// meeting it belongs to. The tag is what gives cross-meeting isolation;
/// there is deliberately only one slot in the whole store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRunningTimer {
    pub meeting_id: String,
    #[serde(flatten)]
    pub timer: RunningTimer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_reconciled_from_start_instant() {
        let timer = RunningTimer::begin("seg1".into(), "Bob".into(), 5_000);
        assert_eq!(timer.elapsed_ms(65_000), 60_000);
        // A clock that moved backwards never yields a negative elapsed.
        assert_eq!(timer.elapsed_ms(1_000), 0);
    }

    #[test]
    fn elapsed_is_zero_once_finished() {
        let mut timer = RunningTimer::begin("seg1".into(), "Bob".into(), 5_000);
        timer.finish();
        assert_eq!(timer.elapsed_ms(65_000), 0);
    }

    #[test]
    fn stored_slot_flattens_the_meeting_tag() {
        let stored = StoredRunningTimer {
            meeting_id: "m1".into(),
            timer: RunningTimer::begin("seg1".into(), "Bob".into(), 5_000),
        };

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["meetingId"], "m1");
        assert_eq!(json["segmentId"], "seg1");
        assert_eq!(json["isRunning"], true);
        assert_eq!(json["startedAt"], 5_000);
        assert_eq!(json["speakerName"], "Bob");
    }
}
