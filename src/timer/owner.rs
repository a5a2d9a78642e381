use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::info;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    cache::TimingCache,
    models::{DotColor, TimingEntry},
    utils::time::now_ms,
};

use super::RunningTimer;

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub timer: Option<RunningTimer>,
    pub elapsed_ms: i64,
}

/// Callback invoked whenever the owner changes the timer. Replaces direct
/// UI event emission so observers can be anything that renders or logs.
pub trait TimerObserver: Send + Sync {
    fn timer_changed(&self, snapshot: &TimerSnapshot);
}

/// Owns the running timer for one meeting and enforces the contract the
/// store itself does not: at most one timer runs at a time. The persisted
/// slot just mirrors whatever the owner writes; `start` is where a second
/// concurrent timer gets rejected.
#[derive(Clone)]
pub struct TimerOwner {
    meeting_id: String,
    cache: TimingCache,
    state: Arc<Mutex<Option<RunningTimer>>>,
    observers: Arc<Mutex<Vec<Box<dyn TimerObserver>>>>,
}

impl TimerOwner {
    /// Attaches to a meeting, re-adopting any timer persisted for it so a
    /// running measurement survives remounts and navigation. The slot holds
    /// only the start instant; elapsed time is recomputed from the clock.
    pub async fn attach(cache: TimingCache, meeting_id: impl Into<String>) -> Self {
        let meeting_id = meeting_id.into();
        let persisted = cache.load_running_timer(&meeting_id).await;

        if let Some(timer) = &persisted {
            info!(
                "Re-adopted running timer for meeting {meeting_id} (segment {}, {} ms elapsed)",
                timer.segment_id,
                timer.elapsed_ms(now_ms())
            );
        }

        Self {
            meeting_id,
            cache,
            state: Arc::new(Mutex::new(persisted)),
            observers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    pub async fn add_observer(&self, observer: Box<dyn TimerObserver>) {
        self.observers.lock().await.push(observer);
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let guard = self.state.lock().await;
        snapshot_of(&guard)
    }

    /// Starts timing a speaker. Fails if a timer is already active, either
    /// in this owner or persisted in the slot by another view of the
    /// session; callers must stop or reset it first.
    pub async fn start(
        &self,
        segment_id: impl Into<String>,
        speaker_name: impl Into<String>,
    ) -> Result<RunningTimer> {
        let timer = {
            let mut guard = self.state.lock().await;
            if guard.as_ref().is_some_and(|t| t.is_running) {
                return Err(anyhow!("timer already running"));
            }
            if self
                .cache
                .load_running_timer(&self.meeting_id)
                .await
                .is_some_and(|t| t.is_running)
            {
                return Err(anyhow!("timer already running"));
            }

            let timer = RunningTimer::begin(segment_id.into(), speaker_name.into(), now_ms());
            *guard = Some(timer.clone());
            timer
        };

        self.cache
            .save_running_timer(&self.meeting_id, Some(&timer))
            .await;
        self.notify().await;

        Ok(timer)
    }

    /// Stops the timer and appends the finished measurement to the meeting
    /// cache in one atomic store update. The dot color comes from the
    /// caller; the cache never recomputes it.
    pub async fn stop_and_record(
        &self,
        segment_type: &str,
        name: Option<String>,
        planned_duration_minutes: f64,
        dot_color: DotColor,
    ) -> Result<TimingEntry> {
        let ended_at = now_ms();

        let (segment_id, entry) = {
            let mut guard = self.state.lock().await;
            let timer = guard.take().ok_or_else(|| anyhow!("no timer to stop"))?;

            let started_at = timer.started_at.unwrap_or(ended_at);
            let entry = TimingEntry {
                name,
                planned_duration_minutes,
                started_at,
                ended_at: ended_at.max(started_at),
                dot_color,
            };
            (timer.segment_id, entry)
        };

        self.cache
            .append_entry(&self.meeting_id, &segment_id, segment_type, entry.clone())
            .await;
        self.cache.clear_running_timer().await;
        self.notify().await;

        Ok(entry)
    }

    /// Abandons the timer without recording anything.
    pub async fn reset(&self) {
        {
            let mut guard = self.state.lock().await;
            *guard = None;
        }
        self.cache.clear_running_timer().await;
        self.notify().await;
    }

    async fn notify(&self) {
        let snapshot = {
            let guard = self.state.lock().await;
            snapshot_of(&guard)
        };
        for observer in self.observers.lock().await.iter() {
            observer.timer_changed(&snapshot);
        }
    }
}

fn snapshot_of(state: &Option<RunningTimer>) -> TimerSnapshot {
    TimerSnapshot {
        elapsed_ms: state.as_ref().map_or(0, |t| t.elapsed_ms(now_ms())),
        timer: state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::reconcile::unsaved_count;
    use crate::store::KvStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> TimingCache {
        TimingCache::new(KvStore::in_memory().unwrap())
    }

    #[tokio::test]
    async fn start_persists_the_slot_and_survives_reattach() {
        let cache = cache();
        let owner = TimerOwner::attach(cache.clone(), "m1").await;

        let timer = owner.start("seg1", "Bob").await.unwrap();
        assert!(timer.is_running);
        assert!(timer.started_at.is_some());

        // A fresh owner (remount) re-adopts the persisted timer.
        let reattached = TimerOwner::attach(cache.clone(), "m1").await;
        let snapshot = reattached.snapshot().await;
        assert_eq!(snapshot.timer, Some(timer));
        assert!(snapshot.elapsed_ms >= 0);

        // A different meeting sees nothing.
        let other = TimerOwner::attach(cache, "m2").await;
        assert_eq!(other.snapshot().await.timer, None);
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let owner = TimerOwner::attach(cache(), "m1").await;
        owner.start("seg1", "Bob").await.unwrap();

        let err = owner.start("seg2", "Cara").await.unwrap_err();
        assert!(err.to_string().contains("timer already running"));
    }

    #[tokio::test]
    async fn start_is_rejected_when_slot_was_written_elsewhere() {
        let cache = cache();
        let first = TimerOwner::attach(cache.clone(), "m1").await;
        // Attached before anything ran, so its in-memory state is empty and
        // only the persisted slot can block it.
        let second = TimerOwner::attach(cache, "m1").await;

        first.start("seg1", "Bob").await.unwrap();

        let err = second.start("seg2", "Cara").await.unwrap_err();
        assert!(err.to_string().contains("timer already running"));

        first.reset().await;
        assert!(second.start("seg2", "Cara").await.is_ok());
    }

    #[tokio::test]
    async fn stop_and_record_appends_to_the_meeting_cache() {
        let cache = cache();
        let owner = TimerOwner::attach(cache.clone(), "m1").await;

        owner.start("seg1", "Alice").await.unwrap();
        let entry = owner
            .stop_and_record("Table Topics", Some("Alice".into()), 2.0, DotColor::Green)
            .await
            .unwrap();

        assert!(entry.ended_at >= entry.started_at);
        assert_eq!(entry.dot_color, DotColor::Green);

        let state = cache.load("m1").await;
        assert_eq!(unsaved_count(&state), 1);
        assert_eq!(state["seg1"].segment_type, "Table Topics");

        // Slot is gone; a new timer may start.
        assert_eq!(cache.load_running_timer("m1").await, None);
        assert!(owner.start("seg1", "Bob").await.is_ok());
    }

    #[tokio::test]
    async fn stop_without_a_timer_is_an_error() {
        let owner = TimerOwner::attach(cache(), "m1").await;
        assert!(owner
            .stop_and_record("Table Topics", None, 1.0, DotColor::Gray)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn reset_clears_slot_without_recording() {
        let cache = cache();
        let owner = TimerOwner::attach(cache.clone(), "m1").await;

        owner.start("seg1", "Bob").await.unwrap();
        owner.reset().await;

        assert_eq!(cache.load_running_timer("m1").await, None);
        assert!(cache.load("m1").await.is_empty());
    }

    #[tokio::test]
    async fn observers_are_notified_on_every_transition() {
        struct Counter(Arc<AtomicUsize>);
        impl TimerObserver for Counter {
            fn timer_changed(&self, _snapshot: &TimerSnapshot) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let owner = TimerOwner::attach(cache(), "m1").await;
        let count = Arc::new(AtomicUsize::new(0));
        owner.add_observer(Box::new(Counter(count.clone()))).await;

        owner.start("seg1", "Bob").await.unwrap();
        owner
            .stop_and_record("Table Topics", None, 1.0, DotColor::Red)
            .await
            .unwrap();
        owner.reset().await;

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
