pub mod owner;
pub mod state;

pub use owner::{TimerObserver, TimerOwner, TimerSnapshot};
pub use state::{RunningTimer, StoredRunningTimer};
