// Sync module.
// Keeps the in-memory file listing, the local cache, and the remote store in step.

pub mod coordinator;
pub mod events;
pub mod retry;
pub mod scheduler;


pub use coordinator::{Coordinator, CoordinatorSettings};
pub use events::{Listing, ListingSource, Notice, SyncEvent};
pub use retry::{RetryPhase, RetryPolicy, RetryState, ScheduledRetry};
pub use scheduler::{Scheduler, Task, TimerHandle, TokioScheduler};
