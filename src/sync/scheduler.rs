// Cancellable delayed-task scheduling.
// Retry timers are values owned by whoever scheduled them, never ambient handles.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A unit of deferred work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs tasks after a delay.
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed, unless the returned handle is cancelled first.
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Handle to a scheduled task. Dropping it leaves the task scheduled.
pub struct TimerHandle {
    cancel: Box<dyn FnOnce() + Send>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Cancel the task. A task that is already running is aborted at its next await.
    pub fn cancel(self) {
        (self.cancel)();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

/// Scheduler backed by tokio timers. Must be used within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        let abort = handle.abort_handle();
        TimerHandle::new(move || abort.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn flag_task(flag: &Arc<AtomicBool>) -> Task {
        let flag = flag.clone();
        Box::pin(async move {
            flag.store(true, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_runs_after_delay() {
        let ran = Arc::new(AtomicBool::new(false));
        let _handle = TokioScheduler.schedule(Duration::from_secs(1), flag_task(&ran));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(!ran.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_never_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let handle = TokioScheduler.schedule(Duration::from_secs(1), flag_task(&ran));
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_keeps_task() {
        let ran = Arc::new(AtomicBool::new(false));
        drop(TokioScheduler.schedule(Duration::from_secs(1), flag_task(&ran)));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(ran.load(Ordering::SeqCst));
    }
}
