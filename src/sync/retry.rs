// Retry policy and state for the listing refresh.
// Exponential backoff with a bounded attempt count and at most one pending timer.

use std::time::Duration;

use super::scheduler::TimerHandle;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: crate::config::DEFAULT_RETRY_DELAY,
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// A retry that has been scheduled but not yet run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRetry {
    /// 1-based number of this retry.
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
}

/// Where the refresh state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPhase {
    #[default]
    Idle,
    Fetching,
    Scheduled(ScheduledRetry),
    /// Retries exhausted; only a forced refresh leaves this phase.
    Terminal,
}

/// Attempt counter plus the single outstanding retry timer.
#[derive(Debug, Default)]
pub struct RetryState {
    attempt_count: u32,
    phase: RetryPhase,
    pending: Option<PendingTimer>,
    next_timer_id: u64,
}

#[derive(Debug)]
struct PendingTimer {
    id: u64,
    handle: TimerHandle,
}

impl RetryState {
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == RetryPhase::Terminal
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the timer with this id is still the one outstanding.
    pub fn is_current(&self, timer_id: u64) -> bool {
        self.pending.as_ref().is_some_and(|p| p.id == timer_id)
    }

    /// Cancel the outstanding timer, if any. Returns whether one was cancelled.
    pub fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.cancel();
                if matches!(self.phase, RetryPhase::Scheduled(_)) {
                    self.phase = RetryPhase::Idle;
                }
                true
            }
            None => false,
        }
    }

    /// Forget the timer that is currently running without cancelling it.
    pub fn release(&mut self, timer_id: u64) {
        if self.is_current(timer_id) {
            self.pending = None;
        }
    }

    pub fn begin_fetch(&mut self) {
        self.phase = RetryPhase::Fetching;
    }

    /// Reserve an id for the next timer.
    pub fn next_timer_id(&mut self) -> u64 {
        self.next_timer_id += 1;
        self.next_timer_id
    }

    /// Record a failed attempt. Returns the retry to schedule, or `None` once the cap is hit.
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> Option<ScheduledRetry> {
        if self.attempt_count >= policy.max_retries {
            self.cancel_pending();
            self.phase = RetryPhase::Terminal;
            return None;
        }

        let delay = policy.delay_for(self.attempt_count);
        self.attempt_count += 1;
        let retry = ScheduledRetry {
            attempt: self.attempt_count,
            max_retries: policy.max_retries,
            delay,
        };
        self.phase = RetryPhase::Scheduled(retry);
        Some(retry)
    }

    /// Install the timer for a scheduled retry, replacing any other.
    pub fn arm(&mut self, timer_id: u64, handle: TimerHandle) {
        if let Some(previous) = self.pending.take() {
            previous.handle.cancel();
        }
        self.pending = Some(PendingTimer {
            id: timer_id,
            handle,
        });
    }

    /// A fetch succeeded: back to idle with a zero count and no timer.
    pub fn record_success(&mut self) {
        self.cancel_pending();
        self.attempt_count = 0;
        self.phase = RetryPhase::Idle;
    }

    /// A fetch was rejected outright; stop without scheduling anything.
    pub fn record_rejection(&mut self) {
        self.cancel_pending();
        self.phase = RetryPhase::Idle;
    }

    /// Leave any phase, including Terminal, for a fresh start.
    pub fn reset(&mut self) {
        self.cancel_pending();
        self.attempt_count = 0;
        self.phase = RetryPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handle(counter: &Arc<AtomicUsize>) -> TimerHandle {
        let counter = counter.clone();
        TimerHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(64), Duration::from_millis(1000).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_failures_until_terminal() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::default();

        let delays: Vec<Duration> = (0..3)
            .map(|_| state.record_failure(&policy).unwrap().delay)
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000)
            ]
        );
        assert_eq!(state.attempt_count(), 3);

        assert_eq!(state.record_failure(&policy), None);
        assert!(state.is_terminal());
        assert!(!state.has_pending());
    }

    #[test]
    fn test_success_resets_count() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::default();
        state.record_failure(&policy);
        state.record_failure(&policy);

        state.record_success();
        assert_eq!(state.attempt_count(), 0);
        assert_eq!(state.phase(), RetryPhase::Idle);
        assert_eq!(
            state.record_failure(&policy).unwrap().delay,
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_arm_replaces_previous_timer() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let mut state = RetryState::default();

        let first = state.next_timer_id();
        state.arm(first, counting_handle(&cancelled));
        let second = state.next_timer_id();
        state.arm(second, counting_handle(&cancelled));

        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert!(state.is_current(second));
        assert!(!state.is_current(first));
    }

    #[test]
    fn test_release_does_not_cancel() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let mut state = RetryState::default();
        let id = state.next_timer_id();
        state.arm(id, counting_handle(&cancelled));

        state.release(id);
        assert!(!state.has_pending());
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_pending_returns_to_idle() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::default();
        let mut state = RetryState::default();
        state.record_failure(&policy);
        let id = state.next_timer_id();
        state.arm(id, counting_handle(&cancelled));

        assert!(state.cancel_pending());
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(state.phase(), RetryPhase::Idle);
        assert_eq!(state.attempt_count(), 1);
        assert!(!state.cancel_pending());
    }
}
