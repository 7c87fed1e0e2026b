//! Reconciliation loop primitives.
//!
//! This library provides the outcome type shared between a reconciliation
//! routine and the loop that drives it. Key concepts:
//!
//! - **Desired state**: What the system should look like (from configuration).
//! - **Current state**: What the system actually looks like (from nodes).
//! - **Convergence**: The process of making current match desired.
//!
//! A routine never retries on its own. It classifies the outcome of a pass
//! and the caller decides whether to move on, stop, or schedule another
//! pass.
//!
//! # Invariants
//!
//! - All passes are idempotent, so a whole pass may be re-run after any
//!   transient failure
//! - Transient and fatal outcomes are distinguished by variant, never by
//!   inspecting error text

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Outcome of a single reconciliation pass.
#[derive(Debug)]
#[must_use = "a reconcile outcome tells the caller whether to proceed, stop, or requeue"]
pub enum ReconcileResult<E> {
    /// The pass completed (or was intentionally skipped); proceed.
    Continue,

    /// Fatal outcome; stop and surface the cause.
    Error(E),

    /// Transient outcome; run the whole pass again after the delay.
    RequeueAfter(Duration),
}

impl<E> ReconcileResult<E> {
    /// Requeue after a short delay expressed in seconds.
    pub fn requeue_soon(secs: u64) -> Self {
        Self::RequeueAfter(Duration::from_secs(secs))
    }

    /// Returns true if the caller may proceed.
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Returns true if the outcome is fatal.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the requeue delay, if the pass should be re-run.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::RequeueAfter(delay) => Some(*delay),
            _ => None,
        }
    }

    /// Borrow the fatal cause, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Consume the outcome, returning the fatal cause, if any.
    pub fn into_error(self) -> Option<E> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Map the fatal cause, leaving the other variants untouched.
    pub fn map_err<F, O>(self, op: O) -> ReconcileResult<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            Self::Continue => ReconcileResult::Continue,
            Self::Error(err) => ReconcileResult::Error(op(err)),
            Self::RequeueAfter(delay) => ReconcileResult::RequeueAfter(delay),
        }
    }
}

impl<E> From<Result<(), E>> for ReconcileResult<E> {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Continue,
            Err(err) => Self::Error(err),
        }
    }
}

/// Retry tracker for repeated transient outcomes.
///
/// The routine itself keeps no state between passes; the driver uses this
/// to notice when a resource keeps requeueing.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    /// Maximum retries per resource.
    max_retries: u32,

    /// Retry window duration.
    window: Duration,

    /// Tracked failures: resource_key -> (count, first_failure_time).
    failures: BTreeMap<String, (u32, Instant)>,
}

impl RetryTracker {
    /// Create a new retry tracker.
    pub fn new(max_retries: u32, window: Duration) -> Self {
        Self {
            max_retries,
            window,
            failures: BTreeMap::new(),
        }
    }

    /// Record a failure for a resource.
    ///
    /// Returns true if retries are exhausted.
    pub fn record_failure(&mut self, resource_key: &str) -> bool {
        let now = Instant::now();

        let (count, first) = self
            .failures
            .entry(resource_key.to_string())
            .or_insert((0, now));

        // Reset if outside window
        if now.duration_since(*first) > self.window {
            *count = 0;
            *first = now;
        }

        *count = count.saturating_add(1);
        *count > self.max_retries
    }

    /// Number of failures recorded for a resource in the current window.
    pub fn failure_count(&self, resource_key: &str) -> u32 {
        match self.failures.get(resource_key) {
            Some((count, first)) if first.elapsed() <= self.window => *count,
            _ => 0,
        }
    }

    /// Clear failure tracking for a resource (on success).
    pub fn clear(&mut self, resource_key: &str) {
        self.failures.remove(resource_key);
    }
}

/// Delay used for every transient node failure.
pub const SHORT_REQUEUE_DELAY: Duration = Duration::from_secs(2);

/// Default reconciliation interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of consecutive requeues tolerated before escalating.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default retry window.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(10 * 60); // 10 minutes

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_soon() {
        let result: ReconcileResult<String> = ReconcileResult::requeue_soon(2);
        assert_eq!(result.requeue_after(), Some(SHORT_REQUEUE_DELAY));
        assert!(!result.is_continue());
        assert!(!result.is_error());
    }

    #[test]
    fn test_error_accessors() {
        let result: ReconcileResult<&str> = ReconcileResult::Error("boom");
        assert!(result.is_error());
        assert_eq!(result.error(), Some(&"boom"));
        assert_eq!(result.requeue_after(), None);
        assert_eq!(result.into_error(), Some("boom"));
    }

    #[test]
    fn test_map_err_keeps_other_variants() {
        let mapped = ReconcileResult::<u8>::Error(7).map_err(|n| n.to_string());
        assert_eq!(mapped.into_error().as_deref(), Some("7"));

        let mapped = ReconcileResult::<u8>::requeue_soon(5).map_err(|n| n.to_string());
        assert_eq!(mapped.requeue_after(), Some(Duration::from_secs(5)));

        let mapped = ReconcileResult::<u8>::Continue.map_err(|n| n.to_string());
        assert!(mapped.is_continue());
    }

    #[test]
    fn test_from_result() {
        let ok: ReconcileResult<&str> = Ok(()).into();
        assert!(ok.is_continue());

        let err: ReconcileResult<&str> = Err("bad").into();
        assert!(err.is_error());
    }

    #[test]
    fn test_retry_tracker() {
        let mut tracker = RetryTracker::new(3, Duration::from_secs(60));

        assert!(!tracker.record_failure("resource-1")); // 1st
        assert!(!tracker.record_failure("resource-1")); // 2nd
        assert!(!tracker.record_failure("resource-1")); // 3rd
        assert!(tracker.record_failure("resource-1")); // 4th - exhausted

        assert_eq!(tracker.failure_count("resource-1"), 4);
        assert_eq!(tracker.failure_count("resource-2"), 0);

        tracker.clear("resource-1");
        assert_eq!(tracker.failure_count("resource-1"), 0);
    }

    #[test]
    fn test_retry_tracker_window_expiry() {
        let mut tracker = RetryTracker::new(1, Duration::ZERO);
        tracker.record_failure("resource-1");
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(tracker.failure_count("resource-1"), 0);
        assert!(!tracker.record_failure("resource-1"));
        assert_eq!(tracker.failure_count("resource-1"), 1);
    }
}
