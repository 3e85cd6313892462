//! Ready conditions and bounded polling.
//!
//! Every wait in uiproof goes through [`poll_until`]: a check runs at
//! least once, then repeated at a fixed interval until it reports ready or
//! the deadline passes. Fixed delays only exist as an explicit
//! [`ReadyCondition::FixedDelay`].

use crate::result::{ProofError, ProofResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Network idle threshold (500ms without requests)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

const fn default_quiet_ms() -> u64 {
    NETWORK_IDLE_THRESHOLD_MS
}

// =============================================================================
// READY CONDITION
// =============================================================================

/// When a navigation counts as complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadyCondition {
    /// Ready as soon as the navigation commits
    Immediate,
    /// No requests in flight for `quiet_ms`
    NetworkIdle {
        /// Required quiet window in milliseconds
        #[serde(default = "default_quiet_ms")]
        quiet_ms: u64,
    },
    /// A selector matches at least one element
    SelectorPresent {
        /// Selector to wait for
        selector: String,
    },
    /// Wait a fixed time, bounded by the navigation timeout
    FixedDelay {
        /// Delay in milliseconds
        ms: u64,
    },
}

impl ReadyCondition {
    /// Network idle with the default quiet window
    #[must_use]
    pub const fn network_idle() -> Self {
        Self::NetworkIdle {
            quiet_ms: NETWORK_IDLE_THRESHOLD_MS,
        }
    }

    /// Selector present
    #[must_use]
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::SelectorPresent {
            selector: selector.into(),
        }
    }
}

impl Default for ReadyCondition {
    fn default() -> Self {
        Self::network_idle()
    }
}

impl std::fmt::Display for ReadyCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::NetworkIdle { quiet_ms } => write!(f, "network idle ({quiet_ms}ms quiet)"),
            Self::SelectorPresent { selector } => write!(f, "selector present ({selector})"),
            Self::FixedDelay { ms } => write!(f, "fixed delay ({ms}ms)"),
        }
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Result of a single check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check<T, O> {
    /// Condition holds
    Ready(T),
    /// Condition does not hold yet; carries what was observed
    Pending(O),
}

/// Diagnostics from a poll that ran out of time
#[derive(Debug)]
pub struct PollTimeout<O> {
    /// Last state observed by a check that returned [`Check::Pending`]
    pub last_observed: Option<O>,
    /// Last transient error, if the final attempt errored
    pub last_error: Option<ProofError>,
    /// Number of checks run
    pub attempts: u32,
    /// Time spent polling
    pub elapsed: Duration,
}

/// Outcome of [`poll_until`]
#[derive(Debug)]
pub enum Polled<T, O> {
    /// The check reported ready
    Ready(T),
    /// The deadline passed first
    TimedOut(PollTimeout<O>),
}

/// Run `check` until it is ready or `timeout` elapses.
///
/// The check always runs at least once, including for a zero timeout, and
/// once more at the deadline. Transient errors (see
/// [`ProofError::is_transient`]) are retried; any other error aborts the poll.
///
/// # Errors
///
/// Returns the first non-transient error produced by the check.
pub async fn poll_until<T, O, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> ProofResult<Polled<T, O>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProofResult<Check<T, O>>>,
{
    let started = Instant::now();
    let deadline = started + timeout;
    let interval = interval.max(Duration::from_millis(1));
    let mut attempts = 0_u32;
    let mut last_observed = None;
    let mut last_error = None;

    loop {
        attempts = attempts.saturating_add(1);
        match check().await {
            Ok(Check::Ready(value)) => return Ok(Polled::Ready(value)),
            Ok(Check::Pending(observed)) => {
                last_observed = Some(observed);
                last_error = None;
            }
            Err(err) if err.is_transient() => {
                tracing::debug!(attempt = attempts, error = %err, "transient check error");
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(Polled::TimedOut(PollTimeout {
                last_observed,
                last_error,
                attempts,
                elapsed: now - started,
            }));
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
