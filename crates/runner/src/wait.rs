//! Suspend-with-timeout primitive
//!
//! Every wait in a scenario goes through [`suspend`]: probe the page, and if
//! the condition does not hold yet, sleep one poll interval and try again
//! until the deadline. Expiry is a value, not an error.

use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use statecap_common::{Condition, WaitState};

use crate::browser::{DriverResult, ElementProbe, PageDriver};

/// Timeout budget and polling cadence of one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

/// What the last probe saw before the deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// No element matched the selector
    Missing,
    /// An element matched but the condition did not hold
    Present(ElementProbe),
}

/// Result of a suspension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied {
        elapsed: Duration,
    },
    TimedOut {
        elapsed: Duration,
        /// Whether any probe ever found the element
        ever_seen: bool,
        last: Observation,
    },
}

impl WaitOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied { .. })
    }
}

/// Check a condition against one probe result
pub fn holds(condition: &Condition, probe: Option<&ElementProbe>) -> bool {
    let Some(probe) = probe else {
        return false;
    };
    match condition {
        Condition::Present {
            state, has_text, ..
        } => {
            let state_ok = match state {
                WaitState::Attached => true,
                WaitState::Visible => probe.visible,
            };
            let text_ok = has_text
                .as_deref()
                .map(|needle| probe.text.contains(needle))
                .unwrap_or(true);
            state_ok && text_ok
        }
        Condition::TextAbsent { text, .. } => !probe.text.contains(text.as_str()),
    }
}

/// Poll `page` until `condition` holds or the policy's timeout elapses.
///
/// The condition is always probed at least once, and once more at the
/// deadline, so a zero-length budget still observes the current page.
pub async fn suspend(
    page: &mut dyn PageDriver,
    condition: &Condition,
    policy: WaitPolicy,
) -> DriverResult<WaitOutcome> {
    let selector = condition.selector();
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut ever_seen = false;

    loop {
        let probe = page.probe(selector, condition.text_filter()).await?;
        ever_seen |= probe.is_some();

        if holds(condition, probe.as_ref()) {
            return Ok(WaitOutcome::Satisfied {
                elapsed: start.elapsed(),
            });
        }

        let now = Instant::now();
        if now >= deadline {
            let last = match probe {
                Some(p) => Observation::Present(p),
                None => Observation::Missing,
            };
            return Ok(WaitOutcome::TimedOut {
                elapsed: now - start,
                ever_seen,
                last,
            });
        }

        trace!("condition {} not met yet", condition.label());
        let remaining = deadline - now;
        tokio::time::sleep(policy.poll_interval.min(remaining)).await;
    }
}
