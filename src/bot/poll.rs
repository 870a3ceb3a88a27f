/// Bounded polling
///
/// Whether an external action has taken effect is only observable by looking
/// at the screen again, so waits are retry loops with a deadline. Each
/// iteration checks the run context first and the sleep between attempts is
/// cut short by the stop signal.
use std::time::{Duration, Instant};

use crate::runtime::RunContext;

/// How a polling loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Found(T),
    /// The window elapsed without a hit
    TimedOut,
    /// Stop requested or scanning paused
    Cancelled,
}

/// Call `attempt` every `interval` until it yields a value, `window` elapses,
/// or the run should end. At least one attempt is made.
///
/// Errors from `attempt` end the loop and are returned as-is.
pub fn poll_for<T, E>(
    run: &RunContext,
    window: Duration,
    interval: Duration,
    mut attempt: impl FnMut() -> Result<Option<T>, E>,
) -> Result<PollOutcome<T>, E> {
    let deadline = Instant::now() + window;

    loop {
        if !run.should_continue() {
            return Ok(PollOutcome::Cancelled);
        }

        if let Some(value) = attempt()? {
            return Ok(PollOutcome::Found(value));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(PollOutcome::TimedOut);
        }

        let pause = interval.min(deadline - now);
        if !run.stop.sleep(pause) {
            return Ok(PollOutcome::Cancelled);
        }
    }
}
