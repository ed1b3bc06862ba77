//! Bounded retry for contended writes
//!
//! Busy/locked failures are retried after each configured delay; any other
//! failure, or contention outlasting the schedule, ends the attempt.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, is_transient, retries_exhausted, Result};
use wiretuner_core::config::RetryConfig;

/// Run `attempt` until it succeeds, fails permanently, or the backoff
/// schedule is exhausted
pub fn with_retry<T, F>(policy: &RetryConfig, op: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    let mut delays = policy.delays();
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        match attempt() {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) => match delays.next() {
                Some(delay) => {
                    tracing::debug!(
                        op = op,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Storage busy, backing off"
                    );
                    std::thread::sleep(delay);
                }
                None => {
                    tracing::warn!(op = op, attempts = attempts, "Storage busy, giving up");
                    return Err(retries_exhausted(op, attempts, err));
                }
            },
            Err(err) => return Err(from_rusqlite(err).with_op(op.to_string())),
        }
    }
}
