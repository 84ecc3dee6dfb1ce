//! Retry with linear backoff for remote operations.
//!
//! Only transient failures (see [`StorageError::is_transient`]) are retried.
//! Attempt `n` that fails is followed by a pause of `n × unit` unless it was
//! the last one. Every attempt leaves one line in a [`RetryLog`], which is
//! attached to [`StorageError::RetryExhausted`] when all attempts fail.

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            unit,
        }
    }

    /// Pause after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.unit * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub message: String,
}

/// Per-attempt diagnostics of one retried operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryLog {
    pub operation: String,
    pub attempts: Vec<AttemptRecord>,
}

impl RetryLog {
    fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            attempts: Vec::new(),
        }
    }

    pub fn failures(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::Failed)
            .count()
    }

    pub fn succeeded(&self) -> bool {
        self.attempts
            .last()
            .is_some_and(|a| a.outcome == AttemptOutcome::Succeeded)
    }

    /// One human-readable line per attempt.
    pub fn lines(&self) -> Vec<String> {
        self.attempts
            .iter()
            .map(|a| match a.outcome {
                AttemptOutcome::Succeeded => format!("attempt {} succeeded", a.attempt),
                AttemptOutcome::Failed => format!("attempt {} failed: {}", a.attempt, a.message),
            })
            .collect()
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// `op` receives the 1-based attempt number. The log is returned in every
/// case so callers can keep it around for diagnostics.
pub async fn with_retry<T, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> (Result<T>, RetryLog)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut log = RetryLog::new(operation);
    let max_attempts = policy.max_attempts.max(1);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => {
                log.attempts.push(AttemptRecord {
                    attempt,
                    outcome: AttemptOutcome::Succeeded,
                    message: String::new(),
                });
                return (Ok(value), log);
            }
            Err(err) => {
                log.attempts.push(AttemptRecord {
                    attempt,
                    outcome: AttemptOutcome::Failed,
                    message: err.to_string(),
                });

                if !err.is_transient() {
                    return (Err(err), log);
                }
                if attempt == max_attempts {
                    tracing::warn!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Remote operation failed on every attempt"
                    );
                    let exhausted = StorageError::RetryExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        trail: log.lines(),
                        last: Box::new(err),
                    };
                    return (Err(exhausted), log);
                }

                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Remote operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
