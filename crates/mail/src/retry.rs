//! Bounded retry for remote mailbox calls
//!
//! Every remote operation the engine performs goes through
//! [`RemoteExecutor::execute`], which retries transient failures a fixed
//! number of times with a fixed delay and then fails hard.

use anyhow::Result;
use log::warn;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::mailbox::{AccountMismatchError, MessageNotFoundError};

/// Error returned when a run was interrupted by the user
#[derive(Debug, thiserror::Error)]
#[error("Interrupted")]
pub struct InterruptedError;

/// How often and how patiently to retry a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 2;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_DELAY)
    }
}

/// Shared flag raised when the user asks the run to stop
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run stop at the next safe point
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`InterruptedError`] if the flag is raised
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            return Err(InterruptedError.into());
        }
        Ok(())
    }
}

/// Executes remote operations under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RemoteExecutor {
    policy: RetryPolicy,
    interrupt: Interrupt,
}

impl RemoteExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            interrupt: Interrupt::new(),
        }
    }

    /// Use `interrupt` to abandon retries when the user stops the run
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Same policy, but retries run to completion even after an interrupt
    ///
    /// For calls that finish a change already made to a mailbox.
    pub fn uninterruptible(&self) -> Self {
        Self::new(self.policy)
    }

    /// Run `op`, retrying transient failures
    ///
    /// Permanent failures (missing messages, account mismatches) are returned
    /// on first occurrence. After `max_retries` retries the last error is
    /// returned with `description` as context.
    pub fn execute<T, F>(&self, description: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut remaining = self.policy.max_retries;
        let mut attempt: u32 = 1;

        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if is_permanent(&err) {
                return Err(err);
            }
            if remaining == 0 {
                return Err(err.context(format!(
                    "{} failed after {} attempt(s)",
                    description, attempt
                )));
            }

            warn!(
                "{} failed (attempt {}): {:#}; retrying in {}s",
                description,
                attempt,
                err,
                self.policy.delay.as_secs_f32()
            );
            self.interrupt.check()?;
            std::thread::sleep(self.policy.delay);
            self.interrupt.check()?;

            remaining -= 1;
            attempt += 1;
        }
    }
}

/// Errors that retrying cannot fix
fn is_permanent(err: &anyhow::Error) -> bool {
    err.is::<MessageNotFoundError>()
        || err.is::<AccountMismatchError>()
        || err.is::<InterruptedError>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use anyhow::anyhow;

    fn fast_executor(max_retries: u32) -> RemoteExecutor {
        RemoteExecutor::new(RetryPolicy::new(max_retries, Duration::ZERO))
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.delay, Duration::from_secs(5));
    }

    #[test]
    fn test_success_first_attempt() {
        let mut calls = 0;
        let value = fast_executor(2)
            .execute("op", || {
                calls += 1;
                Ok(42)
            })
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_recovers_from_transient_failure() {
        let mut calls = 0;
        let value = fast_executor(2)
            .execute("op", || {
                calls += 1;
                if calls < 3 { Err(anyhow!("503")) } else { Ok("ok") }
            })
            .unwrap();
        assert_eq!(value, "ok");
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_fails_after_retries_exhausted() {
        let mut calls = 0;
        let result: Result<()> = fast_executor(2).execute("List labels", || {
            calls += 1;
            Err(anyhow!("503"))
        });
        let err = result.unwrap_err();
        assert_eq!(calls, 3);
        assert!(format!("{:#}", err).contains("List labels failed after 3 attempt(s)"));
    }

    #[test]
    fn test_zero_retries_fails_immediately() {
        let mut calls = 0;
        let result: Result<()> = fast_executor(0).execute("op", || {
            calls += 1;
            Err(anyhow!("503"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_not_found_is_not_retried() {
        let mut calls = 0;
        let result: Result<()> = fast_executor(2).execute("Fetch", || {
            calls += 1;
            Err(MessageNotFoundError(MessageId::new("m1")).into())
        });
        assert!(result.unwrap_err().is::<MessageNotFoundError>());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_interrupt_stops_retrying() {
        let interrupt = Interrupt::new();
        let executor = fast_executor(5).with_interrupt(interrupt.clone());
        let mut calls = 0;
        let result: Result<()> = executor.execute("op", || {
            calls += 1;
            interrupt.trigger();
            Err(anyhow!("503"))
        });
        assert!(result.unwrap_err().is::<InterruptedError>());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_uninterruptible_keeps_retrying() {
        let interrupt = Interrupt::new();
        let executor = fast_executor(2)
            .with_interrupt(interrupt.clone())
            .uninterruptible();
        let mut calls = 0;
        let value = executor
            .execute("Trash message", || {
                calls += 1;
                interrupt.trigger();
                if calls < 2 { Err(anyhow!("503")) } else { Ok("done") }
            })
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(calls, 2);
        assert_eq!(executor.policy(), RetryPolicy::new(2, Duration::ZERO));
    }
}
