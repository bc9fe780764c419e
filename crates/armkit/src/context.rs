//! Call context: cooperative cancellation and deadlines.
//!
//! Every provider call takes a [`CallContext`]. Workers check it before each
//! remote call, and the HTTP backend bounds each request by the time left.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep slice while waiting, so cancellation is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared cancellation signal. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every holder of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cancellation token plus optional deadline passed to provider calls.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that never expires and is not cancelled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context observing an existing token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail if the context was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Sleep for `duration`, waking early with an error on cancellation.
    ///
    /// A sleep that would overrun the deadline fails immediately.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        if let Some(remaining) = self.remaining()
            && remaining < duration
        {
            return Err(Error::DeadlineExceeded);
        }

        let wake = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= wake {
                return Ok(());
            }
            thread::sleep((wake - now).min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_passes_check() {
        let ctx = CallContext::new();
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let ctx = CallContext::with_token(token.clone());
        let worker_ctx = ctx.clone();

        token.cancel();

        assert!(matches!(ctx.check(), Err(Error::Cancelled)));
        assert!(matches!(worker_ctx.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = CallContext::new().with_deadline(Instant::now());
        assert!(matches!(ctx.check(), Err(Error::DeadlineExceeded)));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_sleep_past_deadline_fails_fast() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(20));
        let started = Instant::now();
        assert!(matches!(
            ctx.sleep(Duration::from_secs(5)),
            Err(Error::DeadlineExceeded)
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_wakes_on_cancel() {
        let ctx = CallContext::new();
        let token = ctx.token().clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            token.cancel();
        });

        let started = Instant::now();
        assert!(matches!(
            ctx.sleep(Duration::from_secs(10)),
            Err(Error::Cancelled)
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }
}
