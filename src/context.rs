use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::TransportError;

/// Deadline and cancellation scope of one call.
///
/// Every attempt and every backoff wait races against the context, so a
/// cancelled or expired call stops at the next await point instead of
/// finishing its retry schedule.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Unbounded context that is never cancelled unless asked to.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_in(timeout)
    }

    /// Tightens the deadline to `timeout` from now. An earlier deadline wins;
    /// a timeout past the clock's range leaves the context as it is.
    pub fn deadline_in(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(candidate) => self.with_deadline(candidate),
            None => self,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Child scope bounded by `timeout`; dropping the guard cancels the child
    /// without touching this context.
    pub fn scoped(&self, timeout: Duration) -> (Self, DropGuard) {
        let child = Self {
            deadline: self.deadline,
            cancel: self.cancel.child_token(),
        }
        .deadline_in(timeout);
        let guard = child.cancel.clone().drop_guard();
        (child, guard)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails fast if the context is already done.
    pub fn check(&self) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::cancelled());
        }
        if self.remaining().is_some_and(|left| left.is_zero()) {
            return Err(TransportError::deadline_exceeded());
        }
        Ok(())
    }

    /// Drives `fut` unless the context is cancelled or expires first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransportError::cancelled()),
            _ = self.expired() => Err(TransportError::deadline_exceeded()),
            result = fut => result,
        }
    }

    /// Cancellation-aware sleep.
    pub async fn sleep(&self, duration: Duration) -> Result<(), TransportError> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
