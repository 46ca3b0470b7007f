use std::{sync::Arc, time::Duration};

use reqwest::{Method, StatusCode, Url};

use crate::{Drained, RetryDecision, TransportError};

/// One transport invocation inside the attempt loop.
#[derive(Clone, Copy, Debug)]
pub struct AttemptEvent<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    /// Zero-based attempt index.
    pub attempt: usize,
    pub max_attempts: usize,
}

/// One request forwarded by [`LoggingTransport`](crate::LoggingTransport).
#[derive(Clone, Copy, Debug)]
pub struct ExchangeEvent<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    /// Header injected by the decorator, if any.
    pub injected_header: Option<(&'a str, &'a str)>,
}

/// Receives resilience-layer events.
///
/// Injected into executors and decorators so the retry path has no global
/// side effects; every hook defaults to a no-op.
pub trait Observer: Send + Sync {
    fn on_attempt(&self, _event: &AttemptEvent<'_>) {}

    fn on_response(&self, _event: &AttemptEvent<'_>, _status: StatusCode) {}

    fn on_failure(
        &self,
        _event: &AttemptEvent<'_>,
        _error: &TransportError,
        _decision: RetryDecision,
    ) {
    }

    fn on_retry_scheduled(&self, _event: &AttemptEvent<'_>, _delay: Duration) {}

    fn on_drained(&self, _event: &AttemptEvent<'_>, _drained: Drained) {}

    fn on_exchange_start(&self, _event: &ExchangeEvent<'_>) {}

    fn on_exchange_end(
        &self,
        _event: &ExchangeEvent<'_>,
        _elapsed: Duration,
        _outcome: Result<StatusCode, &TransportError>,
    ) {
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Forwards events to `tracing`.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

#[cfg(feature = "tracing")]
impl Observer for TracingObserver {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        tracing::debug!(
            method = %event.method,
            url = %event.url,
            attempt = event.attempt,
            max_attempts = event.max_attempts,
            "sending attempt"
        );
    }

    fn on_response(&self, event: &AttemptEvent<'_>, status: StatusCode) {
        tracing::debug!(
            method = %event.method,
            url = %event.url,
            attempt = event.attempt,
            status = status.as_u16(),
            "attempt completed"
        );
    }

    fn on_failure(&self, event: &AttemptEvent<'_>, error: &TransportError, decision: RetryDecision) {
        tracing::warn!(
            method = %event.method,
            url = %event.url,
            attempt = event.attempt,
            kind = %error.kind(),
            decision = ?decision,
            error = %error,
            "attempt failed"
        );
    }

    fn on_retry_scheduled(&self, event: &AttemptEvent<'_>, delay: Duration) {
        tracing::info!(
            url = %event.url,
            attempt = event.attempt,
            delay_ms = delay.as_millis() as u64,
            "retrying request"
        );
    }

    fn on_drained(&self, event: &AttemptEvent<'_>, drained: Drained) {
        tracing::trace!(
            url = %event.url,
            attempt = event.attempt,
            bytes = drained.bytes,
            complete = drained.complete,
            "drained superseded response"
        );
    }

    fn on_exchange_start(&self, event: &ExchangeEvent<'_>) {
        match event.injected_header {
            Some((name, value)) => tracing::info!(
                method = %event.method,
                url = %event.url,
                header = name,
                value,
                "sending request"
            ),
            None => tracing::info!(method = %event.method, url = %event.url, "sending request"),
        }
    }

    fn on_exchange_end(
        &self,
        event: &ExchangeEvent<'_>,
        elapsed: Duration,
        outcome: Result<StatusCode, &TransportError>,
    ) {
        match outcome {
            Ok(status) => tracing::info!(
                url = %event.url,
                elapsed_ms = elapsed.as_millis() as u64,
                status = status.as_u16(),
                "request completed"
            ),
            Err(error) => tracing::warn!(
                url = %event.url,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %error,
                "request failed"
            ),
        }
    }
}

/// `TracingObserver` when the `tracing` feature is on, `NoopObserver` otherwise.
pub fn default_observer() -> Arc<dyn Observer> {
    #[cfg(feature = "tracing")]
    {
        Arc::new(TracingObserver)
    }
    #[cfg(not(feature = "tracing"))]
    {
        Arc::new(NoopObserver)
    }
}
