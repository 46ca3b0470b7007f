use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    ClientOptions, Observer, Request, ReqwestTransport, ResilientExecutor, Response, Result,
    Transport, TransportError,
};

/// Transport decorator running the attempt loop around `next`.
///
/// Installs retry semantics at the transport boundary, so they apply under
/// any client and can sit below other decorators. Wrapped under a
/// [`LoggingTransport`](crate::LoggingTransport), logging sees one exchange
/// per call; wrapped around one, it sees every attempt.
#[derive(Debug)]
pub struct RetryTransport<T> {
    next: T,
    executor: ResilientExecutor,
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(next: T, options: &ClientOptions) -> Self {
        Self::with_executor(next, ResilientExecutor::new(options))
    }

    pub fn with_executor(next: T, executor: ResilientExecutor) -> Self {
        Self { next, executor }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.executor = self.executor.with_observer(observer);
        self
    }

    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    pub fn inner(&self) -> &T {
        &self.next
    }
}

impl RetryTransport<ReqwestTransport> {
    /// Retrying transport over its own pooled connection layer.
    pub fn pooled(options: &ClientOptions) -> Result<Self> {
        Ok(Self::new(ReqwestTransport::from_options(options)?, options))
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn execute(&self, request: Request) -> std::result::Result<Response, TransportError> {
        self.executor.execute_with_retry(&self.next, request).await
    }
}
