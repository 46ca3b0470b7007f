use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::redirect::Policy;

use crate::{
    ClientOptions, Observer, Request, ReqwestTransport, ResilientExecutor, Response, Result,
    Transport,
};

/// Executes a request with or without the retry loop.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: Request, retry: bool) -> Result<Response>;

    /// Bound applied to calls that bring no deadline of their own.
    fn timeout(&self) -> Duration;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn execute(&self, request: Request, retry: bool) -> Result<Response> {
        (**self).execute(request, retry).await
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }
}

/// HTTP client running requests through [`ResilientExecutor`].
///
/// Holds immutable configuration only and can be shared between tasks.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    http: Option<reqwest::Client>,
    executor: ResilientExecutor,
    options: ClientOptions,
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("options", &self.options)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    /// Creates a client with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(ClientOptions::default())
    }

    /// Creates a client over a pooled `reqwest` transport built from `options`.
    pub fn with_options(options: ClientOptions) -> Result<Self> {
        let options = options.sanitized();
        let transport = ReqwestTransport::from_options(&options)?;
        Ok(Self::with_reqwest(transport, options))
    }

    /// Creates a pooled client whose redirects are decided by `redirect`.
    pub fn with_redirect_policy(options: ClientOptions, redirect: Policy) -> Result<Self> {
        let options = options.sanitized();
        let transport = ReqwestTransport::from_options_with_redirect(&options, redirect)?;
        Ok(Self::with_reqwest(transport, options))
    }

    fn with_reqwest(transport: ReqwestTransport, options: ClientOptions) -> Self {
        let http = transport.client().clone();
        Self {
            transport: Arc::new(transport),
            http: Some(http),
            executor: ResilientExecutor::new(&options),
            options,
        }
    }

    /// Creates a client over any transport or decorator chain.
    ///
    /// Pooling and redirect options are the transport's business here and
    /// are ignored.
    pub fn with_transport(transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        let options = options.sanitized();
        Self {
            transport,
            http: None,
            executor: ResilientExecutor::new(&options),
            options,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.executor = self.executor.with_observer(observer);
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Underlying `reqwest::Client`, when the client owns one.
    pub fn http_client(&self) -> Option<&reqwest::Client> {
        self.http.as_ref()
    }

    /// Sends `request`; with `retry` the attempt loop applies.
    ///
    /// A request without a deadline is bounded by the configured timeout.
    pub async fn execute(&self, request: Request, retry: bool) -> Result<Response> {
        let request = if request.context().deadline().is_none() {
            let context = request.context().clone().deadline_in(self.options.timeout);
            request.with_context(context)
        } else {
            request
        };
        Ok(self
            .executor
            .execute(self.transport.as_ref(), request, retry)
            .await?)
    }
}

#[async_trait]
impl HttpClient for ResilientClient {
    async fn execute(&self, request: Request, retry: bool) -> Result<Response> {
        ResilientClient::execute(self, request, retry).await
    }

    fn timeout(&self) -> Duration {
        self.options.timeout
    }
}
