use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::redirect::Policy;

use crate::{ClientOptions, Error, Request, Response, Result, TransportError};

/// Executes one request and produces one response.
///
/// Implemented by the connection layer ([`ReqwestTransport`]) and by every
/// decorator wrapping another transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> std::result::Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: Request) -> std::result::Result<Response, TransportError> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn execute(&self, request: Request) -> std::result::Result<Response, TransportError> {
        (**self).execute(request).await
    }
}

/// Transport backed by a pooled `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::from_client(reqwest::Client::new())
    }
}

impl ReqwestTransport {
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Builds a client honoring timeout, pooling and redirect options.
    pub fn from_options(options: &ClientOptions) -> Result<Self> {
        let mut builder = pooled_builder(options);
        if let Some(limit) = options.redirect_limit {
            builder = builder.redirect(if limit == 0 {
                Policy::none()
            } else {
                Policy::limited(limit)
            });
        }
        build(builder)
    }

    /// Like [`from_options`](Self::from_options), with an arbitrary redirect
    /// check in place of `redirect_limit`.
    pub fn from_options_with_redirect(options: &ClientOptions, redirect: Policy) -> Result<Self> {
        build(pooled_builder(options).redirect(redirect))
    }

    /// Plain pooled transport without retry or timeout settings.
    pub fn with_pool(max_idle_per_host: usize, idle_timeout: Duration) -> Result<Self> {
        build(
            reqwest::Client::builder()
                .pool_max_idle_per_host(max_idle_per_host)
                .pool_idle_timeout(idle_timeout),
        )
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }
}

fn pooled_builder(options: &ClientOptions) -> reqwest::ClientBuilder {
    let mut builder = reqwest::Client::builder().timeout(options.timeout);
    if let Some(max_idle) = options.max_idle_connections_per_host {
        builder = builder.pool_max_idle_per_host(max_idle);
    }
    if let Some(idle_timeout) = options.idle_connection_timeout {
        builder = builder.pool_idle_timeout(idle_timeout);
    }
    builder
}

fn build(builder: reqwest::ClientBuilder) -> Result<ReqwestTransport> {
    let http = builder
        .build()
        .map_err(|err| Error::Construction(format!("http client could not be built: {err}")))?;
    Ok(ReqwestTransport { http })
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: Request) -> std::result::Result<Response, TransportError> {
        let (head, body, context) = request.into_parts();
        let mut builder = self
            .http
            .request(head.method.clone(), head.url.clone())
            .headers(head.headers.clone());
        if let Some(body) = body {
            builder = builder.body(reqwest::Body::from(body));
        }

        context
            .run(async move {
                builder
                    .send()
                    .await
                    .map(Response::from)
                    .map_err(TransportError::from)
            })
            .await
    }
}
