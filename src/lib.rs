//! `resilient-http` is a retrying HTTP execution layer on top of `reqwest`.
//!
//! Building blocks:
//! - [`ResilientExecutor`]: attempt loop with exponential backoff, jitter,
//!   body replay and response draining
//! - [`RetryTransport`] and [`LoggingTransport`]: composable [`Transport`]
//!   decorators
//! - [`ResilientClient`]: executor plus pooled transport
//! - [`TypedRequestService`]: typed JSON success and error decoding
//!
//! Only transport failures that report a temporary condition are retried;
//! a response with any status code is handed back to the caller.

mod backoff;
mod body;
mod classify;
mod client;
mod context;
mod error;
mod executor;
mod logging;
mod observe;
mod options;
mod request;
mod response;
mod retry;
mod service;
mod transport;

pub use backoff::BackoffPolicy;
pub use body::{Body, ReplayableBody};
pub use classify::{classify, RetryDecision, Temporary};
pub use client::{HttpClient, ResilientClient};
pub use context::RequestContext;
pub use error::{Error, ServiceError, TransportError, TransportErrorKind};
pub use executor::ResilientExecutor;
pub use logging::LoggingTransport;
#[cfg(feature = "tracing")]
pub use observe::TracingObserver;
pub use observe::{default_observer, AttemptEvent, ExchangeEvent, NoopObserver, Observer};
pub use options::{ClientOptions, LoopMode};
pub use request::{Request, RequestBuilder, RequestHead};
pub use response::{drain, Drained, Response, ResponseBody};
pub use retry::RetryTransport;
pub use service::{Requester, TypedRequestService};
pub use transport::{ReqwestTransport, Transport};

pub use reqwest::{header, redirect, Method, StatusCode, Url};
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, Error>;
