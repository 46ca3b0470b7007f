use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

use crate::{
    observe::default_observer, Error, ExchangeEvent, Observer, Request, RequestHead,
    ReqwestTransport, Response, Result, Transport, TransportError,
};

/// Transport decorator that times each exchange and optionally injects one
/// header.
///
/// The incoming head is never modified: when a header is injected, the
/// forwarded request gets its own copy of the head. The response or error of
/// `next` is returned unchanged.
pub struct LoggingTransport<T> {
    header: Option<(HeaderName, HeaderValue)>,
    next: T,
    observer: Arc<dyn Observer>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for LoggingTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingTransport")
            .field("header", &self.header.as_ref().map(|(name, _)| name))
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> LoggingTransport<T> {
    pub fn new(next: T) -> Self {
        Self {
            header: None,
            next,
            observer: default_observer(),
        }
    }

    /// Injects `name: value` into every forwarded request. An empty name
    /// disables injection.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        if name.is_empty() {
            self.header = None;
            return Ok(self);
        }
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::Construction(format!("invalid header name '{name}': {err}")))?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            Error::Construction(format!("invalid value for header '{name}': {err}"))
        })?;
        self.header = Some((header_name, header_value));
        Ok(self)
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn inner(&self) -> &T {
        &self.next
    }

    fn forwarded_head(&self, head: &Arc<RequestHead>) -> Arc<RequestHead> {
        match &self.header {
            Some((name, value)) => {
                let mut cloned = RequestHead::clone(head);
                cloned.headers.insert(name.clone(), value.clone());
                Arc::new(cloned)
            }
            None => Arc::clone(head),
        }
    }
}

impl LoggingTransport<ReqwestTransport> {
    /// Logging over a default pooled transport.
    pub fn over_default() -> Self {
        Self::new(ReqwestTransport::default())
    }
}

#[async_trait]
impl<T: Transport> Transport for LoggingTransport<T> {
    async fn execute(&self, request: Request) -> std::result::Result<Response, TransportError> {
        let (head, body, context) = request.into_parts();
        let forwarded = self.forwarded_head(&head);
        let injected = self
            .header
            .as_ref()
            .map(|(name, value)| (name.as_str(), value.to_str().unwrap_or("<binary>")));
        let event = ExchangeEvent {
            method: &forwarded.method,
            url: &forwarded.url,
            injected_header: injected,
        };
        self.observer.on_exchange_start(&event);

        let start = Instant::now();
        let result = self
            .next
            .execute(Request::from_parts(Arc::clone(&forwarded), body, context))
            .await;
        let elapsed = start.elapsed();

        self.observer.on_exchange_end(
            &event,
            elapsed,
            result.as_ref().map(Response::status),
        );
        result
    }
}
