use std::sync::Arc;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, Url,
};

use crate::{Body, Error, RequestContext, Result};

/// Method, target and headers of a request.
///
/// Shared behind an `Arc` so every attempt and every decorator can look at
/// the same head without copying; a decorator that needs different headers
/// builds a new head instead of mutating this one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

/// Outgoing request: shared head, optional one-shot body and call context.
#[derive(Debug)]
pub struct Request {
    head: Arc<RequestHead>,
    body: Option<Body>,
    context: RequestContext,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self::from_parts(
            Arc::new(RequestHead {
                method,
                url,
                headers: HeaderMap::new(),
            }),
            None,
            RequestContext::new(),
        )
    }

    pub fn builder(method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    pub fn from_parts(head: Arc<RequestHead>, body: Option<Body>, context: RequestContext) -> Self {
        Self {
            head,
            body,
            context,
        }
    }

    pub fn into_parts(self) -> (Arc<RequestHead>, Option<Body>, RequestContext) {
        (self.head, self.body, self.context)
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn url(&self) -> &Url {
        &self.head.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Shared handle to the head.
    pub fn head(&self) -> &Arc<RequestHead> {
        &self.head
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Builder collecting the first construction error, reported by
/// [`RequestBuilder::build`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: std::result::Result<Url, Error>,
    headers: HeaderMap,
    body: Option<Body>,
    context: RequestContext,
    error: Option<Error>,
}

impl RequestBuilder {
    fn new(method: Method, url: &str) -> Self {
        let url = Url::parse(url.trim())
            .map_err(|err| Error::Construction(format!("invalid url '{url}': {err}")))
            .and_then(|url| {
                if url.has_host() {
                    Ok(url)
                } else {
                    Err(Error::Construction(format!("url '{url}' has no host")))
                }
            });
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            context: RequestContext::new(),
            error: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::Construction(format!("invalid header name '{name}': {err}")))
            .and_then(|header_name| match HeaderValue::from_str(value) {
                Ok(value) => Ok((header_name, value)),
                Err(err) => Err(Error::Construction(format!(
                    "invalid value for header '{header_name}': {err}"
                ))),
            });
        match parsed {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// Replaces all headers collected so far.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.headers.insert(
                    reqwest::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                self.body = Some(Body::from(bytes));
            }
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(Error::Construction(format!(
                        "request body could not be serialized: {err}"
                    )));
                }
            }
        }
        self
    }

    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn build(self) -> Result<Request> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let url = self.url?;
        Ok(Request::from_parts(
            Arc::new(RequestHead {
                method: self.method,
                url,
                headers: self.headers,
            }),
            self.body,
            self.context,
        ))
    }
}
