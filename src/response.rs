use std::fmt;

use bytes::{Bytes, BytesMut};
use futures_util::{stream::BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::{header::HeaderMap, StatusCode};

use crate::TransportError;

/// Response returned by a [`Transport`](crate::Transport).
///
/// The body is a stream that must be read to the end (or drained with
/// [`drain`]) before the underlying connection can be reused.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Buffered response without headers.
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, HeaderMap::new(), ResponseBody::from_bytes(body))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        self.body.bytes().await
    }
}

impl From<reqwest::Response> for Response {
    fn from(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = ResponseBody::from_stream(response.bytes_stream().map_err(TransportError::from));
        Self::new(status, headers, body)
    }
}

enum BodyInner {
    Full(Option<Bytes>),
    Stream(BoxStream<'static, Result<Bytes, TransportError>>),
}

/// Single-consumption response body.
pub struct ResponseBody {
    inner: BodyInner,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self {
            inner: BodyInner::Full(None),
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            inner: BodyInner::Full((!bytes.is_empty()).then_some(bytes)),
        }
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
    {
        Self {
            inner: BodyInner::Stream(stream.boxed()),
        }
    }

    /// Next chunk, or `None` once the body is exhausted.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        match &mut self.inner {
            BodyInner::Full(bytes) => Ok(bytes.take()),
            BodyInner::Stream(stream) => stream.next().await.transpose(),
        }
    }

    pub async fn bytes(mut self) -> Result<Bytes, TransportError> {
        if let BodyInner::Full(bytes) = &mut self.inner {
            return Ok(bytes.take().unwrap_or_default());
        }
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            BodyInner::Full(Some(bytes)) => write!(f, "ResponseBody({} bytes)", bytes.len()),
            BodyInner::Full(None) => f.write_str("ResponseBody(empty)"),
            BodyInner::Stream(_) => f.write_str("ResponseBody(stream)"),
        }
    }
}

/// Outcome of draining a response body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Drained {
    pub bytes: u64,
    /// `false` when reading stopped on an error; the connection will not be
    /// returned to the pool in that case.
    pub complete: bool,
}

/// Reads and discards the rest of the body, then releases it.
pub async fn drain(response: Response) -> Drained {
    let mut body = response.into_body();
    let mut bytes = 0u64;
    loop {
        match body.chunk().await {
            Ok(Some(chunk)) => bytes += chunk.len() as u64,
            Ok(None) => {
                return Drained {
                    bytes,
                    complete: true,
                }
            }
            Err(_) => {
                return Drained {
                    bytes,
                    complete: false,
                }
            }
        }
    }
}
