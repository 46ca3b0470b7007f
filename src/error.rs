use std::{error::Error as StdError, fmt, io};

use reqwest::StatusCode;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Category of a transport failure.
///
/// The "temporary" capability lives on the kind: see
/// [`TransportErrorKind::is_temporary`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransportErrorKind {
    /// The attempt did not complete within the transport timeout.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// The connection was reset, aborted or closed mid-exchange.
    ConnectionReset,
    /// The request body could not be read or replayed.
    Body,
    /// Redirect policy rejected the response.
    Redirect,
    /// The request was rejected before it reached the wire.
    Request,
    /// The caller cancelled the call.
    Cancelled,
    /// The call deadline passed.
    DeadlineExceeded,
    Other,
}

impl TransportErrorKind {
    /// Transient network conditions that a retry may resolve.
    pub const fn is_temporary(self) -> bool {
        matches!(self, Self::Timeout | Self::Connect | Self::ConnectionReset)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::ConnectionReset => "connection_reset",
            Self::Body => "body",
            Self::Redirect => "redirect",
            Self::Request => "request",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_temporary(&self) -> bool {
        self.kind.is_temporary()
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "call was cancelled")
    }

    pub(crate) fn deadline_exceeded() -> Self {
        Self::new(TransportErrorKind::DeadlineExceeded, "call deadline exceeded")
    }

    pub(crate) fn body_read(err: io::Error) -> Self {
        Self::new(
            TransportErrorKind::Body,
            format!("request body could not be buffered: {err}"),
        )
        .with_source(err)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if is_connection_reset(&err) {
            TransportErrorKind::ConnectionReset
        } else if err.is_redirect() {
            TransportErrorKind::Redirect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else if err.is_builder() || err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}

fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current = err.source();
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        current = cause.source();
    }
    false
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid method, URL or header combination.
    #[error("invalid request: {0}")]
    Construction(String),
    /// Failure reported by the transport, possibly after retries.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Response body could not be parsed into the expected type.
    #[error("decode error (status {status}): {message}")]
    Decode { status: u16, message: String },
}

impl Error {
    /// Whether the underlying transport failure was temporary.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_temporary())
    }

    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport(err) => Some(err.kind()),
            _ => None,
        }
    }
}

/// Error returned by [`TypedRequestService`](crate::TypedRequestService).
///
/// `NonSuccess` carries the decoded error payload of a response outside
/// `200..300`; every other failure is an [`Error`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError<E> {
    #[error("non-success response: {status}")]
    NonSuccess { status: StatusCode, payload: E },
    #[error(transparent)]
    Client(#[from] Error),
}

impl<E> ServiceError<E> {
    /// Decoded error payload, if the server answered with a non-success status.
    pub fn payload(&self) -> Option<&E> {
        match self {
            Self::NonSuccess { payload, .. } => Some(payload),
            Self::Client(_) => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::NonSuccess { status, .. } => Some(*status),
            Self::Client(_) => None,
        }
    }

    pub fn into_payload(self) -> Option<E> {
        match self {
            Self::NonSuccess { payload, .. } => Some(payload),
            Self::Client(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error as _, io};

    use super::{Error, ServiceError, TransportError, TransportErrorKind};

    #[test]
    fn only_network_kinds_are_temporary() {
        assert!(TransportErrorKind::Timeout.is_temporary());
        assert!(TransportErrorKind::Connect.is_temporary());
        assert!(TransportErrorKind::ConnectionReset.is_temporary());
        assert!(!TransportErrorKind::Body.is_temporary());
        assert!(!TransportErrorKind::Cancelled.is_temporary());
        assert!(!TransportErrorKind::DeadlineExceeded.is_temporary());
        assert!(!TransportErrorKind::Other.is_temporary());
    }

    #[test]
    fn body_read_keeps_io_source() {
        let err = TransportError::body_read(io::Error::new(io::ErrorKind::Other, "disk"));
        assert_eq!(err.kind(), TransportErrorKind::Body);
        let source = err.source().expect("source kept");
        assert_eq!(
            source.downcast_ref::<io::Error>().map(io::Error::kind),
            Some(io::ErrorKind::Other)
        );
        assert!(err.to_string().starts_with("body error: "));
    }

    #[test]
    fn plain_error_has_no_source() {
        let err = TransportError::new(TransportErrorKind::Timeout, "slow");
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "timeout error: slow");
    }

    #[test]
    fn error_reports_retryability() {
        let temporary = Error::from(TransportError::new(TransportErrorKind::Timeout, "slow"));
        let terminal = Error::from(TransportError::new(TransportErrorKind::Other, "nope"));
        assert!(temporary.is_retryable());
        assert!(!terminal.is_retryable());
        assert!(!Error::Construction("bad".to_owned()).is_retryable());
    }

    #[test]
    fn service_error_exposes_payload() {
        let err: ServiceError<String> = ServiceError::NonSuccess {
            status: reqwest::StatusCode::NOT_FOUND,
            payload: "missing".to_owned(),
        };
        assert_eq!(err.payload().map(String::as_str), Some("missing"));
        assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
        assert_eq!(err.to_string(), "non-success response: 404 Not Found");
    }
}
