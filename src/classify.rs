use crate::{TransportError, TransportErrorKind};

/// Capability marker for errors that can report a transient condition.
pub trait Temporary {
    fn is_temporary(&self) -> bool;
}

impl Temporary for TransportErrorKind {
    fn is_temporary(&self) -> bool {
        TransportErrorKind::is_temporary(*self)
    }
}

impl Temporary for TransportError {
    fn is_temporary(&self) -> bool {
        self.kind().is_temporary()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryDecision {
    Retry,
    Terminal,
}

/// Decides whether a transport failure is worth another attempt.
///
/// Only errors reporting a temporary condition are retried. A well-formed
/// response is never an error here, whatever its status code.
pub fn classify<E: Temporary + ?Sized>(err: &E) -> RetryDecision {
    if err.is_temporary() {
        RetryDecision::Retry
    } else {
        RetryDecision::Terminal
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, RetryDecision, Temporary};
    use crate::{TransportError, TransportErrorKind};

    struct Flag(bool);

    impl Temporary for Flag {
        fn is_temporary(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn temporary_signal_drives_decision() {
        assert_eq!(classify(&Flag(true)), RetryDecision::Retry);
        assert_eq!(classify(&Flag(false)), RetryDecision::Terminal);
    }

    #[test]
    fn transport_errors_dispatch_on_kind() {
        let retry = [
            TransportErrorKind::Timeout,
            TransportErrorKind::Connect,
            TransportErrorKind::ConnectionReset,
        ];
        for kind in retry {
            assert_eq!(
                classify(&TransportError::new(kind, "x")),
                RetryDecision::Retry
            );
        }

        let terminal = [
            TransportErrorKind::Body,
            TransportErrorKind::Redirect,
            TransportErrorKind::Request,
            TransportErrorKind::Cancelled,
            TransportErrorKind::DeadlineExceeded,
            TransportErrorKind::Other,
        ];
        for kind in terminal {
            assert_eq!(
                classify(&TransportError::new(kind, "x")),
                RetryDecision::Terminal
            );
        }
    }
}
