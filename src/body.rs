use std::{fmt, io};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Request payload.
///
/// A `Reader` body is a one-shot stream; it is consumed by whichever attempt
/// reads it first. Buffered bodies can be handed out any number of times.
pub enum Body {
    Bytes(Bytes),
    Reader(Box<dyn AsyncRead + Send + Sync + Unpin>),
}

impl Body {
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        Self::Reader(Box::new(reader))
    }

    /// Buffered contents, if the body is not a stream.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Reader(_) => None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

impl From<Body> for reqwest::Body {
    fn from(value: Body) -> Self {
        match value {
            Body::Bytes(bytes) => reqwest::Body::from(bytes),
            Body::Reader(reader) => {
                reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(reader))
            }
        }
    }
}

/// A request body read into memory once, replayable for every attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayableBody {
    buffered: Bytes,
}

impl ReplayableBody {
    /// Reads `body` to the end. Buffered bodies are adopted without copying.
    pub async fn prepare(body: Body) -> io::Result<Self> {
        let buffered = match body {
            Body::Bytes(bytes) => bytes,
            Body::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Bytes::from(buf)
            }
        };
        Ok(Self { buffered })
    }

    /// Fresh, independently consumable copy of the buffered bytes.
    pub fn replay(&self) -> Body {
        Body::Bytes(self.buffered.clone())
    }

    pub fn len(&self) -> usize {
        self.buffered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }
}
