use std::error::Error as StdError;
use std::fmt;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures_core::Stream;
use parking_lot::Mutex;

use crate::error::BoxError;

/// The body of an HTTP message.
///
/// Either buffered bytes or a stream of chunks. The interior lock exists so
/// a body can be [taken](Body::take) out of a shared request exactly once.
pub struct Body {
    kind: Mutex<BodyKind>,
}

enum BodyKind {
    Stream(Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send + Sync>>),
    Once(Bytes),
    Empty,
    Taken,
}

impl Body {
    /// Create an empty `Body`.
    pub fn empty() -> Self {
        Self::from_kind(BodyKind::Empty)
    }

    /// Create a body directly from bytes.
    pub fn once(bytes: impl Into<Bytes>) -> Self {
        Self::from_kind(BodyKind::Once(bytes.into()))
    }

    /// Create a `Body` from a stream of chunks.
    pub fn stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let stream = stream.map(|chunk| chunk.map_err(|err| Box::new(err) as BoxError));
        Self::from_kind(BodyKind::Stream(Box::pin(stream)))
    }

    fn from_kind(kind: BodyKind) -> Self {
        Self {
            kind: Mutex::new(kind),
        }
    }

    /// Take the body out, leaving a marker behind; `None` if it was
    /// already taken.
    pub fn take(&self) -> Option<Body> {
        match mem::replace(&mut *self.kind.lock(), BodyKind::Taken) {
            BodyKind::Taken => None,
            kind => Some(Self::from_kind(kind)),
        }
    }

    /// Collect the whole body into one buffer.
    pub async fn bytes(mut self) -> Result<Bytes, BoxError> {
        let mut buf = BytesMut::new();

        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }

        Ok(buf.freeze())
    }

    // Appends to buffered bodies; a streaming body is replaced.
    pub(crate) fn append(&self, chunk: Bytes) {
        let mut kind = self.kind.lock();

        match &mut *kind {
            BodyKind::Once(bytes) => {
                let mut buf = BytesMut::with_capacity(bytes.len() + chunk.len());
                buf.extend_from_slice(bytes);
                buf.extend_from_slice(&chunk);
                *bytes = buf.freeze();
            }
            _ => *kind = BodyKind::Once(chunk),
        }
    }
}

impl Stream for Body {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut kind = self.kind.lock();

        match &mut *kind {
            BodyKind::Stream(stream) => stream.as_mut().poll_next(cx),
            BodyKind::Once(bytes) => {
                let bytes = mem::take(bytes);
                *kind = BodyKind::Empty;
                Poll::Ready(Some(Ok(bytes)))
            }
            BodyKind::Empty | BodyKind::Taken => Poll::Ready(None),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &*self.kind.lock() {
            BodyKind::Stream(stream) => stream.size_hint(),
            BodyKind::Once(bytes) => (bytes.len(), Some(bytes.len())),
            BodyKind::Empty | BodyKind::Taken => (0, Some(0)),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::once(bytes)
    }
}

impl From<String> for Body {
    fn from(string: String) -> Self {
        Self::once(string)
    }
}

impl From<&'static str> for Body {
    fn from(string: &'static str) -> Self {
        Self::once(string)
    }
}
