//! Inbound message bodies.
//!
//! [`Body`] is the lease handed out with every message head read from a connection. Its bytes
//! are pulled straight from the connection's content queue, one transport read per chunk, so a
//! slow consumer holds the peer back instead of buffering.
//!
//! # One-shot streaming
//!
//! [`Body::stream`] claims the body: the first stream yields the content, every later one
//! fails with [`ConnectionError::StreamAlreadyConsumed`].
//!
//! # Finalization
//!
//! The connection cannot move on to its next message before the current body has been read to
//! its end marker. Reaching the end finishes the read turn right away. Dropping a stream early,
//! or dropping a body that was never streamed, drains the remaining content in a task spawned
//! on the connection's runtime; the next `read`, `write` or `upgrade` waits for it.

mod session;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use http_body::{Frame, SizeHint};

use crate::connection::Shared;
use crate::protocol::ConnectionError;
use crate::transport::Transport;
use session::{Session, SessionRef};

/// The body of an inbound message.
pub struct Body<T: Transport> {
    kind: Kind<T>,
}

enum Kind<T: Transport> {
    /// The message carries no body
    Empty { claimed: AtomicBool },
    Session(SessionRef<Session<T>>),
}

impl<T: Transport> Body<T> {
    pub(crate) fn empty() -> Self {
        Self { kind: Kind::Empty { claimed: AtomicBool::new(false) } }
    }

    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { kind: Kind::Session(Session::new(shared)) }
    }

    /// Returns true if the message carries no body at all.
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::Empty { .. })
    }

    /// Streams the body, at most once.
    ///
    /// The body is claimed by this call, not by the first poll: a second call returns a stream
    /// failing with [`ConnectionError::StreamAlreadyConsumed`] even if the first one was never
    /// polled.
    pub fn stream(&self) -> BodyStream {
        match &self.kind {
            Kind::Empty { claimed } if claimed.swap(true, Ordering::AcqRel) => BodyStream::consumed(),
            Kind::Empty { .. } => BodyStream::empty(),
            Kind::Session(session) => match Session::claim(session) {
                Some(lease) => BodyStream::lease(lease),
                None => BodyStream::consumed(),
            },
        }
    }

    /// Collects the whole body.
    pub async fn to_bytes(self) -> Result<Bytes, ConnectionError> {
        let mut stream = self.stream();
        let mut collected = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(collected.freeze())
    }
}

impl<T: Transport> Drop for Body<T> {
    fn drop(&mut self) {
        if let Kind::Session(session) = &self.kind {
            // a body that was never streamed still has to be drained
            if let Some(lease) = Session::claim(session) {
                drop(lease);
            }
        }
    }
}

impl<T: Transport> fmt::Debug for Body<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").field("empty", &self.is_empty()).finish()
    }
}

/// A one-shot stream over the bytes of a [`Body`].
///
/// Also usable as an [`http_body::Body`], for example to forward an inbound body as an
/// outbound one.
pub struct BodyStream {
    inner: BoxStream<'static, Result<Bytes, ConnectionError>>,
    done: bool,
}

impl BodyStream {
    fn empty() -> Self {
        Self { inner: stream::empty().boxed(), done: true }
    }

    fn consumed() -> Self {
        Self { inner: stream::iter([Err(ConnectionError::StreamAlreadyConsumed)]).boxed(), done: false }
    }

    fn lease<T: Transport>(lease: session::Lease<T>) -> Self {
        let inner = stream::unfold(Some(lease), |lease| async move {
            let lease = lease?;
            match lease.next_chunk().await {
                Ok(Some(bytes)) => Some((Ok(bytes), Some(lease))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        });
        Self { inner: inner.boxed(), done: false }
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes, ConnectionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        let item = ready!(self.inner.poll_next_unpin(cx));
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        Poll::Ready(item)
    }
}

impl http_body::Body for BodyStream {
    type Data = Bytes;
    type Error = ConnectionError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }

    fn size_hint(&self) -> SizeHint {
        if self.done { SizeHint::with_exact(0) } else { SizeHint::default() }
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream").field("done", &self.done).finish_non_exhaustive()
    }
}
