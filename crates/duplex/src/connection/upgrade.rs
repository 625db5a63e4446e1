//! Raw byte passthrough after [`Connection::upgrade`](crate::connection::Connection::upgrade).

use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::connection::content_sink::ContentSink;
use crate::connection::http_connection::Shared;
use crate::protocol::ConnectionError;
use crate::sync::Slot;
use crate::transport::Transport;

/// An upgraded connection.
///
/// As a [`Stream`] it yields the raw inbound bytes in arrival order and ends when the
/// transport closes. Outbound bytes are written with [`send`](Upgraded::send).
pub struct Upgraded<T> {
    shared: Arc<Shared<T>>,
    inbound: BoxStream<'static, Bytes>,
}

impl<T: Transport> Upgraded<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        let inbound = stream::unfold(Arc::clone(&shared), |shared| async move {
            loop {
                match shared.next_content().await {
                    Slot::Item(bytes) => return Some((bytes, shared)),
                    // no body framing is left to end anything
                    Slot::End => {}
                    Slot::Closed => {
                        debug!("upgraded stream reached end of input");
                        return None;
                    }
                }
            }
        })
        .boxed();

        Self { shared, inbound }
    }

    /// Writes every frame of `body` unframed.
    pub async fn send<B>(&self, body: B) -> Result<(), ConnectionError>
    where
        B: http_body::Body<Data = Bytes> + Send,
        B::Error: Display,
    {
        ContentSink::raw(&self.shared.transport).send(body).await
    }

    pub async fn close(&self) {
        self.shared.transport.close().await;
    }

    pub fn is_open(&self) -> bool {
        self.shared.transport.is_open()
    }
}

impl<T> Stream for Upgraded<T> {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inbound.poll_next_unpin(cx)
    }
}

impl<T> std::fmt::Debug for Upgraded<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upgraded").finish_non_exhaustive()
    }
}
