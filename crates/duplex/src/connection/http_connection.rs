use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, trace};

use crate::config::ConnectionConfig;
use crate::connection::content_sink::{ContentSink, write_error};
use crate::connection::event_handler::TransportEventHandler;
use crate::connection::turn::Turn;
use crate::connection::upgrade::Upgraded;
use crate::ensure;
use crate::protocol::body::Body;
use crate::protocol::{ConnectionError, Message, MessageHead};
use crate::role::Role;
use crate::sync::{AsyncQueue, Slot};
use crate::transport::{DECOMPRESSOR, HTTP_CODEC, Transport};

/// A message head read from the peer, and whether a body follows it.
#[derive(Debug)]
pub(crate) struct Inbound<H> {
    pub head: H,
    pub has_body: bool,
}

/// State shared by the connection, its event handler and the bodies it hands out.
#[derive(Debug)]
pub(crate) struct Shared<T> {
    pub transport: T,
    pub turn: Turn,
    pub contents: AsyncQueue<Bytes>,
    /// The drain of the last abandoned body, awaited before the next turn starts
    pub pending: Mutex<Option<JoinHandle<()>>>,
    pub handle: Handle,
}

impl<T: Transport> Shared<T> {
    /// Takes the next content slot, asking the transport for one more read if none is queued.
    pub async fn next_content(&self) -> Slot<Bytes> {
        if let Some(slot) = self.contents.try_dequeue() {
            return slot;
        }
        self.transport.read();
        self.contents.dequeue().await
    }

    pub fn set_pending(&self, task: JoinHandle<()>) {
        // replacing detaches an earlier drain, which has already reached its end marker
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    async fn settle(&self) {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = pending {
            if let Err(e) = task.await {
                trace!(cause = %e, "pending drain did not complete");
            }
        }
    }
}

/// One HTTP/1.x connection, as seen by its consumer.
///
/// Messages are exchanged in turns: a body handed out by [`read`](Connection::read) must be
/// consumed or dropped before the next message head becomes visible, and writes never
/// overlap reads in the direction fixed by the role `R`.
#[derive(Debug)]
pub struct Connection<R: Role, T: Transport> {
    shared: Arc<Shared<T>>,
    messages: Arc<AsyncQueue<Inbound<R::InHead>>>,
}

impl<R, T> Connection<R, T>
where
    R: Role,
    T: Transport<OutHead = R::OutHead>,
{
    /// Creates a connection over `transport`, along with the handler that must receive the
    /// transport's events.
    pub fn new(transport: T, config: &ConnectionConfig) -> (Self, TransportEventHandler<R::InHead, T>) {
        let shared = Arc::new(Shared {
            transport,
            turn: Turn::new(R::WRITE_FIRST),
            contents: AsyncQueue::new(),
            pending: Mutex::new(None),
            handle: config.handle().clone(),
        });
        let messages = Arc::new(AsyncQueue::new());

        let handler = TransportEventHandler::new(Arc::clone(&shared), Arc::clone(&messages));
        (Self { shared, messages }, handler)
    }

    /// Reads the next message head.
    ///
    /// The returned body must be streamed to its end or dropped; until then no further head
    /// is delivered. Fails with [`ConnectionError::ConnectionClosed`] once the transport has
    /// closed and every message received before was read.
    pub async fn read(&self) -> Result<(R::InHead, Body<T>), ConnectionError> {
        self.shared.settle().await;

        match self.messages.dequeue().await {
            Slot::Item(Inbound { head, has_body: false }) => Ok((head, Body::empty())),
            Slot::Item(Inbound { head, has_body: true }) => Ok((head, Body::new(Arc::clone(&self.shared)))),
            Slot::End | Slot::Closed => Err(ConnectionError::ConnectionClosed),
        }
    }

    /// Writes a message head followed by `body`.
    ///
    /// Completes once the last frame was flushed. When the body can only be delimited by
    /// closing the connection, the transport is closed afterwards.
    pub async fn write<B>(&self, head: R::OutHead, body: B) -> Result<(), ConnectionError>
    where
        B: http_body::Body<Data = Bytes> + Send,
        B::Error: Display,
    {
        self.shared.settle().await;

        let transport = &self.shared.transport;
        self.shared.turn.begin_write(transport).await?;
        ensure!(transport.is_open(), ConnectionError::ConnectionClosed);

        let payload_size = head.outbound_payload_size(&body.size_hint())?;
        transport.write(Message::Header((head, payload_size))).await.map_err(write_error)?;
        ContentSink::framed(transport).send(body).await?;

        if payload_size.is_until_close() {
            info!("closing connection to delimit the message body");
            transport.close().await;
        }
        Ok(())
    }

    /// Switches the connection to raw byte passthrough.
    ///
    /// Takes the turn for the rest of the connection's life, drops the HTTP framing stages and
    /// hands back the raw byte stream.
    pub async fn upgrade(self) -> Result<Upgraded<T>, ConnectionError> {
        self.shared.settle().await;
        self.shared.turn.claim(&self.shared.transport).await?;

        let messages = Arc::clone(&self.messages);
        let shared = Arc::clone(&self.shared);
        self.shared
            .transport
            .run_in_context(Box::new(move |stages| {
                messages.close();
                for name in [HTTP_CODEC, DECOMPRESSOR] {
                    stages.remove(name);
                }
                shared.transport.read();
            }))
            .await?;

        info!(role = R::name(), "connection upgraded");
        Ok(Upgraded::new(self.shared))
    }

    pub async fn close(&self) {
        self.shared.transport.close().await;
    }

    pub fn is_open(&self) -> bool {
        self.shared.transport.is_open()
    }

    /// Completes once the transport has closed.
    pub async fn closed(&self) {
        self.shared.transport.closed().await;
    }
}
