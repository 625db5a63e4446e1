//! Bridges transport events into the connection's queues.
//!
//! The handler runs on the transport's delivery context only, so its phase and accumulation
//! buffer are plain fields. Backpressure comes from switching auto-read off while a body is
//! being consumed: every further chunk is then pulled by the body stream.

use std::sync::Arc;

use bytes::BytesMut;
use tracing::trace;

use crate::connection::http_connection::{Inbound, Shared};
use crate::protocol::ProtocolViolation;
use crate::sync::AsyncQueue;
use crate::transport::{EventHandler, Transport, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the next message head
    Idle,
    /// Forwarding the payload of a message with a body
    Body,
    /// Swallowing the end marker of a message without a body
    Skip,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Body => "reading a body",
            Phase::Skip => "skipping an empty body",
        }
    }
}

#[derive(Debug)]
pub struct TransportEventHandler<H, T> {
    shared: Arc<Shared<T>>,
    messages: Arc<AsyncQueue<Inbound<H>>>,
    phase: Phase,
    buffer: BytesMut,
}

impl<H, T> TransportEventHandler<H, T>
where
    H: Send + 'static,
    T: Transport,
{
    pub(crate) fn new(shared: Arc<Shared<T>>, messages: Arc<AsyncQueue<Inbound<H>>>) -> Self {
        Self { shared, messages, phase: Phase::Idle, buffer: BytesMut::new() }
    }

    async fn handle(&mut self, event: TransportEvent<H>) -> Result<(), ProtocolViolation> {
        match (self.phase, event) {
            (Phase::Idle, TransportEvent::Head(head, payload_size)) => {
                let has_body = !payload_size.is_empty();
                trace!(has_body, ?payload_size, "message head arrived");
                self.messages.enqueue(Inbound { head, has_body });
                if has_body {
                    self.shared.transport.set_auto_read(false);
                    self.phase = Phase::Body;
                } else {
                    self.phase = Phase::Skip;
                }
            }

            (Phase::Skip, TransportEvent::Content(_)) => {}
            (Phase::Body, TransportEvent::Content(bytes)) => self.buffer.extend_from_slice(&bytes),

            (Phase::Skip, TransportEvent::LastContent(_)) => {
                self.phase = Phase::Idle;
                // the consumer never streams an empty body, so its turn ends here
                if let Err(e) = self.shared.turn.end_read(&self.shared.transport).await {
                    trace!(cause = %e, "turn not taken back after an empty body");
                }
            }
            (Phase::Body, TransportEvent::LastContent(bytes)) => {
                self.flush();
                if !bytes.is_empty() {
                    self.shared.contents.enqueue(bytes);
                }
                self.shared.contents.enqueue_end();
                self.phase = Phase::Idle;
                self.shared.transport.set_auto_read(true);
            }

            (_, TransportEvent::ReadComplete) => self.flush(),

            (_, TransportEvent::Raw(bytes)) => {
                if !bytes.is_empty() {
                    self.shared.contents.enqueue(bytes);
                }
                self.shared.transport.set_auto_read(false);
            }

            (_, TransportEvent::Closed) => {
                self.flush();
                self.messages.close();
                self.shared.contents.close();
            }

            (phase, event) => return Err(ProtocolViolation::unexpected(event.name(), phase.name())),
        }
        Ok(())
    }

    /// Hands the bytes gathered so far to the body consumer as one chunk.
    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.shared.contents.enqueue(self.buffer.split().freeze());
        }
    }
}

impl<H, T> EventHandler<H> for TransportEventHandler<H, T>
where
    H: Send + 'static,
    T: Transport,
{
    async fn on_event(&mut self, event: TransportEvent<H>) -> Result<(), ProtocolViolation> {
        self.handle(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::turn::Turn;
    use crate::protocol::{ConnectionError, Message, PayloadSize, SendError};
    use crate::sync::Slot;
    use crate::transport::ContextTask;
    use bytes::Bytes;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::runtime::Handle;
    use tokio_util::sync::CancellationToken;

    /// Records auto-read toggles, everything else is inert.
    #[derive(Debug)]
    struct StubTransport {
        auto_read: AtomicBool,
        closed: CancellationToken,
    }

    impl Transport for StubTransport {
        type OutHead = ();

        async fn write(&self, _frame: Message<((), PayloadSize)>) -> Result<(), SendError> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            !self.closed.is_cancelled()
        }

        async fn close(&self) {
            self.closed.cancel();
        }

        async fn closed(&self) {
            self.closed.cancelled().await;
        }

        fn set_auto_read(&self, auto_read: bool) {
            self.auto_read.store(auto_read, Ordering::SeqCst);
        }

        fn read(&self) {}

        async fn run_in_context(&self, _task: ContextTask) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    fn handler(write_first: bool) -> TransportEventHandler<&'static str, StubTransport> {
        let shared = Arc::new(Shared {
            transport: StubTransport { auto_read: AtomicBool::new(true), closed: CancellationToken::new() },
            turn: Turn::new(write_first),
            contents: AsyncQueue::new(),
            pending: Mutex::new(None),
            handle: Handle::current(),
        });
        TransportEventHandler::new(shared, Arc::new(AsyncQueue::new()))
    }

    fn auto_read(handler: &TransportEventHandler<&'static str, StubTransport>) -> bool {
        handler.shared.transport.auto_read.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn batches_content_until_read_complete() {
        let mut handler = handler(true);

        handler.on_event(TransportEvent::Head("post", PayloadSize::Chunked)).await.unwrap();
        assert!(!auto_read(&handler));
        assert!(matches!(handler.messages.try_dequeue(), Some(Slot::Item(Inbound { head: "post", has_body: true }))));

        handler.on_event(TransportEvent::Content(Bytes::from_static(b"ab"))).await.unwrap();
        handler.on_event(TransportEvent::Content(Bytes::from_static(b"cd"))).await.unwrap();
        assert!(handler.shared.contents.is_empty());

        handler.on_event(TransportEvent::ReadComplete).await.unwrap();
        assert_eq!(handler.shared.contents.try_dequeue(), Some(Slot::Item(Bytes::from_static(b"abcd"))));

        handler.on_event(TransportEvent::Content(Bytes::from_static(b"ef"))).await.unwrap();
        handler.on_event(TransportEvent::LastContent(Bytes::from_static(b"gh"))).await.unwrap();
        assert!(auto_read(&handler));
        assert_eq!(handler.shared.contents.try_dequeue(), Some(Slot::Item(Bytes::from_static(b"ef"))));
        assert_eq!(handler.shared.contents.try_dequeue(), Some(Slot::Item(Bytes::from_static(b"gh"))));
        assert_eq!(handler.shared.contents.try_dequeue(), Some(Slot::End));
    }

    #[tokio::test]
    async fn empty_body_ends_the_read_turn() {
        let mut handler = handler(true);
        // the client took the turn to send its request
        handler.shared.turn.begin_write(&handler.shared.transport).await.unwrap();

        handler.on_event(TransportEvent::Head("no content", PayloadSize::Empty)).await.unwrap();
        assert!(auto_read(&handler));
        handler.on_event(TransportEvent::Content(Bytes::from_static(b"stray"))).await.unwrap();
        handler.on_event(TransportEvent::LastContent(Bytes::new())).await.unwrap();

        assert!(handler.shared.contents.is_empty());
        assert!(matches!(handler.messages.try_dequeue(), Some(Slot::Item(Inbound { has_body: false, .. }))));
        let next_write = handler.shared.turn.begin_write(&handler.shared.transport);
        tokio::time::timeout(Duration::from_secs(1), next_write).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unexpected_events_are_violations() {
        let mut handler = handler(false);
        let violation = handler.on_event(TransportEvent::Content(Bytes::from_static(b"x"))).await.unwrap_err();
        assert_eq!(violation, ProtocolViolation::unexpected("content", "idle"));

        handler.on_event(TransportEvent::Head("a", PayloadSize::Length(1))).await.unwrap();
        let violation = handler.on_event(TransportEvent::Head("b", PayloadSize::Empty)).await.unwrap_err();
        assert_eq!(violation, ProtocolViolation::unexpected("head", "reading a body"));
    }

    #[tokio::test]
    async fn close_unblocks_both_queues() {
        let mut handler = handler(false);
        handler.on_event(TransportEvent::Head("a", PayloadSize::Length(4))).await.unwrap();
        handler.on_event(TransportEvent::Content(Bytes::from_static(b"ab"))).await.unwrap();
        handler.on_event(TransportEvent::Closed).await.unwrap();

        assert!(matches!(handler.messages.dequeue().await, Slot::Item(_)));
        assert!(matches!(handler.messages.dequeue().await, Slot::Closed));
        assert_eq!(handler.shared.contents.dequeue().await, Slot::Item(Bytes::from_static(b"ab")));
        assert_eq!(handler.shared.contents.dequeue().await, Slot::Closed);
    }

    #[tokio::test]
    async fn raw_bytes_pause_delivery() {
        let mut handler = handler(true);
        handler.on_event(TransportEvent::Raw(Bytes::from_static(b"\x01\x02"))).await.unwrap();

        assert!(!auto_read(&handler));
        assert_eq!(handler.shared.contents.try_dequeue(), Some(Slot::Item(Bytes::from_static(b"\x01\x02"))));
    }
}
