//! [`Transport`] over a pair of tokio I/O halves.
//!
//! [`IoTransport`] is the write side shared by the connection; [`Driver`] owns the read half
//! and is the single delivery context, it must be spawned for events to flow.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{Mutex, Notify, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::Decompressor;
use crate::config::ConnectionConfig;
use crate::protocol::{ConnectionError, Message, MessageHead, PayloadItem, PayloadSize, ProtocolViolation, SendError};
use crate::role::Role;
use crate::transport::message_writer::MessageWriter;
use crate::transport::pipeline::Pipeline;
use crate::transport::{ContextTask, EventHandler, Transport, TransportEvent};

/// Flags shared by the write side and the delivery context.
#[derive(Debug)]
pub(crate) struct TransportState {
    open: AtomicBool,
    auto_read: AtomicBool,
    read_requested: AtomicBool,
    framed: AtomicBool,
    log_frames: AtomicBool,
    wakeup: Notify,
    closed: CancellationToken,
}

impl TransportState {
    pub fn new(log_frames: bool) -> Self {
        Self {
            open: AtomicBool::new(true),
            auto_read: AtomicBool::new(true),
            read_requested: AtomicBool::new(false),
            framed: AtomicBool::new(true),
            log_frames: AtomicBool::new(log_frames),
            wakeup: Notify::new(),
            closed: CancellationToken::new(),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn auto_read(&self) -> bool {
        self.auto_read.load(Ordering::Acquire)
    }

    pub(crate) fn set_auto_read(&self, auto_read: bool) {
        self.auto_read.store(auto_read, Ordering::Release);
        if auto_read {
            self.wakeup.notify_one();
        }
    }

    /// Whether the driver may start a read cycle, consuming a pending `read()` grant.
    fn readable(&self) -> bool {
        self.auto_read() || self.read_requested.swap(false, Ordering::AcqRel)
    }

    fn mark_closed(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!("marking transport closed");
        }
        self.closed.cancel();
        self.wakeup.notify_one();
    }

    pub(crate) fn set_framed(&self, framed: bool) {
        self.framed.store(framed, Ordering::Release);
    }

    pub(crate) fn set_log_frames(&self, log_frames: bool) {
        self.log_frames.store(log_frames, Ordering::Release);
    }
}

/// The write side of an I/O backed transport.
#[derive(Debug)]
pub struct IoTransport<R: Role, W> {
    state: Arc<TransportState>,
    writer: Mutex<MessageWriter<W, R::Encoder>>,
    tasks: mpsc::UnboundedSender<ContextTask>,
}

/// The delivery context: reads the socket, runs the inbound stages and feeds the handler.
#[derive(Debug)]
pub struct Driver<R: Role, Rd> {
    state: Arc<TransportState>,
    reader: Rd,
    buffer: BytesMut,
    pipeline: Pipeline<R::Decoder, R::InHead>,
    tasks: mpsc::UnboundedReceiver<ContextTask>,
}

impl<R: Role, W> IoTransport<R, W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Assembles the stages for role `R` over the given halves.
    pub fn new<Rd>(reader: Rd, writer: W, config: &ConnectionConfig) -> (Self, Driver<R, Rd>)
    where
        Rd: AsyncRead + Unpin + Send + 'static,
    {
        let state = Arc::new(TransportState::new(config.log_frames()));
        let (decoder, encoder) = R::codec();
        let decompressor = (R::DECOMPRESS && config.decompress()).then(Decompressor::new);
        let (task_sender, task_receiver) = mpsc::unbounded_channel();

        let transport = Self {
            state: Arc::clone(&state),
            writer: Mutex::new(MessageWriter::with_capacity(writer, encoder, config.write_buffer_size())),
            tasks: task_sender,
        };

        let driver = Driver {
            pipeline: Pipeline::new(decoder, decompressor, config.log_frames(), Arc::clone(&state)),
            state,
            reader,
            buffer: BytesMut::with_capacity(config.read_buffer_size()),
            tasks: task_receiver,
        };

        (transport, driver)
    }

    fn log_frame(&self, frame: &Message<(R::OutHead, PayloadSize)>) {
        if !self.state.log_frames.load(Ordering::Acquire) {
            return;
        }
        match frame {
            Message::Header((head, payload_size)) => {
                debug!(kind = "head", version = ?head.version(), ?payload_size, headers = head.headers().len(), "outbound");
            }
            Message::Payload(PayloadItem::Chunk(bytes)) => debug!(kind = "content", len = bytes.len(), "outbound"),
            Message::Payload(PayloadItem::Eof) => debug!(kind = "end of content", "outbound"),
        }
    }
}

impl<R: Role, W> Transport for IoTransport<R, W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    type OutHead = R::OutHead;

    async fn write(&self, frame: Message<(R::OutHead, PayloadSize)>) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        if !self.state.is_open() {
            return Err(io::Error::from(io::ErrorKind::NotConnected).into());
        }
        self.log_frame(&frame);

        let encoded = if self.state.framed.load(Ordering::Acquire) {
            writer.write(frame)
        } else {
            match frame {
                Message::Payload(PayloadItem::Chunk(bytes)) => {
                    writer.write_raw(&bytes);
                    Ok(())
                }
                Message::Payload(PayloadItem::Eof) => Ok(()),
                Message::Header(_) => Err(SendError::invalid_head("message head written after framing was removed")),
            }
        };

        let result = match encoded {
            Ok(()) => tokio::select! {
                biased;
                result = writer.flush() => result,
                () = self.state.closed.cancelled() => Err(io::Error::from(io::ErrorKind::BrokenPipe).into()),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!(cause = %e, "can't write to transport, closing connection");
            writer.clear_buf();
            self.state.mark_closed();
        }
        result
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    async fn close(&self) {
        self.state.mark_closed();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            trace!(cause = %e, "shutdown after close");
        }
    }

    async fn closed(&self) {
        self.state.closed.cancelled().await;
    }

    fn set_auto_read(&self, auto_read: bool) {
        self.state.set_auto_read(auto_read);
    }

    fn read(&self) {
        self.state.read_requested.store(true, Ordering::Release);
        self.state.wakeup.notify_one();
    }

    async fn run_in_context(&self, task: ContextTask) -> Result<(), ConnectionError> {
        let (done, finished) = oneshot::channel();
        let task: ContextTask = Box::new(move |stages| {
            task(stages);
            let _ = done.send(());
        });

        self.tasks.send(task).map_err(|_closed| ConnectionError::ConnectionClosed)?;
        self.state.wakeup.notify_one();
        finished.await.map_err(|_dropped| ConnectionError::ConnectionClosed)
    }
}

/// Outcome of waiting for more inbound bytes.
enum Fill {
    Data,
    Interrupted,
    Eof,
    Stop,
}

impl<R: Role, Rd> Driver<R, Rd>
where
    Rd: AsyncRead + Unpin + Send + 'static,
{
    /// Delivers events to `handler` until the transport closes.
    ///
    /// The handler always sees [`TransportEvent::Closed`] last. A protocol violation closes
    /// the transport and is returned.
    pub async fn run<Hd>(mut self, mut handler: Hd) -> Result<(), ProtocolViolation>
    where
        Hd: EventHandler<R::InHead>,
    {
        let result = self.pump(&mut handler).await;

        self.state.mark_closed();
        self.pipeline.log(&TransportEvent::Closed);
        let closed = handler.on_event(TransportEvent::Closed).await;
        info!(role = R::name(), "connection closed");

        result.and(closed)
    }

    async fn pump<Hd>(&mut self, handler: &mut Hd) -> Result<(), ProtocolViolation>
    where
        Hd: EventHandler<R::InHead>,
    {
        loop {
            while !self.state.readable() {
                tokio::select! {
                    biased;
                    () = self.state.closed.cancelled() => return Ok(()),
                    Some(task) = self.tasks.recv() => self.run_task(task),
                    () = self.state.wakeup.notified() => {}
                }
            }

            if !self.read_cycle(handler).await? {
                return Ok(());
            }
        }
    }

    /// Delivers events until the buffer runs dry, or a single event while auto-read is off,
    /// and ends with `ReadComplete`. Returns `false` once the transport should stop.
    async fn read_cycle<Hd>(&mut self, handler: &mut Hd) -> Result<bool, ProtocolViolation>
    where
        Hd: EventHandler<R::InHead>,
    {
        let mut delivered = false;
        loop {
            while let Ok(task) = self.tasks.try_recv() {
                self.run_task(task);
            }

            match self.pipeline.next_event(&mut self.buffer) {
                Ok(Some(event)) => {
                    handler.on_event(event).await?;
                    delivered = true;
                    if !self.state.auto_read() {
                        break;
                    }
                    continue;
                }
                Ok(None) if delivered => break,
                Ok(None) => {}
                Err(e) => {
                    warn!(cause = %e, "can't decode inbound bytes, closing connection");
                    return Ok(false);
                }
            }

            match self.fill().await {
                Fill::Data | Fill::Interrupted => {}
                Fill::Eof => {
                    self.finish(handler).await?;
                    return Ok(false);
                }
                Fill::Stop => return Ok(false),
            }
        }

        self.pipeline.log(&TransportEvent::ReadComplete);
        handler.on_event(TransportEvent::ReadComplete).await?;
        Ok(true)
    }

    async fn fill(&mut self) -> Fill {
        tokio::select! {
            biased;
            () = self.state.closed.cancelled() => Fill::Stop,
            Some(task) = self.tasks.recv() => {
                self.run_task(task);
                Fill::Interrupted
            }
            result = self.reader.read_buf(&mut self.buffer) => match result {
                Ok(0) => {
                    debug!("peer closed its write side");
                    Fill::Eof
                }
                Ok(n) => {
                    trace!(bytes = n, "read from transport");
                    Fill::Data
                }
                Err(e) => {
                    warn!(cause = %e, "can't read from transport, closing connection");
                    Fill::Stop
                }
            },
        }
    }

    /// Flushes whatever the stages can still produce once the peer stopped sending.
    async fn finish<Hd>(&mut self, handler: &mut Hd) -> Result<(), ProtocolViolation>
    where
        Hd: EventHandler<R::InHead>,
    {
        loop {
            match self.pipeline.next_event_eof(&mut self.buffer) {
                Ok(Some(event)) => handler.on_event(event).await?,
                Ok(None) => break,
                Err(e) => {
                    warn!(cause = %e, "incomplete message at end of stream");
                    break;
                }
            }
        }
        self.pipeline.log(&TransportEvent::ReadComplete);
        handler.on_event(TransportEvent::ReadComplete).await
    }

    fn run_task(&mut self, task: ContextTask) {
        task(&mut self.pipeline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{Client, Server};
    use crate::transport::HTTP_CODEC;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, WriteHalf};
    use tokio::runtime::Handle;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    type Events = mpsc::UnboundedReceiver<(&'static str, Bytes)>;

    /// Forwards the name of every event, with its bytes when it carries any.
    #[derive(Debug)]
    struct Recorder(mpsc::UnboundedSender<(&'static str, Bytes)>);

    impl<H: Send + 'static> EventHandler<H> for Recorder {
        async fn on_event(&mut self, event: TransportEvent<H>) -> Result<(), ProtocolViolation> {
            let bytes = match &event {
                TransportEvent::Content(bytes) | TransportEvent::LastContent(bytes) | TransportEvent::Raw(bytes) => bytes.clone(),
                _ => Bytes::new(),
            };
            let _ = self.0.send((event.name(), bytes));
            Ok(())
        }
    }

    fn spawn<R: Role>() -> (IoTransport<R, WriteHalf<DuplexStream>>, DuplexStream, Events, JoinHandle<Result<(), ProtocolViolation>>) {
        let (local, peer) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(local);
        let (transport, driver) = IoTransport::<R, _>::new(reader, writer, &ConnectionConfig::new(Handle::current()));
        let (sender, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(driver.run(Recorder(sender)));
        (transport, peer, events, task)
    }

    async fn next(events: &mut Events) -> (&'static str, Bytes) {
        timeout(Duration::from_secs(1), events.recv()).await.expect("no event delivered").unwrap()
    }

    async fn assert_quiet(events: &mut Events) {
        assert!(timeout(Duration::from_millis(50), events.recv()).await.is_err());
    }

    #[tokio::test]
    async fn paused_reading_delivers_one_event_per_grant() {
        let (transport, mut peer, mut events, _task) = spawn::<Server>();
        transport.set_auto_read(false);
        peer.write_all(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n").await.unwrap();
        assert_quiet(&mut events).await;

        transport.read();
        assert_eq!(next(&mut events).await.0, "head");
        assert_eq!(next(&mut events).await.0, "read complete");
        assert_quiet(&mut events).await;

        transport.read();
        assert_eq!(next(&mut events).await.0, "last content");
        assert_eq!(next(&mut events).await.0, "read complete");
        assert_quiet(&mut events).await;

        // resuming delivers everything buffered in one cycle
        transport.set_auto_read(true);
        assert_eq!(next(&mut events).await.0, "head");
        assert_eq!(next(&mut events).await.0, "last content");
        assert_eq!(next(&mut events).await.0, "read complete");
        assert_quiet(&mut events).await;
    }

    #[tokio::test]
    async fn context_task_interrupts_pending_read() {
        let (transport, mut peer, mut events, _task) = spawn::<Server>();
        // let the driver block on the socket
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (names_sender, names) = oneshot::channel();
        let task: ContextTask = Box::new(move |stages| {
            let _ = names_sender.send(stages.names());
            stages.remove(HTTP_CODEC);
        });
        timeout(Duration::from_secs(1), transport.run_in_context(task)).await.expect("context task not run").unwrap();
        assert_eq!(names.await.unwrap(), vec![HTTP_CODEC]);

        peer.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(next(&mut events).await, ("raw bytes", Bytes::from_static(b"GET / HTTP/1.1\r\n\r\n")));
        assert_eq!(next(&mut events).await.0, "read complete");

        transport.write(Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"raw")))).await.unwrap();
        let mut received = [0u8; 3];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"raw");
    }

    #[tokio::test]
    async fn end_of_stream_finishes_until_close_body() {
        let (transport, mut peer, mut events, task) = spawn::<Client>();
        peer.write_all(b"HTTP/1.1 200 OK\r\n\r\nbody").await.unwrap();
        drop(peer);

        assert_eq!(next(&mut events).await.0, "head");
        assert_eq!(next(&mut events).await, ("content", Bytes::from_static(b"body")));
        assert_eq!(next(&mut events).await.0, "read complete");
        assert_eq!(next(&mut events).await, ("last content", Bytes::new()));
        assert_eq!(next(&mut events).await.0, "read complete");
        assert_eq!(next(&mut events).await.0, "closed");

        assert!(task.await.unwrap().is_ok());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn close_stops_driver_and_rejects_writes() {
        let (transport, mut peer, mut events, task) = spawn::<Server>();

        transport.close().await;
        timeout(Duration::from_secs(1), transport.closed()).await.expect("closed signal not fired");
        assert!(!transport.is_open());
        assert_eq!(next(&mut events).await.0, "closed");
        assert!(task.await.unwrap().is_ok());

        let write = transport.write(Message::Payload(PayloadItem::Eof)).await;
        assert!(matches!(write, Err(SendError::Io { .. })));
        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
    }
}
