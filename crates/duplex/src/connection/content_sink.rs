use std::fmt::Display;
use std::pin::pin;

use bytes::Bytes;
use http_body_util::BodyExt;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ConnectionError, Message, PayloadItem, SendError};
use crate::transport::Transport;

/// Pipes an outbound body into transport writes, one awaited write per frame.
#[derive(Debug)]
pub(crate) struct ContentSink<'a, T> {
    transport: &'a T,
    framed: bool,
}

impl<'a, T: Transport> ContentSink<'a, T> {
    /// Ends the body with the framing's end-of-content marker.
    pub fn framed(transport: &'a T) -> Self {
        Self { transport, framed: true }
    }

    /// Writes the bytes as they are, nothing marks the end.
    pub fn raw(transport: &'a T) -> Self {
        Self { transport, framed: false }
    }

    pub async fn send<B>(&self, body: B) -> Result<(), ConnectionError>
    where
        B: http_body::Body<Data = Bytes> + Send,
        B::Error: Display,
    {
        let mut body = pin!(body);

        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| SendError::invalid_body(format!("can't read outbound body: {e}")))?;
            let bytes = match frame.into_data() {
                Ok(bytes) => bytes,
                Err(frame) => {
                    trace!(is_trailers = frame.is_trailers(), "skipping non-data frame");
                    continue;
                }
            };
            if bytes.is_empty() {
                continue;
            }

            ensure!(self.transport.is_open(), ConnectionError::ConnectionClosed);
            self.transport.write(Message::Payload(PayloadItem::Chunk(bytes))).await.map_err(write_error)?;
        }

        if self.framed {
            ensure!(self.transport.is_open(), ConnectionError::ConnectionClosed);
            self.transport.write(Message::Payload(PayloadItem::Eof)).await.map_err(write_error)?;
        }
        Ok(())
    }
}

/// I/O failures close the transport, so they surface as a closed connection; encoding
/// failures keep their cause.
pub(crate) fn write_error(e: SendError) -> ConnectionError {
    match e {
        SendError::Io { .. } => ConnectionError::ConnectionClosed,
        e => ConnectionError::from(e),
    }
}
