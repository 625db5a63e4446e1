use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;

use crate::protocol::SendError;

/// Encodes outbound frames into a buffer and writes them to the socket.
#[derive(Debug)]
pub(crate) struct MessageWriter<W, E> {
    writer: W,
    buffer: BytesMut,
    encoder: E,
}

impl<W, E> MessageWriter<W, E>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, encoder: E, buffer_size: usize) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder }
    }

    pub fn clear_buf(&mut self) {
        self.buffer.clear();
    }

    #[inline]
    pub fn write<I>(&mut self, item: I) -> Result<(), SendError>
    where
        E: Encoder<I, Error = SendError>,
    {
        self.encoder.encode(item, &mut self.buffer)
    }

    /// Buffers bytes as they are, bypassing the encoder.
    #[inline]
    pub fn write_raw(&mut self, bytes: &Bytes) {
        self.buffer.extend_from_slice(bytes);
    }

    #[inline]
    pub async fn flush(&mut self) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let result = self.writer.write_all(self.buffer.as_ref()).await;
        self.buffer.clear();
        result?;
        Ok(self.writer.flush().await?)
    }

    pub async fn shutdown(&mut self) -> Result<(), SendError> {
        Ok(self.writer.shutdown().await?)
    }
}
