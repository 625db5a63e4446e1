//! The inbound stage chain: framing, then optional decompression, then optional logging.

use std::marker::PhantomData;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::{Decompressor, MessageDecoder};
use crate::protocol::{Message, MessageHead, ParseError, PayloadItem};
use crate::transport::io::TransportState;
use crate::transport::{DECOMPRESSOR, HTTP_CODEC, LOGGER, Stages, TransportEvent};

#[derive(Debug)]
pub(crate) struct Pipeline<D, H> {
    /// `None` once `http-codec` is removed, bytes then pass through as raw events
    decoder: Option<D>,
    decompressor: Option<Decompressor>,
    logger: bool,
    state: Arc<TransportState>,
    _head: PhantomData<fn() -> H>,
}

impl<D, H> Pipeline<D, H>
where
    D: MessageDecoder<H>,
    H: MessageHead,
{
    pub fn new(decoder: D, decompressor: Option<Decompressor>, logger: bool, state: Arc<TransportState>) -> Self {
        Self { decoder: Some(decoder), decompressor, logger, state, _head: PhantomData }
    }

    /// Produces the next event buffered in `src`, `None` when more bytes are needed.
    pub fn next_event(&mut self, src: &mut BytesMut) -> Result<Option<TransportEvent<H>>, ParseError> {
        self.next(src, false)
    }

    /// Like [`next_event`](Self::next_event), after the peer closed its write side.
    pub fn next_event_eof(&mut self, src: &mut BytesMut) -> Result<Option<TransportEvent<H>>, ParseError> {
        self.next(src, true)
    }

    fn next(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<TransportEvent<H>>, ParseError> {
        loop {
            let event = match &mut self.decoder {
                Some(decoder) => match decode_framed(decoder, src, eof)? {
                    Some(event @ TransportEvent::LastContent(_)) if decoder.is_switched() => {
                        // bytes after the switch wait until the upgrade removes this stage
                        self.state.set_auto_read(false);
                        event
                    }
                    Some(event) => event,
                    None => return Ok(None),
                },
                None if src.is_empty() => return Ok(None),
                None => TransportEvent::Raw(src.split().freeze()),
            };

            // inflating may consume a fragment without producing output yet
            if let Some(event) = self.decompress(event)? {
                self.log(&event);
                return Ok(Some(event));
            }
        }
    }

    fn decompress(&mut self, event: TransportEvent<H>) -> Result<Option<TransportEvent<H>>, ParseError> {
        let Some(decompressor) = &mut self.decompressor else {
            return Ok(Some(event));
        };

        let event = match event {
            TransportEvent::Head(mut head, mut payload_size) => {
                decompressor.on_head(&mut head, &mut payload_size);
                TransportEvent::Head(head, payload_size)
            }
            TransportEvent::Content(bytes) => {
                let inflated = decompressor.inflate(bytes)?;
                if inflated.is_empty() {
                    return Ok(None);
                }
                TransportEvent::Content(inflated)
            }
            TransportEvent::LastContent(bytes) => TransportEvent::LastContent(decompressor.finish(bytes)?),
            event => event,
        };
        Ok(Some(event))
    }

    pub fn log(&self, event: &TransportEvent<H>) {
        if !self.logger {
            return;
        }

        match event {
            TransportEvent::Head(head, payload_size) => {
                debug!(kind = event.name(), version = ?head.version(), ?payload_size, headers = head.headers().len(), "inbound");
            }
            TransportEvent::Content(bytes) | TransportEvent::LastContent(bytes) | TransportEvent::Raw(bytes) => {
                debug!(kind = event.name(), len = bytes.len(), "inbound");
            }
            TransportEvent::ReadComplete | TransportEvent::Closed => debug!(kind = event.name(), "inbound"),
        }
    }
}

/// Decodes one message and folds the final chunk of a payload with its end marker.
fn decode_framed<D, H>(decoder: &mut D, src: &mut BytesMut, eof: bool) -> Result<Option<TransportEvent<H>>, ParseError>
where
    D: MessageDecoder<H>,
{
    let message = if eof { decoder.decode_eof(src)? } else { decoder.decode(src)? };
    let Some(message) = message else {
        return Ok(None);
    };

    let event = match message {
        Message::Header((head, payload_size)) => TransportEvent::Head(head, payload_size),
        Message::Payload(PayloadItem::Chunk(bytes)) if decoder.payload_complete() => {
            // the end marker is already pending and consumes no input
            decoder.decode(src)?;
            TransportEvent::LastContent(bytes)
        }
        Message::Payload(PayloadItem::Chunk(bytes)) => TransportEvent::Content(bytes),
        Message::Payload(PayloadItem::Eof) => TransportEvent::LastContent(Bytes::new()),
    };
    trace!(kind = event.name(), "decoded event");
    Ok(Some(event))
}

impl<D, H> Stages for Pipeline<D, H> {
    fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(3);
        if self.logger {
            names.push(LOGGER);
        }
        if self.decoder.is_some() {
            names.push(HTTP_CODEC);
        }
        if self.decompressor.is_some() {
            names.push(DECOMPRESSOR);
        }
        names
    }

    fn remove(&mut self, name: &str) -> bool {
        match name {
            LOGGER => {
                self.state.set_log_frames(false);
                std::mem::take(&mut self.logger)
            }
            HTTP_CODEC => {
                self.state.set_framed(false);
                self.decoder.take().is_some()
            }
            DECOMPRESSOR => self.decompressor.take().is_some(),
            _ => false,
        }
    }
}
