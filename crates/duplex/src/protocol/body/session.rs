use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tracing::{debug, trace};
pub(crate) use triomphe::Arc as SessionRef;

use crate::connection::Shared;
use crate::protocol::ConnectionError;
use crate::sync::{Slot, TurnPermit};
use crate::transport::Transport;

/// Per-read state of a body, created by `Connection::read` for a message with a body.
pub(crate) struct Session<T: Transport> {
    shared: Arc<Shared<T>>,
    /// One-shot: taken by the first stream
    readers: TurnPermit,
    /// The end marker has been dequeued
    eos: AtomicBool,
    /// The read turn has been settled, nothing is left to do on drop
    finalized: AtomicBool,
}

/// Exclusive right to read a session, held by its stream.
pub(crate) struct Lease<T: Transport> {
    session: SessionRef<Session<T>>,
}

impl<T: Transport> Session<T> {
    pub fn new(shared: Arc<Shared<T>>) -> SessionRef<Self> {
        SessionRef::new(Self { shared, readers: TurnPermit::new(), eos: AtomicBool::new(false), finalized: AtomicBool::new(false) })
    }

    pub fn claim(session: &SessionRef<Self>) -> Option<Lease<T>> {
        session.readers.try_acquire().then(|| Lease { session: SessionRef::clone(session) })
    }

    /// Hands the rest of the body to a background drain, unless it was already settled.
    fn abandon(session: SessionRef<Self>) {
        if session.finalized.swap(true, Ordering::AcqRel) {
            return;
        }

        let shared = Arc::clone(&session.shared);
        let task = shared.handle.spawn(drain(session));
        shared.set_pending(task);
    }
}

impl<T: Transport> Lease<T> {
    pub async fn next_chunk(&self) -> Result<Option<Bytes>, ConnectionError> {
        let session = &self.session;
        if session.eos.load(Ordering::Acquire) {
            return Ok(None);
        }

        loop {
            match session.shared.next_content().await {
                Slot::Item(bytes) if bytes.is_empty() => {}
                Slot::Item(bytes) => return Ok(Some(bytes)),
                Slot::End => {
                    session.eos.store(true, Ordering::Release);
                    let shared = &session.shared;
                    if let Err(e) = shared.turn.end_read(&shared.transport).await {
                        trace!(cause = %e, "turn not taken back after body");
                    }
                    session.finalized.store(true, Ordering::Release);
                    return Ok(None);
                }
                Slot::Closed => {
                    session.finalized.store(true, Ordering::Release);
                    return Err(ConnectionError::ConnectionClosed);
                }
            }
        }
    }
}

impl<T: Transport> Drop for Lease<T> {
    fn drop(&mut self) {
        Session::abandon(SessionRef::clone(&self.session));
    }
}

/// Discards what is left of an abandoned body, then ends the read turn.
async fn drain<T: Transport>(session: SessionRef<Session<T>>) {
    let shared = &session.shared;

    if !session.eos.load(Ordering::Acquire) {
        let mut discarded = 0;
        loop {
            match shared.next_content().await {
                Slot::Item(bytes) => discarded += bytes.len(),
                Slot::End => break,
                Slot::Closed => {
                    debug!(discarded, "connection closed while draining body");
                    return;
                }
            }
        }
        debug!(discarded, "drained abandoned body");
    }

    if let Err(e) = shared.turn.end_read(&shared.transport).await {
        trace!(cause = %e, "turn not taken back after drain");
    }
}
