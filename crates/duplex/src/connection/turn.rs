use crate::protocol::ConnectionError;
use crate::sync::TurnPermit;
use crate::transport::Transport;

/// The turn permit of one connection, applied in the direction of its role.
///
/// The side that writes first acquires before writing and releases once a read is finished;
/// the other side releases when it starts writing and acquires once a read is finished.
#[derive(Debug)]
pub(crate) struct Turn {
    permit: TurnPermit,
    write_first: bool,
}

impl Turn {
    pub fn new(write_first: bool) -> Self {
        Self { permit: TurnPermit::new(), write_first }
    }

    pub async fn begin_write<T: Transport>(&self, transport: &T) -> Result<(), ConnectionError> {
        if self.write_first {
            self.acquire(transport).await
        } else {
            self.permit.release();
            Ok(())
        }
    }

    pub async fn end_read<T: Transport>(&self, transport: &T) -> Result<(), ConnectionError> {
        if self.write_first {
            self.permit.release();
            Ok(())
        } else {
            self.acquire(transport).await
        }
    }

    /// Takes the turn for good, regardless of role.
    pub async fn claim<T: Transport>(&self, transport: &T) -> Result<(), ConnectionError> {
        self.acquire(transport).await
    }

    async fn acquire<T: Transport>(&self, transport: &T) -> Result<(), ConnectionError> {
        if self.permit.try_acquire() {
            return Ok(());
        }

        tokio::select! {
            biased;
            () = transport.closed() => Err(ConnectionError::ConnectionClosed),
            () = self.permit.acquire() => Ok(()),
        }
    }
}
