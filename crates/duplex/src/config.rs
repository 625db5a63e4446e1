//! Per-connection settings.

use tokio::runtime::Handle;

const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Settings applied when a connection is assembled.
///
/// There is no `Default`: the runtime every connection task is spawned on must be chosen
/// explicitly.
///
/// ```no_run
/// use micro_duplex::ConnectionConfig;
///
/// # async fn config() {
/// let config = ConnectionConfig::new(tokio::runtime::Handle::current())
///     .with_read_buffer_size(16 * 1024)
///     .with_log_frames(true);
/// assert!(config.decompress());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    handle: Handle,
    read_buffer_size: usize,
    write_buffer_size: usize,
    decompress: bool,
    log_frames: bool,
}

impl ConnectionConfig {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            write_buffer_size: DEFAULT_BUFFER_SIZE,
            decompress: true,
            log_frames: false,
        }
    }

    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Inflate `gzip`/`deflate` response bodies, honoured by the client role only.
    #[must_use]
    pub fn with_decompress(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }

    /// Trace every inbound event and outbound frame at `debug`.
    #[must_use]
    pub fn with_log_frames(mut self, log_frames: bool) -> Self {
        self.log_frames = log_frames;
        self
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    pub fn decompress(&self) -> bool {
        self.decompress
    }

    pub fn log_frames(&self) -> bool {
        self.log_frames
    }
}
