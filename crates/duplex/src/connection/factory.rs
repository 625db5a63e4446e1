//! Assembles connections for a role over tokio I/O halves.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::error;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::role::{Client, Role, Server};
use crate::transport::IoTransport;

/// A [`Connection`] running on an [`IoTransport`].
pub type IoConnection<R, W> = Connection<R, IoTransport<R, W>>;

/// Builds the stages for role `R`, creates the connection and spawns its transport driver on
/// the configured runtime.
///
/// ```no_run
/// use micro_duplex::{ConnectionConfig, connection};
/// use tokio::net::TcpStream;
///
/// # async fn run() -> std::io::Result<()> {
/// let (reader, writer) = TcpStream::connect("127.0.0.1:8080").await?.into_split();
/// let config = ConnectionConfig::new(tokio::runtime::Handle::current());
/// let connection = connection::client(reader, writer, &config);
/// # drop(connection);
/// # Ok(())
/// # }
/// ```
pub fn connect<R, Rd, W>(reader: Rd, writer: W, config: &ConnectionConfig) -> IoConnection<R, W>
where
    R: Role,
    Rd: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (transport, driver) = IoTransport::<R, W>::new(reader, writer, config);
    let (connection, handler) = Connection::new(transport, config);

    config.handle().spawn(async move {
        if let Err(violation) = driver.run(handler).await {
            error!(role = R::name(), cause = %violation, "connection torn down");
        }
    });

    connection
}

/// A connection that writes requests and reads responses.
pub fn client<Rd, W>(reader: Rd, writer: W, config: &ConnectionConfig) -> IoConnection<Client, W>
where
    Rd: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    connect::<Client, _, _>(reader, writer, config)
}

/// A connection that reads requests and writes responses.
pub fn server<Rd, W>(reader: Rd, writer: W, config: &ConnectionConfig) -> IoConnection<Server, W>
where
    Rd: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    connect::<Server, _, _>(reader, writer, config)
}
