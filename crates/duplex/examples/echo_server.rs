use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{Method, Response, StatusCode};
use http_body_util::Full;
use micro_duplex::connection::{IoConnection, server};
use micro_duplex::protocol::{RequestHeader, ResponseHeader};
use micro_duplex::role::Server;
use micro_duplex::ConnectionConfig;
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };
    let config = ConnectionConfig::new(tokio::runtime::Handle::current());

    loop {
        let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let (reader, writer) = tcp_stream.into_split();
        let connection = server(reader, writer, &config);
        tokio::spawn(async move {
            serve(&connection).await;
            info!(%remote_addr, "connection finished");
        });
    }
}

async fn serve(connection: &IoConnection<Server, OwnedWriteHalf>) {
    while let Ok((request, body)) = connection.read().await {
        info!(method = %request.method(), path = request.uri().path(), "receiving request");

        let result = if echoes(&request) {
            let mut response = Response::builder().status(StatusCode::OK).header(TRANSFER_ENCODING, "chunked");
            if let Some(content_type) = request.headers().get(CONTENT_TYPE) {
                response = response.header(CONTENT_TYPE, content_type);
            }
            let response = ResponseHeader::from(response.body(()).unwrap());
            connection.write(response, body.stream()).await
        } else {
            drop(body);
            let message = Bytes::from_static(b"POST or PUT a body to /echo\n");
            let response = Response::builder()
                .status(StatusCode::NOT_FOUND)
                .header(CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())
                .header(CONTENT_LENGTH, message.len())
                .body(())
                .unwrap();
            connection.write(ResponseHeader::from(response), Full::new(message)).await
        };

        if let Err(e) = result {
            warn!(cause = %e, "can't write response");
            break;
        }
    }
}

fn echoes(request: &RequestHeader) -> bool {
    request.uri().path() == "/echo" && matches!(*request.method(), Method::POST | Method::PUT)
}
