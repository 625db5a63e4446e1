use std::hint::black_box;

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use http::header::CONTENT_LENGTH;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{Empty, Full};
use micro_duplex::codec::{RequestDecoder, ResponseEncoder};
use micro_duplex::protocol::{Message, PayloadSize, RequestHeader, ResponseHeader};
use micro_duplex::{ConnectionConfig, connection};
use tokio::runtime::Runtime;
use tokio_util::codec::{Decoder, Encoder};

fn bench_request_decoder(c: &mut Criterion) {
    let request = b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 12\r\n\r\nhello duplex";

    c.bench_function("decode_request_with_body", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            while let Some(message) = decoder.decode(&mut bytes).unwrap() {
                black_box(message);
            }
        });
    });
}

fn bench_response_encoder(c: &mut Criterion) {
    let response = Response::builder().status(StatusCode::OK).header(CONTENT_LENGTH, 12).body(()).unwrap();

    c.bench_function("encode_response_head", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            let message = Message::<_, Bytes>::Header((ResponseHeader::from(response.clone()), PayloadSize::Length(12)));
            encoder.encode(message, &mut bytes).unwrap();
            black_box(bytes);
        });
    });
}

fn bench_exchange(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();

    c.bench_function("client_server_exchange", |b| {
        b.to_async(&runtime).iter(|| async {
            let config = ConnectionConfig::new(tokio::runtime::Handle::current());
            let (client_io, server_io) = tokio::io::duplex(64 * 1024);
            let (client_reader, client_writer) = tokio::io::split(client_io);
            let (server_reader, server_writer) = tokio::io::split(server_io);
            let client = connection::client(client_reader, client_writer, &config);
            let server = connection::server(server_reader, server_writer, &config);

            let request = Request::builder().method(Method::GET).uri("http://localhost/").body(()).unwrap();
            client.write(RequestHeader::from(request), Empty::<Bytes>::new()).await.unwrap();

            let (_, body) = server.read().await.unwrap();
            drop(body);
            let response = Response::builder().header(CONTENT_LENGTH, 12).body(()).unwrap();
            server.write(ResponseHeader::from(response), Full::new(Bytes::from_static(b"Hello World!"))).await.unwrap();

            let (_, body) = client.read().await.unwrap();
            black_box(body.to_bytes().await.unwrap());
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_response_encoder, bench_exchange);
criterion_main!(benches);
