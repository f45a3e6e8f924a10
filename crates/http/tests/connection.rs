use std::convert::Infallible;
use std::error::Error;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use ferrule_http::config::ChannelConfig;
use ferrule_http::connection::HttpConnection;
use ferrule_http::handler::{Handler, make_handler};
use ferrule_http::precondition::{Precondition, check_preconditions};
use ferrule_http::protocol::ParseError;
use ferrule_http::protocol::body::ReqBody;
use http::{Request, Response};
use http_body_util::BodyExt;
use indoc::indoc;
use proptest::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, duplex};
use tokio::sync::Notify;

type BoxError = Box<dyn Error + Send + Sync>;

const CONTINUE: &str = "HTTP/1.1 100 Continue\r\n\r\n";

fn config() -> ChannelConfig {
    ChannelConfig::builder().linger_timeout(Duration::ZERO).build()
}

async fn echo(request: Request<ReqBody>) -> Result<Response<String>, BoxError> {
    let path = request.uri().path().to_string();
    let body = request.into_body().collect().await?.to_bytes();
    Ok(Response::new(format!("{path}:{}", String::from_utf8_lossy(&body))))
}

/// Writes `input` up front, then reads everything the server sends until it closes
async fn exchange<H>(config: ChannelConfig, handler: H, input: &str) -> String
where
    H: Handler + Sync + 'static,
    H::RespBody: http_body::Body<Data = bytes::Bytes> + Send + Unpin,
    <H::RespBody as http_body::Body>::Error: std::fmt::Display + Send,
{
    let (client, server) = duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(server);
    let connection = HttpConnection::with_config(reader, writer, triomphe::Arc::new(config));
    let server = tokio::spawn(async move {
        let _ = connection.process(Arc::new(handler)).await;
    });

    let (mut client_reader, mut client_writer) = tokio::io::split(client);
    client_writer.write_all(input.as_bytes()).await.unwrap();

    let mut output = String::new();
    client_reader.read_to_string(&mut output).await.unwrap();
    server.await.unwrap();
    output
}

/// A write half that records what was written and when it was shut down
#[derive(Clone, Default)]
struct RecordingWriter {
    state: Arc<Mutex<Recorded>>,
}

#[derive(Default)]
struct Recorded {
    written: Vec<u8>,
    shutdowns: usize,
    written_at_shutdown: usize,
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.state.lock().unwrap().written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.state.lock().unwrap();
        state.shutdowns += 1;
        state.written_at_shutdown = state.written.len();
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_http10_closes_once_after_response() {
    let writer = RecordingWriter::default();
    let request: &[u8] = b"GET /index HTTP/1.0\r\nHost: example.com\r\n\r\n";
    let connection = HttpConnection::with_config(request, writer.clone(), triomphe::Arc::new(config()));

    connection.process(Arc::new(make_handler(echo))).await.unwrap();

    let state = writer.state.lock().unwrap();
    assert_eq!(state.shutdowns, 1);
    assert_eq!(state.written_at_shutdown, state.written.len());
    assert_eq!(
        String::from_utf8_lossy(&state.written),
        "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 7\r\n\r\n/index:"
    );
}

/// Holds back `/a` until `/b` has been answered by the handler
struct SlowFirst {
    release: Notify,
    finished: Mutex<Vec<String>>,
}

impl Handler for SlowFirst {
    type RespBody = String;
    type Error = Infallible;

    async fn call(&self, request: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        let path = request.uri().path().to_string();
        if path == "/a" {
            self.release.notified().await;
        } else {
            self.release.notify_one();
        }
        self.finished.lock().unwrap().push(path.clone());
        Ok(Response::new(format!("response {path}")))
    }
}

#[tokio::test]
async fn test_pipelined_responses_keep_request_order() {
    let handler = Arc::new(SlowFirst { release: Notify::new(), finished: Mutex::new(Vec::new()) });

    let (client, server) = duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(server);
    let connection = HttpConnection::with_config(reader, writer, triomphe::Arc::new(config()));
    let server = tokio::spawn(connection.process(Arc::clone(&handler)));

    let (mut client_reader, mut client_writer) = tokio::io::split(client);
    client_writer.write_all(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
    let mut output = String::new();
    client_reader.read_to_string(&mut output).await.unwrap();
    server.await.unwrap().unwrap();

    assert_eq!(*handler.finished.lock().unwrap(), vec!["/b", "/a"]);
    assert_eq!(
        output,
        indoc! {"
            HTTP/1.1 200 OK\r
            Content-Length: 11\r
            \r
            response /aHTTP/1.1 200 OK\r
            Connection: close\r
            Content-Length: 11\r
            \r
            response /b"
        }
    );
}

#[tokio::test]
async fn test_if_none_match_gets_not_modified() {
    async fn tagged(request: Request<ReqBody>) -> Result<Response<String>, BoxError> {
        let response = Response::builder().header("ETag", "\"foo\"").body("the entity".to_string())?;
        match check_preconditions(&request, &response, true) {
            Precondition::Proceed => Ok(response),
            Precondition::ShortCircuit(replacement) => Ok(replacement.map(|()| String::new())),
        }
    }

    let input = "GET /doc HTTP/1.1\r\nIf-None-Match: \"foo\"\r\nConnection: close\r\n\r\n";
    let output = exchange(config(), make_handler(tagged), input).await;
    assert_eq!(output, "HTTP/1.1 304 Not Modified\r\nETag: \"foo\"\r\nConnection: close\r\n\r\n");
}

#[tokio::test]
async fn test_chunked_request_body() {
    let input = indoc! {"
        POST /upload HTTP/1.1\r
        Transfer-Encoding: chunked\r
        Connection: close\r
        \r
        5\r
        Hello\r
        0\r
        \r
    "};
    let output = exchange(config(), make_handler(echo), input).await;
    assert!(output.ends_with("\r\n\r\n/upload:Hello"), "{output}");
}

#[tokio::test]
async fn test_expect_continue_before_body() {
    let (client, server) = duplex(4096);
    let (reader, writer) = tokio::io::split(server);
    let connection = HttpConnection::with_config(reader, writer, triomphe::Arc::new(config()));
    let server = tokio::spawn(connection.process(Arc::new(make_handler(echo))));

    let (mut client_reader, mut client_writer) = tokio::io::split(client);
    client_writer
        .write_all(b"PUT /file HTTP/1.1\r\nContent-Length: 4\r\nExpect: 100-continue\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut interim = vec![0; CONTINUE.len()];
    client_reader.read_exact(&mut interim).await.unwrap();
    assert_eq!(interim, CONTINUE.as_bytes());

    client_writer.write_all(b"data").await.unwrap();
    let mut output = String::new();
    client_reader.read_to_string(&mut output).await.unwrap();
    server.await.unwrap().unwrap();

    assert_eq!(output, "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 10\r\n\r\n/file:data");
}

#[tokio::test]
async fn test_expect_continue_ignored_for_http10() {
    let input = "PUT /file HTTP/1.0\r\nContent-Length: 2\r\nExpect: 100-continue\r\n\r\nok";
    let output = exchange(config(), make_handler(echo), input).await;
    assert!(!output.contains("100 Continue"));
    assert!(output.ends_with("/file:ok"));
}

#[tokio::test]
async fn test_too_many_headers_rejected_before_dispatch() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    async fn counting(request: Request<ReqBody>) -> Result<Response<String>, BoxError> {
        CALLS.fetch_add(1, Ordering::SeqCst);
        echo(request).await
    }

    let mut input = String::from("GET / HTTP/1.1\r\n");
    for i in 0..5001 {
        input.push_str(&format!("X-Header-{i}: value\r\n"));
    }
    input.push_str("\r\n");

    let config = ChannelConfig::builder()
        .max_headers(5000)
        .max_header_bytes(1 << 20)
        .linger_timeout(Duration::from_millis(100))
        .build();

    let (client, server) = duplex(16 * 1024);
    let (reader, writer) = tokio::io::split(server);
    let connection = HttpConnection::with_config(reader, writer, triomphe::Arc::new(config));
    let server = tokio::spawn(connection.process(Arc::new(make_handler(counting))));

    let (mut client_reader, mut client_writer) = tokio::io::split(client);
    // the server may stop reading before everything is written
    let sending = tokio::spawn(async move {
        let _ = client_writer.write_all(input.as_bytes()).await;
    });

    let mut output = String::new();
    client_reader.read_to_string(&mut output).await.unwrap();
    assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{output}");
    assert!(output.contains("Connection: close\r\n"));
    assert!(server.await.unwrap().is_err());
    sending.abort();
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_chunk_size_is_bad_request() {
    async fn ignore_body(_request: Request<ReqBody>) -> Result<Response<String>, BoxError> {
        Ok(Response::new("ignored".to_string()))
    }

    let input = "POST /a HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nGET /b HTTP/1.1\r\n\r\n";
    let outputs = [
        exchange(config(), make_handler(echo), input).await,
        exchange(config(), make_handler(ignore_body), input).await,
    ];
    for output in outputs {
        assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{output}");
        assert!(output.contains("Connection: close\r\n"), "{output}");
        assert!(!output.contains("ignored") && !output.contains("/b"), "{output}");
    }
}

#[tokio::test]
async fn test_malformed_chunk_fails_process() {
    let input: &[u8] = b"POST /a HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabcXY";
    let writer = RecordingWriter::default();
    let connection = HttpConnection::with_config(input, writer.clone(), triomphe::Arc::new(config()));

    assert!(connection.process(Arc::new(make_handler(echo))).await.is_err());
    let state = writer.state.lock().unwrap();
    let written = String::from_utf8_lossy(&state.written);
    assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{written}");
    assert_eq!(state.shutdowns, 1);
}

#[tokio::test]
async fn test_truncated_body_reports_connection_lost() {
    static LOST: AtomicUsize = AtomicUsize::new(0);

    async fn collect(request: Request<ReqBody>) -> Result<Response<String>, BoxError> {
        match request.into_body().collect().await {
            Ok(body) => Ok(Response::new(format!("{} bytes", body.to_bytes().len()))),
            Err(e) => {
                if matches!(e, ParseError::ConnectionLost) {
                    LOST.fetch_add(1, Ordering::SeqCst);
                }
                Err(e.into())
            }
        }
    }

    let (client, server) = duplex(4096);
    let (reader, writer) = tokio::io::split(server);
    let connection = HttpConnection::with_config(reader, writer, triomphe::Arc::new(config()));
    let server = tokio::spawn(connection.process(Arc::new(make_handler(collect))));

    let (mut client_reader, mut client_writer) = tokio::io::split(client);
    client_writer.write_all(b"POST /a HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").await.unwrap();
    client_writer.shutdown().await.unwrap();

    let mut output = String::new();
    client_reader.read_to_string(&mut output).await.unwrap();
    assert!(server.await.unwrap().is_err());
    assert_eq!(LOST.load(Ordering::SeqCst), 1);
    assert!(!output.contains("bytes"), "{output}");
}

#[tokio::test]
async fn test_unsupported_transfer_coding() {
    let input = "POST / HTTP/1.1\r\nTransfer-Encoding: gzip, chunked\r\n\r\n";
    let output = exchange(config(), make_handler(echo), input).await;
    assert!(output.starts_with("HTTP/1.1 501 Not Implemented\r\n"), "{output}");
}

#[tokio::test]
async fn test_request_line_too_long() {
    let config = ChannelConfig::builder().max_header_line(64).linger_timeout(Duration::ZERO).build();
    let input = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(100));
    let output = exchange(config, make_handler(echo), &input).await;
    assert!(output.starts_with("HTTP/1.1 414 URI Too Long\r\n"), "{output}");
}

#[tokio::test]
async fn test_chunked_response_for_unknown_length() {
    async fn streaming(_request: Request<ReqBody>) -> Result<Response<http_body_util::StreamBody<StreamOf>>, BoxError> {
        let chunks = vec![Ok(http_body::Frame::data(bytes::Bytes::from_static(b"abc"))), Ok(http_body::Frame::data(bytes::Bytes::new()))];
        Ok(Response::new(http_body_util::StreamBody::new(futures::stream::iter(chunks))))
    }

    let output = exchange(config(), make_handler(streaming), "GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert_eq!(output, "HTTP/1.1 200 OK\r\nConnection: close\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n");

    let output = exchange(config(), make_handler(streaming), "GET / HTTP/1.0\r\n\r\n").await;
    assert_eq!(output, "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nabc");
}

type StreamOf = futures::stream::Iter<std::vec::IntoIter<Result<http_body::Frame<bytes::Bytes>, Infallible>>>;

#[tokio::test(start_paused = true)]
async fn test_idle_connection_times_out() {
    let config = ChannelConfig::builder()
        .between_requests_timeout(Duration::from_secs(5))
        .linger_timeout(Duration::ZERO)
        .build();

    let (client, server) = duplex(4096);
    let (reader, writer) = tokio::io::split(server);
    let connection = HttpConnection::with_config(reader, writer, triomphe::Arc::new(config));
    let server = tokio::spawn(connection.process(Arc::new(make_handler(echo))));

    let (mut client_reader, mut client_writer) = tokio::io::split(client);
    client_writer.write_all(b"GET /a HTTP/1.1\r\n\r\n").await.unwrap();

    // the connection stays open after the response, then closes once idle too long
    let mut output = String::new();
    client_reader.read_to_string(&mut output).await.unwrap();
    assert_eq!(output, "HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\n/a:");
    server.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stray_line_break_after_body_keeps_idle_timeout() {
    let config = ChannelConfig::builder()
        .between_requests_timeout(Duration::from_secs(5))
        .input_timeout(Duration::from_secs(240))
        .linger_timeout(Duration::ZERO)
        .build();

    let (client, server) = duplex(4096);
    let (reader, writer) = tokio::io::split(server);
    let connection = HttpConnection::with_config(reader, writer, triomphe::Arc::new(config));
    let started = tokio::time::Instant::now();
    let server = tokio::spawn(connection.process(Arc::new(make_handler(echo))));

    let (mut client_reader, mut client_writer) = tokio::io::split(client);
    client_writer.write_all(b"POST /a HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi\r\n").await.unwrap();

    let mut output = String::new();
    client_reader.read_to_string(&mut output).await.unwrap();
    assert_eq!(output, "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n/a:hi");
    server.await.unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_secs(60), "{:?}", started.elapsed());
}

/// Answers `/{index}/{delay}` after `delay` milliseconds
async fn delayed(request: Request<ReqBody>) -> Result<Response<String>, BoxError> {
    let path = request.uri().path().to_string();
    let delay = path.rsplit('/').next().and_then(|delay| delay.parse().ok()).unwrap_or(0);
    tokio::time::sleep(Duration::from_millis(delay)).await;
    Ok(Response::new(path))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_pipelining_order(delays in prop::collection::vec(0u64..8, 1..10), max_pipeline in 1usize..6) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

        let mut input = String::new();
        for (index, delay) in delays.iter().enumerate() {
            input.push_str(&format!("GET /{index}/{delay} HTTP/1.1\r\n\r\n"));
        }
        input.push_str("GET /last/0 HTTP/1.1\r\nConnection: close\r\n\r\n");

        let config = ChannelConfig::builder().max_pipeline(max_pipeline).linger_timeout(Duration::ZERO).build();
        let output = runtime.block_on(exchange(config, make_handler(delayed), &input));

        let bodies = output
            .split("HTTP/1.1 200 OK\r\n")
            .skip(1)
            .map(|response| response.rsplit("\r\n\r\n").next().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        let mut expected = delays.iter().enumerate().map(|(index, delay)| format!("/{index}/{delay}")).collect::<Vec<_>>();
        expected.push("/last/0".to_string());
        prop_assert_eq!(bodies, expected);
    }
}
