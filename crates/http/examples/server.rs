use std::error::Error;
use std::sync::Arc;

use ferrule_headers::{ETag, format_date, now};
use ferrule_http::config::ChannelConfig;
use ferrule_http::connection::HttpConnection;
use ferrule_http::handler::Handler;
use ferrule_http::precondition::{Precondition, check_preconditions};
use ferrule_http::protocol::body::ReqBody;
use http::header::{CONTENT_TYPE, ETAG, LAST_MODIFIED};
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use tokio::net::TcpListener;
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

    let handler = Arc::new(Document { body: "Hello World!\r\n", etag: ETag::strong("hello-v1"), modified: now() });
    let config = triomphe::Arc::new(ChannelConfig::builder().log_transactions(true).build());

    loop {
        let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let handler = handler.clone();
        let config = config.clone();

        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            let connection = HttpConnection::with_config(reader, writer, config);
            if let Err(e) = connection.process(handler).await {
                warn!(cause = %e, "connection closed with error");
            }
        });
    }
}

/// A single in-memory document, served with validators so clients can revalidate
struct Document {
    body: &'static str,
    etag: ETag,
    modified: u64,
}

impl Handler for Document {
    type RespBody = String;
    type Error = Box<dyn Error + Send + Sync>;

    async fn call(&self, request: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        if *request.method() != Method::GET && *request.method() != Method::HEAD {
            let response = Response::builder().status(StatusCode::METHOD_NOT_ALLOWED).body(String::new())?;
            return Ok(response);
        }

        let (parts, body) = request.into_parts();
        let request = Request::from_parts(parts, ());
        // nobody sends a GET body worth reading
        drop(body.collect().await?);

        let response = Response::builder()
            .header(CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())
            .header(ETAG, self.etag.to_string())
            .header(LAST_MODIFIED, format_date(self.modified))
            .body(self.body.to_string())?;

        match check_preconditions(&request, &response, true) {
            Precondition::Proceed => Ok(response),
            Precondition::ShortCircuit(replacement) => Ok(replacement.map(|()| String::new())),
        }
    }
}
