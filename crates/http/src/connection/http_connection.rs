use std::collections::VecDeque;
use std::error::Error;
use std::fmt::Display;
use std::future::poll_fn;
use std::task::Poll;
use std::time::Duration;

use bytes::Bytes;
use ferrule_headers::Expectation;
use futures::channel::mpsc;
use futures::future::{BoxFuture, Either};
use futures::{FutureExt, SinkExt, StreamExt};
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode, Uri, Version};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::watch;
use tokio::time::{Instant, timeout};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::config::ChannelConfig;
use crate::connection::state::{ChannelState, Persistence};
use crate::handler::Handler;
use crate::protocol::body::{ReqBody, ReqBodySender};
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};

type BoxError = Box<dyn Error + Send + Sync>;

type HandlerFuture<'h, B> = BoxFuture<'h, Result<Response<B>, BoxError>>;

type RequestMessage = Message<(RequestHeader, PayloadSize)>;

type ResponseMessage = Message<(ResponseHead, PayloadSize)>;

const READ_BUFFER_SIZE: usize = 8 * 1024;

const LINGER_BUFFER_SIZE: usize = 4 * 1024;

/// An HTTP/1.x server connection.
///
/// `HttpConnection` reads requests off `R` and writes their responses to `W`. The read
/// side and the write side make progress concurrently within the task that awaits
/// [`process`](HttpConnection::process):
///
/// - the read side decodes request heads, hands each request to the handler as soon as
///   its head is complete and streams its body to the handler. It stops reading while
///   `max_pipeline` requests are unanswered.
/// - the write side drives the handlers of every request in flight and writes their
///   responses strictly in request order, answering `Expect: 100-continue` when the
///   request gets to the front of the queue.
///
/// When the connection is done, the write half is shut down and incoming bytes are
/// drained for up to `linger_timeout`, so a client still sending does not see its
/// final response reset away.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    config: triomphe::Arc<ChannelConfig>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, triomphe::Arc::new(ChannelConfig::default()))
    }

    pub fn with_config(reader: R, writer: W, config: triomphe::Arc<ChannelConfig>) -> Self {
        let decoder = RequestDecoder::with_config(triomphe::Arc::clone(&config));
        Self {
            framed_read: FramedRead::with_capacity(reader, decoder, READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            config,
        }
    }

    /// Serves requests until the connection closes.
    ///
    /// Returns the first error that ended the connection; a peer closing between two
    /// requests, or an idle timeout, is a normal end.
    pub async fn process<H>(self, handler: std::sync::Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + Sync,
        H::RespBody: Body<Data = Bytes> + Send + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let HttpConnection { mut framed_read, mut framed_write, config } = self;
        let (dispatch, incoming) = mpsc::unbounded();
        let (written_sender, written_receiver) = watch::channel(0usize);

        let (read_result, write_result) = {
            let reader = read_loop(&mut framed_read, &*handler, dispatch, written_receiver, &config);
            let writer = write_loop(&mut framed_write, incoming, written_sender, &config);
            tokio::pin!(reader, writer);

            let first = select! {
                biased;
                result = &mut writer => Either::Left(result),
                result = &mut reader => Either::Right(result),
            };
            match first {
                // the write side decided to close, requests still being read are dropped
                Either::Left(write_result) => (Ok(()), write_result),
                Either::Right(read_result) => (read_result, writer.await),
            }
        };

        match &write_result {
            Ok(()) => close(framed_read, framed_write, config.linger_timeout()).await,
            Err(e) => error!(cause = %e, "can't write response, abort connection"),
        }

        write_result?;
        read_result?;
        Ok(())
    }
}

/// The request side facts a response needs
#[derive(Debug)]
struct RequestMeta {
    method: Method,
    uri: Uri,
    version: Version,
    persistence: Persistence,
    expect_continue: bool,
    started: Instant,
}

enum Reply<B> {
    Response(Response<B>),
    Failed(BoxError),
    /// refused before reaching the handler
    Rejected(StatusCode),
}

enum Outcome<'h, B> {
    Running(HandlerFuture<'h, B>),
    Done(Reply<B>),
}

/// One entry of the output queue
struct Transaction<'h, B> {
    request: Option<RequestMeta>,
    outcome: Outcome<'h, B>,
    continue_sent: bool,
    /// the connection ends after this reply whatever the request asked for
    close: bool,
}

impl<'h, B> Transaction<'h, B> {
    fn running(request: RequestMeta, response: HandlerFuture<'h, B>) -> Self {
        Self { request: Some(request), outcome: Outcome::Running(response), continue_sent: false, close: false }
    }

    fn rejected(request: Option<RequestMeta>, status: StatusCode) -> Self {
        Self { request, outcome: Outcome::Done(Reply::Rejected(status)), continue_sent: false, close: true }
    }

    fn needs_continue(&self) -> bool {
        matches!(self.outcome, Outcome::Running(_))
            && !self.continue_sent
            && self.request.as_ref().is_some_and(|request| request.expect_continue)
    }
}

/// What the read side tells the write side
enum Dispatch<'h, B> {
    Transaction(Transaction<'h, B>),
    /// the body of the last dispatched request turned out malformed
    BodyFailed(StatusCode),
}

/// A transaction taken off the queue with its reply
struct Finished<B> {
    request: Option<RequestMeta>,
    reply: Reply<B>,
    continue_sent: bool,
    close: bool,
}

async fn read_loop<'h, R, H>(
    framed_read: &mut FramedRead<R, RequestDecoder>,
    handler: &'h H,
    dispatch: mpsc::UnboundedSender<Dispatch<'h, H::RespBody>>,
    mut written: watch::Receiver<usize>,
    config: &ChannelConfig,
) -> Result<(), ParseError>
where
    R: AsyncRead + Unpin,
    H: Handler + Sync,
    H::RespBody: Send,
{
    let max_pipeline = config.max_pipeline();
    let mut dispatched = 0usize;
    let mut state = ChannelState::AwaitingRequestLine;

    loop {
        if dispatched - *written.borrow() >= max_pipeline {
            trace!(dispatched, max_pipeline, "pipeline is full, pause reading");
            if written.wait_for(|written| dispatched - written < max_pipeline).await.is_err() {
                return Ok(());
            }
            trace!("pipeline has room, resume reading");
        }

        trace!(?state, "waiting for next request");
        let (header, payload_size) = match next_message(framed_read, &mut state, config).await {
            Ok(Some(Message::Header(head))) => head,
            Ok(Some(Message::Payload(_))) => {
                error!("receive request body without request head");
                reject(&dispatch, None, StatusCode::BAD_REQUEST);
                return Err(ParseError::invalid_body("request body without request head"));
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                match e.status_code() {
                    Some(status) => {
                        warn!(cause = %e, %status, "can't parse request, reject it");
                        reject(&dispatch, None, status);
                    }
                    None => debug!(cause = %e, "can't read next request"),
                }
                return Err(e);
            }
        };

        let persistence = Persistence::of(&header, config.allow_persistent());
        let mut request = RequestMeta {
            method: header.method().clone(),
            uri: header.uri().clone(),
            version: header.version(),
            persistence,
            expect_continue: false,
            started: Instant::now(),
        };

        match header.expectations() {
            Some(expectations) if expectations.iter().all(Expectation::is_continue) => {
                request.expect_continue =
                    !expectations.is_empty() && request.version >= Version::HTTP_11 && !payload_size.is_empty();
            }
            expectations => {
                let expectation = expectations
                    .and_then(|expectations| expectations.iter().find(|e| !e.is_continue()))
                    .map_or_else(|| "unparsable".to_string(), |e| e.name.clone());
                warn!(%expectation, "unsupported expectation, reject request");
                reject(&dispatch, Some(request), StatusCode::EXPECTATION_FAILED);
                return Err(ParseError::unsupported_expectation(expectation));
            }
        }

        let (body, body_sender) = if payload_size.is_empty() {
            (ReqBody::empty(), None)
        } else {
            let (body, sender) = ReqBody::body_channel(payload_size);
            (body, Some(sender))
        };

        let response = handler.call(header.body(body)).map(|result| result.map_err(Into::into)).boxed();
        if dispatch.unbounded_send(Dispatch::Transaction(Transaction::running(request, response))).is_err() {
            debug!("response writer is gone, stop reading");
            return Ok(());
        }
        dispatched += 1;

        if let Some(body_sender) = body_sender {
            state = ChannelState::ReadingBody;
            trace!(?state, ?payload_size, "forwarding request body");
            forward_body(framed_read, body_sender, &dispatch, config).await?;
        }

        match persistence {
            Persistence::KeepAlive => {}
            Persistence::NoPipeline => {
                trace!("persistent HTTP/1.0 request, wait for its response before reading on");
                if written.wait_for(|written| *written == dispatched).await.is_err() {
                    return Ok(());
                }
            }
            Persistence::Close => {
                debug!("last request of the connection, stop reading");
                return Ok(());
            }
        }
        state = ChannelState::IdleBetweenRequests;
    }
}

/// Reads the next message off the connection.
///
/// An idle connection whose next request has started arriving moves on to
/// [`ChannelState::ReadingHeaders`] and gets the input timeout. Timing out while idle
/// ends the connection normally.
async fn next_message<R>(
    framed_read: &mut FramedRead<R, RequestDecoder>,
    state: &mut ChannelState,
    config: &ChannelConfig,
) -> Result<Option<RequestMessage>, ParseError>
where
    R: AsyncRead + Unpin,
{
    loop {
        match timeout(state.timeout(config), framed_read.next()).await {
            Ok(message) => return message.transpose(),
            Err(_) if *state == ChannelState::IdleBetweenRequests && only_line_breaks(framed_read.read_buffer()) => {
                debug!("connection idle for too long");
                return Ok(None);
            }
            Err(_) if *state == ChannelState::IdleBetweenRequests => {
                *state = ChannelState::ReadingHeaders;
                trace!(state = ?*state, "next request is arriving");
            }
            Err(_) => return Err(ParseError::TimedOut),
        }
    }
}

/// Empty lines between requests don't start the next one
fn only_line_breaks(buffer: &[u8]) -> bool {
    buffer.iter().all(|b| matches!(b, b'\r' | b'\n'))
}

/// Streams one request body to its handler. A handler that dropped its body gets the
/// rest of it discarded, the connection still has to read past it.
///
/// A malformed body replaces the pending response with an error status and closes
/// the connection once it is written.
async fn forward_body<R, B>(
    framed_read: &mut FramedRead<R, RequestDecoder>,
    mut sender: ReqBodySender,
    dispatch: &mpsc::UnboundedSender<Dispatch<'_, B>>,
    config: &ChannelConfig,
) -> Result<(), ParseError>
where
    R: AsyncRead + Unpin,
{
    let error = loop {
        match timeout(config.input_timeout(), framed_read.next()).await {
            Ok(Some(Ok(Message::Payload(item)))) => {
                let eof = item.is_eof();
                sender.send(item).await;
                if eof {
                    if sender.discarded() > 0 {
                        debug!(bytes = sender.discarded(), "handler dropped the request body, discarded the rest");
                    }
                    return Ok(());
                }
            }
            Ok(Some(Ok(Message::Header(_)))) => break ParseError::invalid_body("request head inside a request body"),
            Ok(Some(Err(e))) => break e,
            Ok(None) => break ParseError::ConnectionLost,
            Err(_) => break ParseError::TimedOut,
        }
    };

    match error.status_code() {
        Some(status) => {
            warn!(cause = %error, %status, "can't parse request body, reject request");
            if dispatch.unbounded_send(Dispatch::BodyFailed(status)).is_err() {
                debug!(%status, "response writer is gone, can't send rejection");
            }
        }
        None => debug!(cause = %error, "request body is incomplete"),
    }
    let body_error = match error {
        ParseError::TimedOut => ParseError::TimedOut,
        _ => ParseError::ConnectionLost,
    };
    sender.fail(body_error).await;
    Err(error)
}

fn reject<B>(dispatch: &mpsc::UnboundedSender<Dispatch<'_, B>>, request: Option<RequestMeta>, status: StatusCode) {
    if dispatch.unbounded_send(Dispatch::Transaction(Transaction::rejected(request, status))).is_err() {
        debug!(%status, "response writer is gone, can't send rejection");
    }
}

async fn write_loop<'h, W, B>(
    framed_write: &mut FramedWrite<W, ResponseEncoder>,
    mut incoming: mpsc::UnboundedReceiver<Dispatch<'h, B>>,
    written: watch::Sender<usize>,
    config: &ChannelConfig,
) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    let mut queue = VecDeque::new();
    let mut incoming_closed = false;

    loop {
        // a body failure must land before the reply of its request is taken
        while !incoming_closed {
            match incoming.next().now_or_never() {
                Some(Some(dispatch)) => accept(&mut queue, dispatch),
                Some(None) => incoming_closed = true,
                None => break,
            }
        }

        if let Some(front) = queue.front_mut()
            && front.needs_continue()
        {
            write_continue(framed_write).await?;
            front.continue_sent = true;
        }

        if let Some(finished) = pop_done(&mut queue) {
            let persist = write_reply(framed_write, finished, config).await?;
            written.send_modify(|written| *written += 1);
            if !persist {
                debug!("connection is not persistent, stop writing");
                return Ok(());
            }
            continue;
        }

        if incoming_closed && queue.is_empty() {
            return Ok(());
        }

        select! {
            dispatch = incoming.next(), if !incoming_closed => match dispatch {
                Some(dispatch) => accept(&mut queue, dispatch),
                None => incoming_closed = true,
            },
            () = progress(&mut queue) => {}
        }
    }
}

fn accept<'h, B>(queue: &mut VecDeque<Transaction<'h, B>>, dispatch: Dispatch<'h, B>) {
    match dispatch {
        Dispatch::Transaction(transaction) => queue.push_back(transaction),
        // the failed request is the last one read, unless its reply is already out
        Dispatch::BodyFailed(status) => match queue.back_mut() {
            Some(transaction) => {
                transaction.outcome = Outcome::Done(Reply::Rejected(status));
                transaction.close = true;
            }
            None => debug!(%status, "response already written, only close the connection"),
        },
    }
}

/// Polls every running handler, ready once at least one of them has its reply
fn progress<'h, B>(queue: &mut VecDeque<Transaction<'h, B>>) -> impl Future<Output = ()> {
    poll_fn(move |cx| {
        let mut progressed = false;
        for transaction in queue.iter_mut() {
            if let Outcome::Running(response) = &mut transaction.outcome
                && let Poll::Ready(result) = response.poll_unpin(cx)
            {
                transaction.outcome = Outcome::Done(match result {
                    Ok(response) => Reply::Response(response),
                    Err(e) => Reply::Failed(e),
                });
                progressed = true;
            }
        }
        if progressed { Poll::Ready(()) } else { Poll::Pending }
    })
}

/// Takes the front of the queue once its reply is known
fn pop_done<B>(queue: &mut VecDeque<Transaction<'_, B>>) -> Option<Finished<B>> {
    if !matches!(queue.front()?.outcome, Outcome::Done(_)) {
        return None;
    }
    let Transaction { request, outcome, continue_sent, close } = queue.pop_front()?;
    match outcome {
        Outcome::Done(reply) => Some(Finished { request, reply, continue_sent, close }),
        Outcome::Running(_) => None,
    }
}

async fn write_continue<W>(framed_write: &mut FramedWrite<W, ResponseEncoder>) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
{
    let mut head = ResponseHead::new(());
    *head.status_mut() = StatusCode::CONTINUE;
    framed_write.send(ResponseMessage::Header((head, PayloadSize::Empty))).await?;
    trace!("sent 100 continue");
    Ok(())
}

/// Writes the reply of one transaction, returning whether the connection stays open
async fn write_reply<W, B>(
    framed_write: &mut FramedWrite<W, ResponseEncoder>,
    finished: Finished<B>,
    config: &ChannelConfig,
) -> Result<bool, SendError>
where
    W: AsyncWrite + Unpin,
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    let Finished { request, reply, continue_sent, close } = finished;
    let request = request.as_ref();
    // a client still waiting for 100 continue won't send the body we'd have to read past
    let expecting = request.is_some_and(|request| request.expect_continue) && !continue_sent;
    let persist = !close && request.is_some_and(|request| request.persistence.is_persistent()) && !expecting;

    let (status, persist) = match reply {
        Reply::Response(response) => (response.status(), write_response(framed_write, request, response, persist).await?),
        Reply::Failed(e) => {
            error!(cause = %e, "handler failed to produce a response");
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            (status, write_response(framed_write, request, status_response(status), persist).await?)
        }
        Reply::Rejected(status) => (status, write_response(framed_write, request, status_response(status), false).await?),
    };

    if config.log_transactions()
        && let Some(request) = request
    {
        info!(
            method = %request.method,
            uri = %request.uri,
            version = ?request.version,
            status = status.as_u16(),
            elapsed = ?request.started.elapsed(),
            "request served"
        );
    }
    Ok(persist)
}

async fn write_response<W, T>(
    framed_write: &mut FramedWrite<W, ResponseEncoder>,
    request: Option<&RequestMeta>,
    response: Response<T>,
    mut persist: bool,
) -> Result<bool, SendError>
where
    W: AsyncWrite + Unpin,
    T: Body<Data = Bytes> + Unpin,
    T::Error: Display,
{
    let (mut parts, mut body) = response.into_parts();
    let version = request.map_or(Version::HTTP_11, |request| request.version);
    let is_head = request.is_some_and(|request| request.method == Method::HEAD);
    let status = parts.status;

    if has_close_token(&parts.headers) {
        persist = false;
    }

    let bodiless_status = status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED;
    let exact_size = body.size_hint().exact();
    let payload_size = if bodiless_status || is_head {
        if is_head
            && !bodiless_status
            && let Some(length) = exact_size
            && !parts.headers.contains_key(CONTENT_LENGTH)
        {
            parts.headers.insert(CONTENT_LENGTH, length.into());
        }
        PayloadSize::Empty
    } else {
        match exact_size {
            Some(length) => PayloadSize::Length(length),
            None if version >= Version::HTTP_11 => PayloadSize::Chunked,
            None => {
                // the end of the body can only be told by closing
                persist = false;
                PayloadSize::UntilClose
            }
        }
    };

    if version != Version::HTTP_09 {
        if !persist {
            parts.headers.insert(CONNECTION, HeaderValue::from_static("close"));
        } else if version == Version::HTTP_10 {
            parts.headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
        }
    }
    parts.version = version;

    let header = ResponseMessage::Header((ResponseHead::from_parts(parts, ()), payload_size));
    if payload_size.is_empty() {
        framed_write.send(header).await?;
        return Ok(persist);
    }
    framed_write.feed(header).await?;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| SendError::invalid_body(format!("resolve response body error: {e}")))?;
        // trailers have no place in the framings written here
        if let Ok(data) = frame.into_data() {
            framed_write.send(ResponseMessage::Payload(PayloadItem::Chunk(data))).await?;
        }
    }
    framed_write.send(ResponseMessage::Payload(PayloadItem::Eof)).await?;
    Ok(persist)
}

fn has_close_token(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("close"))
}

/// A short plain text response standing in for the handler's
fn status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let reason = status.canonical_reason().unwrap_or("Unknown Status");
    let mut response = Response::new(Full::new(Bytes::from(format!("{} {reason}\n", status.as_u16()))));
    *response.status_mut() = status;
    if let Ok(content_type) = HeaderValue::from_str(mime::TEXT_PLAIN_UTF_8.as_ref()) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

/// Shuts down the write half, then drains what the peer still sends for up to `linger`
async fn close<R, W>(framed_read: FramedRead<R, RequestDecoder>, framed_write: FramedWrite<W, ResponseEncoder>, linger: Duration)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut writer = framed_write.into_inner();
    if let Err(e) = writer.shutdown().await {
        debug!(cause = %e, "can't shutdown connection");
        return;
    }
    if linger.is_zero() {
        return;
    }

    let mut reader = framed_read.into_inner();
    let drain = async {
        let mut buf = [0u8; LINGER_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => trace!(bytes = n, "discard bytes while lingering"),
            }
        }
    };
    if timeout(linger, drain).await.is_err() {
        debug!("peer still sending after linger timeout, drop connection");
    }
}
