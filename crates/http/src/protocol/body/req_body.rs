use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use http_body::{Body, Frame, SizeHint};
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// Number of chunks buffered between the transport and the body consumer
const BODY_CHANNEL_SIZE: usize = 8;

type BodyItem = Result<PayloadItem, ParseError>;

/// The request body handed to a [`Handler`](crate::handler::Handler).
#[derive(Debug)]
pub struct ReqBody {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    Empty,
    Streaming { receiver: mpsc::Receiver<BodyItem>, size: PayloadSize, eof: bool },
}

/// Feeds one request body from the connection's read loop.
#[derive(Debug)]
pub struct ReqBodySender {
    sender: mpsc::Sender<BodyItem>,
    discarded: usize,
}

impl ReqBody {
    /// A body without any payload
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    /// Creates a body streaming channel pair for a payload of the given size.
    pub fn body_channel(size: PayloadSize) -> (ReqBody, ReqBodySender) {
        let (sender, receiver) = mpsc::channel(BODY_CHANNEL_SIZE);
        let body = ReqBody { kind: Kind::Streaming { receiver, size, eof: false } };
        (body, ReqBodySender { sender, discarded: 0 })
    }
}

impl ReqBodySender {
    /// Forwards a payload item; once the consumer is gone the rest of the body is
    /// discarded and `false` is returned
    pub async fn send(&mut self, item: PayloadItem) -> bool {
        let len = item.as_bytes().map_or(0, Bytes::len);
        if self.sender.is_closed() {
            self.discarded += len;
            return false;
        }
        match self.sender.send(Ok(item)).await {
            Ok(()) => true,
            Err(_) => {
                self.discarded += len;
                false
            }
        }
    }

    /// Ends the body with an error, e.g. when the connection is lost mid-body
    pub async fn fail(mut self, error: ParseError) {
        if self.sender.send(Err(error)).await.is_err() {
            trace!("request body already dropped by handler");
        }
    }

    /// Bytes thrown away because the consumer dropped the body
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let Kind::Streaming { receiver, eof, .. } = &mut self.kind else {
            return Poll::Ready(None);
        };
        if *eof {
            return Poll::Ready(None);
        }

        match ready!(receiver.poll_next_unpin(cx)) {
            Some(Ok(PayloadItem::Chunk(bytes))) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Some(Ok(PayloadItem::Eof)) => {
                *eof = true;
                Poll::Ready(None)
            }
            Some(Err(e)) => {
                *eof = true;
                Poll::Ready(Some(Err(e)))
            }
            // the sender went away without finishing the body
            None => {
                *eof = true;
                Poll::Ready(Some(Err(ParseError::ConnectionLost)))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Streaming { eof, .. } => *eof,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Empty => SizeHint::with_exact(0),
            Kind::Streaming { size, .. } => size.exact().map_or_else(SizeHint::default, SizeHint::with_exact),
        }
    }
}
