//! Live relay of a backend response body.
//!
//! [`RelayBody`] is the body of every forwarded response. It pulls
//! frames from the backend connection only when the server asks for
//! the next one, and hands them on in pieces of at most
//! [`CHUNK_SIZE`] bytes. The server writes and flushes each piece
//! before polling again, so the client sees data as it arrives.
//!
//! Exit paths:
//! - backend end-of-stream ends the body normally;
//! - a backend read error, or no data for `read_timeout`, is logged
//!   and returned as a body error, which aborts the client connection;
//! - a client write failure makes the server drop the body.
//!
//! In every case the backend connection is released or closed when the
//! body is dropped.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use hyper::body::{Body, Frame, Incoming, SizeHint};
use tokio::time::Sleep;

use crate::error::RelayError;

/// Largest piece of body handed to the server at once.
pub const CHUNK_SIZE: usize = 32 * 1024;

pub struct RelayBody<B = Incoming> {
    upstream: B,
    pending: Bytes,
    read_timeout: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
    target: String,
    relayed: u64,
    done: bool,
}

impl<B> RelayBody<B> {
    pub fn new(upstream: B, read_timeout: Duration, target: impl Into<String>) -> Self {
        Self {
            upstream,
            pending: Bytes::new(),
            read_timeout,
            deadline: None,
            target: target.into(),
            relayed: 0,
            done: false,
        }
    }

    fn next_chunk(&mut self) -> Frame<Bytes> {
        let len = self.pending.len().min(CHUNK_SIZE);
        let chunk = self.pending.split_to(len);
        self.relayed += chunk.len() as u64;
        Frame::data(chunk)
    }
}

impl<B> Body for RelayBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<RelayError>,
{
    type Data = Bytes;
    type Error = RelayError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if !this.pending.is_empty() {
            return Poll::Ready(Some(Ok(this.next_chunk())));
        }

        loop {
            match Pin::new(&mut this.upstream).poll_frame(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    this.deadline = None;
                    match frame.into_data() {
                        Ok(data) if data.is_empty() => {}
                        Ok(data) => {
                            this.pending = data;
                            return Poll::Ready(Some(Ok(this.next_chunk())));
                        }
                        // Trailers pass through untouched.
                        Err(frame) => return Poll::Ready(Some(Ok(frame))),
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    let err = e.into();
                    tracing::error!(
                        target_host = %this.target,
                        relayed_bytes = this.relayed,
                        error = %err,
                        "error streaming response"
                    );
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => {
                    let limit = this.read_timeout;
                    let deadline = this
                        .deadline
                        .get_or_insert_with(|| Box::pin(tokio::time::sleep(limit)));
                    if deadline.as_mut().poll(cx).is_pending() {
                        return Poll::Pending;
                    }
                    tracing::error!(
                        target_host = %this.target,
                        relayed_bytes = this.relayed,
                        timeout = ?limit,
                        "error streaming response: backend stalled"
                    );
                    this.done = true;
                    return Poll::Ready(Some(Err(RelayError::ReadTimeout(limit))));
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.pending.is_empty() && self.upstream.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        let upstream = self.upstream.size_hint();
        let pending = self.pending.len() as u64;
        if pending == 0 {
            return upstream;
        }
        let mut hint = SizeHint::new();
        hint.set_lower(upstream.lower() + pending);
        if let Some(upper) = upstream.upper() {
            hint.set_upper(upper + pending);
        }
        hint
    }
}

impl<B> Drop for RelayBody<B> {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(
                target_host = %self.target,
                relayed_bytes = self.relayed,
                "client went away, relay abandoned"
            );
        }
    }
}
