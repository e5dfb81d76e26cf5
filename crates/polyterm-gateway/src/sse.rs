//! Server-sent events transport for stream sessions.

use crate::session::StreamSession;
use axum::http::{header, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use polyterm_core::OutwardMessage;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// SSE body for one session.
///
/// Dropping the stream (client went away, or the response was discarded)
/// cancels the session.
pub struct SessionStream {
    rx: mpsc::Receiver<OutwardMessage>,
    session: Arc<StreamSession>,
}

impl SessionStream {
    pub fn new(rx: mpsc::Receiver<OutwardMessage>, session: Arc<StreamSession>) -> Self {
        Self { rx, session }
    }
}

impl Stream for SessionStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(message)) => match message.to_json() {
                    Ok(json) => return Poll::Ready(Some(Ok(Event::default().data(json)))),
                    Err(e) => {
                        warn!(session_id = %this.session.id(), error = %e, "Dropping unserializable message");
                    }
                },
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        if !self.session.is_closed() {
            debug!(session_id = %self.session.id(), "Stream dropped by client");
        }
        self.session.cancel();
    }
}

/// Wrap a session stream into an SSE response.
pub fn sse_response(stream: SessionStream) -> Response {
    let mut response = Sse::new(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
