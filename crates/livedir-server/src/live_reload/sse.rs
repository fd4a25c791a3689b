//! Server-sent events endpoint for live reload.
//!
//! Each connection registers a [`Client`] and receives one `data: reload`
//! frame per broadcast. The client is deregistered when the response stream
//! is dropped, whatever the reason: browser navigated away, write failed, or
//! the server is shutting down.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::State;
use axum::http::HeaderName;
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use futures::Stream;

use super::broadcaster::{Broadcaster, Client};
use crate::state::AppState;

/// Payload of every frame sent on the reload stream.
const RELOAD_DATA: &str = "reload";

/// Handle GET /__livereload.
///
/// No keep-alive comments are sent; the stream carries reload frames only.
pub(crate) async fn sse_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stream = ReloadStream::new(Arc::clone(&state.broadcaster));

    (
        // Keep reverse proxies from buffering the stream.
        [(HeaderName::from_static("x-accel-buffering"), "no")],
        Sse::new(stream),
    )
}

/// Reload frames for one connected browser.
///
/// Ends when the client is removed from the broadcaster. Removes the client
/// when dropped.
pub(crate) struct ReloadStream {
    broadcaster: Arc<Broadcaster>,
    client: Client,
}

impl ReloadStream {
    pub(crate) fn new(broadcaster: Arc<Broadcaster>) -> Self {
        let client = broadcaster.add();
        Self {
            broadcaster,
            client,
        }
    }
}

impl Stream for ReloadStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.client
            .poll_recv(cx)
            .map(|signal| signal.map(|()| Ok(Event::default().data(RELOAD_DATA))))
    }
}

impl Drop for ReloadStream {
    fn drop(&mut self) {
        self.broadcaster.remove(self.client.id());
    }
}
