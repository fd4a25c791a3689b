//! Live reload: client fan-out, the SSE endpoint and HTML injection.

mod broadcaster;
mod inject;
mod sse;

pub use broadcaster::{Broadcaster, Client, ClientId};
pub use inject::{InjectionPolicy, LIVE_RELOAD_PATH, inject_reload};
pub(crate) use sse::sse_handler;
