//! llamagate HTTP gateway
//!
//! Key-checked `/generate` and `/health` routes, the forwarding proxy to the
//! local Ollama server, and the owned listener handle that binds, rebinds and
//! closes the gateway socket.

pub mod error;
pub mod generate;
pub mod health_api;
pub mod listener;
pub mod proxy;
pub mod server;

#[cfg(test)]
mod test_support;

pub use error::ApiError;
pub use listener::{GatewayListener, ListenerError, ListenerState};
pub use proxy::{BackendResponse, ForwardingProxy, ProxyError, ProxyOptions};
pub use server::{AppState, build_router};
