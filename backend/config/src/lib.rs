//! `llamagate-config`: durable storage for the gateway and Ollama ports.
//!
//! Each value lives in its own small text file under the data directory and is
//! written through on every change (temp file, fsync, rename). Nothing here
//! falls back to a default: a missing value is reported so the caller can ask
//! the operator for one.

pub mod io;
pub mod store;

pub use store::{ConfigError, ConfigStore};
