//! Structured logging for the llamagate gateway.
//!
//! Console + rolling NDJSON file output, key redaction, and the access audit
//! trail for authorization decisions.

pub mod access_log;
pub mod logger;
pub mod redact;

pub use access_log::{AccessEvent, AccessLogEntry, AccessLogger};
pub use logger::init_logger;
pub use redact::{mask_key, redact_sensitive_data};
