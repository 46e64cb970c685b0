//! Access Audit Logger
//!
//! One structured event per authorization decision, emitted on the
//! `gateway_access` target so it can be filtered or routed separately.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::mask_key;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum AccessEvent {
    /// Accepted key, masked.
    Authorized { route: String, key: String },
    /// Rejected key, kept verbatim for audit.
    Rejected { route: String, key: String },
    MissingKey { route: String },
}

impl AccessEvent {
    pub fn authorized(route: &str, key: &str) -> Self {
        AccessEvent::Authorized {
            route: route.to_string(),
            key: mask_key(key),
        }
    }

    pub fn rejected(route: &str, key: &str) -> Self {
        AccessEvent::Rejected {
            route: route.to_string(),
            key: key.to_string(),
        }
    }

    pub fn missing_key(route: &str) -> Self {
        AccessEvent::MissingKey {
            route: route.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccessLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AccessEvent,
}

pub struct AccessLogger;

impl AccessLogger {
    pub fn log(event: AccessEvent) {
        let entry = AccessLogEntry {
            timestamp: Utc::now(),
            event,
        };
        let json = serde_json::to_string(&entry).unwrap_or_default();

        match &entry.event {
            AccessEvent::Rejected { key, .. } => {
                warn!(target: "gateway_access", entry = %json, "Invalid API key: {key}");
            }
            AccessEvent::MissingKey { .. } => {
                warn!(target: "gateway_access", entry = %json, "Request without API key");
            }
            AccessEvent::Authorized { .. } => {
                info!(target: "gateway_access", entry = %json, "Authorized request");
            }
        }
    }
}
