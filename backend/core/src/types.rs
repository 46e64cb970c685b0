use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::PortError;

/// A TCP port in the valid range `1..=65535`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port(u16);

impl Port {
    pub fn new(value: u16) -> Result<Self, PortError> {
        Self::try_from(i64::from(value))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for Port {
    type Error = PortError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u16::try_from(value) {
            Ok(port) if port != 0 => Ok(Self(port)),
            _ => Err(PortError::OutOfRange(value)),
        }
    }
}

impl FromStr for Port {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| PortError::NotANumber(trimmed.to_string()))?;
        Self::try_from(value)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// The two persisted configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Port the gateway listens on.
    GatewayPort,
    /// Port the local Ollama server listens on.
    BackendPort,
}

impl ConfigKey {
    /// File name under the data directory holding this value.
    pub fn file_name(self) -> &'static str {
        match self {
            ConfigKey::GatewayPort => "port.conf",
            ConfigKey::BackendPort => "ollamaPort.conf",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKey::GatewayPort => f.write_str("gateway port"),
            ConfigKey::BackendPort => f.write_str("Ollama port"),
        }
    }
}

/// Inbound body of `POST /generate`.
///
/// Built from any JSON object. Only `apikey` is interpreted; the Ollama
/// fields are carried as raw JSON so the gateway never second-guesses the
/// backend's own schema.
#[derive(Clone, Default)]
pub struct GenerationRequest {
    pub apikey: Option<Value>,
    pub prompt: Option<Value>,
    pub model: Option<Value>,
    pub stream: Option<Value>,
    pub images: Option<Value>,
    pub raw: Option<Value>,
}

impl From<Map<String, Value>> for GenerationRequest {
    fn from(mut body: Map<String, Value>) -> Self {
        // JSON null is treated like an absent field.
        let mut take = |name: &str| body.remove(name).filter(|v| !v.is_null());
        Self {
            apikey: take("apikey"),
            prompt: take("prompt"),
            model: take("model"),
            stream: take("stream"),
            images: take("images"),
            raw: take("raw"),
        }
    }
}

impl GenerationRequest {
    /// The caller's key, or `None` when the field is absent, empty or not a
    /// string.
    pub fn api_key(&self) -> Option<&str> {
        self.apikey
            .as_ref()
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
    }

    /// Strip the credential and keep only the fields Ollama understands.
    pub fn into_backend_payload(self) -> BackendPayload {
        BackendPayload {
            model: self.model,
            prompt: self.prompt,
            stream: self.stream,
            images: self.images,
            raw: self.raw,
        }
    }
}

// The key never goes through Debug output.
impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("apikey", &self.apikey.as_ref().map(|_| "<redacted>"))
            .field("prompt", &self.prompt)
            .field("model", &self.model)
            .field("stream", &self.stream)
            .field("images", &self.images.as_ref().map(|_| ".."))
            .field("raw", &self.raw)
            .finish()
    }
}

/// Body sent to `POST /api/generate` on the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}
