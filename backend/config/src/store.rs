use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use llamagate_core::{ConfigKey, Port, PortError};

use crate::io::{read_trimmed, write_atomic};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not configured ({} does not exist)", .path.display())]
    NotFound { key: ConfigKey, path: PathBuf },

    #[error("{key} in {} is invalid: {source}", .path.display())]
    Invalid {
        key: ConfigKey,
        path: PathBuf,
        #[source]
        source: PortError,
    },

    #[error("invalid {key}: {source}")]
    InvalidPort {
        key: ConfigKey,
        #[source]
        source: PortError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// True when the value is absent or unreadable as a port, i.e. the
    /// operator has to supply it again.
    pub fn needs_prompt(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. } | ConfigError::Invalid { .. })
    }
}

/// Durable store for the gateway port and the Ollama port.
///
/// All reads and writes of the port files go through here. Writes are
/// serialized so two concurrent `set` calls never race on the temp file.
#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, key: ConfigKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read a port value. Absence is an error, never a default.
    pub async fn get(&self, key: ConfigKey) -> Result<Port, ConfigError> {
        let path = self.path_for(key);
        let raw = read_trimmed(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?
            .ok_or_else(|| ConfigError::NotFound {
                key,
                path: path.clone(),
            })?;

        raw.parse::<Port>().map_err(|source| {
            warn!(path = %path.display(), value = %raw, "Invalid port in config file");
            ConfigError::Invalid { key, path, source }
        })
    }

    /// Persist a port value. Returns once the write is on disk.
    pub async fn set(&self, key: ConfigKey, port: Port) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        let _guard = self.write_lock.lock().await;
        write_atomic(&path, &port.to_string())
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        info!(%key, %port, path = %path.display(), "Saved config value");
        Ok(())
    }

    /// Validate operator text and persist it. Nothing is written when the
    /// text is not a valid port.
    pub async fn set_from_str(&self, key: ConfigKey, raw: &str) -> Result<Port, ConfigError> {
        let port = raw
            .parse::<Port>()
            .map_err(|source| ConfigError::InvalidPort { key, source })?;
        self.set(key, port).await?;
        Ok(port)
    }
}
