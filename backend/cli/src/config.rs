use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Process settings for `llamagate serve`.
///
/// The two ports are not here: they live in the data directory and are
/// managed by the config store.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Holds `port.conf`, `ollamaPort.conf` and `apiKeys.db`
    pub data_dir: PathBuf,
    /// Rolling log file directory
    pub log_dir: PathBuf,
    /// Address the gateway binds to
    pub bind_address: IpAddr,
    /// Host part of the Ollama URL
    pub backend_host: String,
    pub backend_timeout: Duration,
    /// How long a rebind waits for in-flight requests
    pub drain_timeout: Duration,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            log_dir: PathBuf::from("logs"),
            bind_address: IpAddr::from([0, 0, 0, 0]),
            backend_host: "localhost".to_string(),
            backend_timeout: Duration::from_secs(120),
            drain_timeout: Duration::from_secs(30),
            log_level: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    /// Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            lookup(name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            data_dir: lookup("LLAMAGATE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            log_dir: lookup("LLAMAGATE_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            bind_address: lookup("LLAMAGATE_BIND")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.bind_address),
            backend_host: lookup("LLAMAGATE_BACKEND_HOST").unwrap_or(defaults.backend_host),
            backend_timeout: secs("LLAMAGATE_BACKEND_TIMEOUT_SECS", defaults.backend_timeout),
            drain_timeout: secs("LLAMAGATE_DRAIN_TIMEOUT_SECS", defaults.drain_timeout),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    pub fn key_db_path(&self) -> PathBuf {
        self.data_dir.join("apiKeys.db")
    }
}
