//! Forwarding proxy to the local Ollama server.
//!
//! The backend port is read from the config store on every call, so an
//! operator change takes effect on the next request without a restart.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, error};

use llamagate_config::{ConfigError, ConfigStore};
use llamagate_core::{BackendPayload, ConfigKey};
use llamagate_logging::redact_sensitive_data;

/// Longest slice of a backend error body that makes it into the logs.
const MAX_LOGGED_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("backend port is not configured: {0}")]
    ConfigMissing(#[source] ConfigError),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

#[derive(Debug, Clone)]
pub struct ProxyOptions {
    /// Host part of the backend URL.
    pub backend_host: String,
    /// Upper bound on a whole backend exchange, body included.
    pub timeout: Duration,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            backend_host: "localhost".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Successful backend reply, relayed to the caller as-is.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl IntoResponse for BackendResponse {
    fn into_response(self) -> Response {
        let content_type = self
            .content_type
            .unwrap_or_else(|| "application/json".to_string());
        (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], self.body).into_response()
    }
}

pub struct ForwardingProxy {
    client: Client,
    config: Arc<ConfigStore>,
    backend_host: String,
}

impl ForwardingProxy {
    pub fn new(config: Arc<ConfigStore>, options: ProxyOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(options.timeout).build()?;
        Ok(Self {
            client,
            config,
            backend_host: options.backend_host,
        })
    }

    /// `http://<host>:<BackendPort>/api/generate`, resolved now.
    pub async fn backend_url(&self) -> Result<String, ProxyError> {
        let port = self.config.get(ConfigKey::BackendPort).await.map_err(|e| {
            error!(error = %e, "Error retrieving Ollama server port");
            ProxyError::ConfigMissing(e)
        })?;
        Ok(format!("http://{}:{}/api/generate", self.backend_host, port))
    }

    /// Send the payload to Ollama and return its body on a 2xx reply.
    pub async fn forward(&self, payload: &BackendPayload) -> Result<BackendResponse, ProxyError> {
        let url = self.backend_url().await?;
        debug!(url = %url, model = ?payload.model, "Forwarding request to Ollama");

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| backend_failure(&url, "request failed", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = redact_sensitive_data(&body)
                .chars()
                .take(MAX_LOGGED_ERROR_BODY)
                .collect();
            error!(url = %url, %status, body = %body, "Error making request to Ollama API");
            return Err(ProxyError::BackendUnavailable(format!("backend returned {status}")));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| backend_failure(&url, "reading response failed", &e))?;

        Ok(BackendResponse { content_type, body })
    }
}

fn backend_failure(url: &str, what: &str, err: &reqwest::Error) -> ProxyError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else {
        "other"
    };
    error!(url = %url, kind, error = %err, "Error making request to Ollama API: {what}");
    ProxyError::BackendUnavailable(format!("{what}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubBackend, free_port, port};
    use serde_json::json;

    fn payload() -> BackendPayload {
        BackendPayload {
            model: Some("llama2".into()),
            prompt: Some("hi".into()),
            stream: Some(false.into()),
            images: None,
            raw: None,
        }
    }

    async fn proxy_for(dir: &tempfile::TempDir, timeout: Duration) -> (ForwardingProxy, Arc<ConfigStore>) {
        let config = Arc::new(ConfigStore::new(dir.path()));
        let proxy = ForwardingProxy::new(
            config.clone(),
            ProxyOptions {
                backend_host: "127.0.0.1".into(),
                timeout,
            },
        )
        .unwrap();
        (proxy, config)
    }

    #[tokio::test]
    async fn relays_backend_body_verbatim() {
        let backend = StubBackend::ok(json!({ "response": "hello" })).spawn().await;
        let dir = tempfile::tempdir().unwrap();
        let (proxy, config) = proxy_for(&dir, Duration::from_secs(5)).await;
        config.set(ConfigKey::BackendPort, backend.port).await.unwrap();

        let reply = proxy.forward(&payload()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(body, json!({ "response": "hello" }));
        assert_eq!(backend.calls(), 1);
        assert_eq!(
            backend.bodies()[0],
            json!({ "model": "llama2", "prompt": "hi", "stream": false })
        );
    }

    #[tokio::test]
    async fn unset_port_is_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (proxy, _) = proxy_for(&dir, Duration::from_secs(5)).await;
        assert!(matches!(
            proxy.forward(&payload()).await,
            Err(ProxyError::ConfigMissing(_))
        ));
    }

    #[tokio::test]
    async fn non_success_status_is_backend_unavailable() {
        let backend = StubBackend::failing(500, json!({ "error": "model 'x' not found" }))
            .spawn()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let (proxy, config) = proxy_for(&dir, Duration::from_secs(5)).await;
        config.set(ConfigKey::BackendPort, backend.port).await.unwrap();

        assert!(matches!(
            proxy.forward(&payload()).await,
            Err(ProxyError::BackendUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_backend_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let (proxy, config) = proxy_for(&dir, Duration::from_secs(5)).await;
        config.set(ConfigKey::BackendPort, port(free_port())).await.unwrap();

        assert!(matches!(
            proxy.forward(&payload()).await,
            Err(ProxyError::BackendUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let backend = StubBackend::ok(json!({ "response": "late" }))
            .with_delay(Duration::from_millis(800))
            .spawn()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let (proxy, config) = proxy_for(&dir, Duration::from_millis(200)).await;
        config.set(ConfigKey::BackendPort, backend.port).await.unwrap();

        assert!(matches!(
            proxy.forward(&payload()).await,
            Err(ProxyError::BackendUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn backend_port_is_read_per_request() {
        let first = StubBackend::ok(json!({ "response": "first" })).spawn().await;
        let second = StubBackend::ok(json!({ "response": "second" })).spawn().await;
        let dir = tempfile::tempdir().unwrap();
        let (proxy, config) = proxy_for(&dir, Duration::from_secs(5)).await;

        config.set(ConfigKey::BackendPort, first.port).await.unwrap();
        proxy.forward(&payload()).await.unwrap();
        config.set(ConfigKey::BackendPort, second.port).await.unwrap();
        let reply = proxy.forward(&payload()).await.unwrap();

        let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(body["response"], "second");
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }
}
