//! Test fixtures: a stub Ollama backend and an in-process gateway.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::Value;
use tokio::net::TcpListener;

use llamagate_config::ConfigStore;
use llamagate_core::{ConfigKey, Port};
use llamagate_security::{Authorizer, KeyStore};

use crate::listener::GatewayListener;
use crate::proxy::{ForwardingProxy, ProxyOptions};
use crate::server::{AppState, build_router};

pub fn port(n: u16) -> Port {
    Port::new(n).unwrap()
}

/// A port nothing is listening on at the moment of the call.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[derive(Clone)]
pub struct StubBackend {
    status: StatusCode,
    body: Value,
    delay: Duration,
}

#[derive(Default)]
struct StubRecord {
    calls: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
}

pub struct RunningStub {
    pub port: Port,
    record: Arc<StubRecord>,
}

impl RunningStub {
    pub fn calls(&self) -> usize {
        self.record.calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.record.bodies.lock().unwrap().clone()
    }
}

impl StubBackend {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn failing(status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn spawn(self) -> RunningStub {
        let record = Arc::new(StubRecord::default());
        let app = Router::new()
            .route("/api/generate", post(stub_generate))
            .with_state((self, record.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bound = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        RunningStub {
            port: port(bound),
            record,
        }
    }
}

async fn stub_generate(
    State((stub, record)): State<(StubBackend, Arc<StubRecord>)>,
    Json(body): Json<Value>,
) -> Response {
    record.calls.fetch_add(1, Ordering::SeqCst);
    record.bodies.lock().unwrap().push(body);
    if !stub.delay.is_zero() {
        tokio::time::sleep(stub.delay).await;
    }
    (stub.status, Json(stub.body)).into_response()
}

/// A gateway bound to 127.0.0.1 on a free port, backed by an in-memory key
/// store and a throw-away data directory.
pub struct TestGateway {
    pub keys: Arc<KeyStore>,
    pub config: Arc<ConfigStore>,
    pub listener: GatewayListener,
    pub port: Port,
    _dir: tempfile::TempDir,
}

impl TestGateway {
    pub async fn start() -> Self {
        Self::start_with_drain(Duration::from_secs(5)).await
    }

    pub async fn start_with_drain(drain: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let keys = Arc::new(KeyStore::in_memory().unwrap());
        let config = Arc::new(ConfigStore::new(dir.path()));
        let proxy = ForwardingProxy::new(
            config.clone(),
            ProxyOptions {
                backend_host: "127.0.0.1".into(),
                timeout: Duration::from_secs(10),
            },
        )
        .unwrap();

        let router = build_router(AppState {
            authorizer: Authorizer::new(keys.clone()),
            proxy: Arc::new(proxy),
        });
        let listener = GatewayListener::new(router, IpAddr::V4(Ipv4Addr::LOCALHOST), drain);
        let gateway_port = port(free_port());
        listener.start(gateway_port).await.unwrap();

        Self {
            keys,
            config,
            listener,
            port: gateway_port,
            _dir: dir,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub async fn use_backend(&self, backend: &RunningStub) {
        self.config
            .set(ConfigKey::BackendPort, backend.port)
            .await
            .unwrap();
    }

    pub async fn add_key(&self, key: &str) {
        self.keys.insert(key).await.unwrap();
    }
}
