//! Owned handle for the gateway's listening socket.
//!
//! At most one listener is active at a time. `rebind` is a critical section:
//! the handle's lock is held across probe, close and reopen, so concurrent
//! start/rebind/close calls queue behind it.
//!
//! Rebind policy is drain-then-cut. The old listener stops accepting at once;
//! requests already in flight finish against it for up to `drain_timeout`.
//! Whatever is still running after that is cut: its handler is dropped and the
//! caller gets a 503. Only after that does the new port bind.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use llamagate_core::Port;

use crate::error::ApiError;

/// Grace period for cut connections to flush their 503 before the server
/// task is aborted outright.
const CUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Unbound,
    Listening(Port),
    Rebinding { from: Port, to: Port },
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("gateway is already listening on port {0}")]
    AlreadyListening(Port),

    #[error("gateway is not listening")]
    NotListening,

    #[error("port {port} is unavailable: {source}")]
    PortUnavailable {
        port: Port,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: Port,
        #[source]
        source: io::Error,
    },
}

struct ActiveListener {
    port: Port,
    shutdown: oneshot::Sender<()>,
    cut: watch::Sender<bool>,
    task: JoinHandle<io::Result<()>>,
}

pub struct GatewayListener {
    router: Router,
    bind_addr: IpAddr,
    drain_timeout: Duration,
    state: StdMutex<ListenerState>,
    active: Mutex<Option<ActiveListener>>,
}

impl GatewayListener {
    pub fn new(router: Router, bind_addr: IpAddr, drain_timeout: Duration) -> Self {
        Self {
            router,
            bind_addr,
            drain_timeout,
            state: StdMutex::new(ListenerState::Unbound),
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ListenerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// `Unbound -> Listening(port)`.
    pub async fn start(&self, port: Port) -> Result<(), ListenerError> {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            return Err(ListenerError::AlreadyListening(current.port));
        }

        *active = Some(self.spawn(port).await?);
        self.set_state(ListenerState::Listening(port));
        Ok(())
    }

    /// `Listening(old) -> Rebinding -> Listening(port)`. Returns the old port.
    ///
    /// The new port is probed before anything is torn down, so an occupied
    /// port leaves the old listener untouched. If the final bind still fails
    /// the old port is bound again.
    pub async fn rebind(&self, port: Port) -> Result<Port, ListenerError> {
        let mut active = self.active.lock().await;
        let current = active
            .as_ref()
            .map(|a| a.port)
            .ok_or(ListenerError::NotListening)?;

        if current == port {
            info!(%port, "Gateway already listening on requested port");
            return Ok(current);
        }

        probe(self.bind_addr, port).map_err(|source| ListenerError::PortUnavailable { port, source })?;

        self.set_state(ListenerState::Rebinding { from: current, to: port });
        if let Some(old) = active.take() {
            self.drain(old).await;
        }

        match self.spawn(port).await {
            Ok(new) => {
                *active = Some(new);
                self.set_state(ListenerState::Listening(port));
                Ok(current)
            }
            Err(e) => {
                error!(error = %e, "Rebind failed, restoring port {current}");
                match self.spawn(current).await {
                    Ok(restored) => {
                        *active = Some(restored);
                        self.set_state(ListenerState::Listening(current));
                    }
                    Err(restore_err) => {
                        error!(error = %restore_err, "Could not restore previous port");
                        self.set_state(ListenerState::Unbound);
                    }
                }
                Err(e)
            }
        }
    }

    /// Stop accepting and drain. Closing an unbound gateway is a no-op.
    pub async fn close(&self) {
        let mut active = self.active.lock().await;
        if let Some(old) = active.take() {
            self.drain(old).await;
        }
        self.set_state(ListenerState::Unbound);
    }

    async fn spawn(&self, port: Port) -> Result<ActiveListener, ListenerError> {
        let addr = SocketAddr::new(self.bind_addr, port.get());
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { port, source })?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let (cut, cut_rx) = watch::channel(false);
        let router = self
            .router
            .clone()
            .layer(middleware::from_fn_with_state(cut_rx, cut_guard));
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(addr = %addr, "Server running on port {port}");
        Ok(ActiveListener {
            port,
            shutdown,
            cut,
            task,
        })
    }

    async fn drain(&self, old: ActiveListener) {
        let ActiveListener {
            port,
            shutdown,
            cut,
            mut task,
        } = old;
        let _ = shutdown.send(());

        match tokio::time::timeout(self.drain_timeout, &mut task).await {
            Ok(Ok(Ok(()))) => info!("Server closed on port {port}"),
            Ok(Ok(Err(e))) => warn!(error = %e, "Server on port {port} exited with an error"),
            Ok(Err(e)) => warn!(error = %e, "Server task on port {port} failed"),
            Err(_) => {
                warn!(
                    timeout = ?self.drain_timeout,
                    "In-flight requests on port {port} did not drain in time; cutting them off"
                );
                cut.send_replace(true);
                if tokio::time::timeout(CUT_GRACE, &mut task).await.is_err() {
                    task.abort();
                    let _ = task.await;
                }
                info!("Server closed on port {port}");
            }
        }
    }
}

/// Races each request against the listener's cut signal.
async fn cut_guard(State(cut): State<watch::Receiver<bool>>, request: Request, next: Next) -> Response {
    tokio::select! {
        response = next.run(request) => response,
        _ = cut_signalled(cut) => ApiError::ListenerClosed.into_response(),
    }
}

async fn cut_signalled(mut cut: watch::Receiver<bool>) {
    loop {
        if *cut.borrow_and_update() {
            return;
        }
        if cut.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Check that `port` can be bound right now. The probe socket is dropped
/// immediately.
fn probe(addr: IpAddr, port: Port) -> io::Result<()> {
    std::net::TcpListener::bind(SocketAddr::new(addr, port.get())).map(drop)
}
