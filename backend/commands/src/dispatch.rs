//! Console command execution against the key store, config store and
//! gateway listener.
use std::sync::Arc;

use tracing::{error, info, warn};

use llamagate_config::ConfigStore;
use llamagate_core::{ConfigKey, Port};
use llamagate_gateway::GatewayListener;
use llamagate_security::{ApiKeyRecord, KeyStore, KeyStoreError, generate_key};

use crate::parse::parse_command;
use crate::registry::help_text;
use crate::types::ConsoleCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
}

/// What a command produced, for the terminal to render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResponse {
    pub notes: Vec<Note>,
    /// Set by `listkey`.
    pub keys: Option<Vec<ApiKeyRecord>>,
    /// Set by `exit`: the caller should start shutdown.
    pub exit: bool,
}

impl CommandResponse {
    fn note(note: Note) -> Self {
        Self {
            notes: vec![note],
            ..Default::default()
        }
    }

    fn push(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    pub fn failed(&self) -> bool {
        self.notes.iter().any(|n| matches!(n, Note::Error(_)))
    }
}

pub struct Console {
    keys: Arc<KeyStore>,
    config: Arc<ConfigStore>,
    gateway: Arc<GatewayListener>,
}

impl Console {
    pub fn new(keys: Arc<KeyStore>, config: Arc<ConfigStore>, gateway: Arc<GatewayListener>) -> Self {
        Self {
            keys,
            config,
            gateway,
        }
    }

    /// Parse and run one input line. Blank lines produce nothing.
    pub async fn handle_line(&self, line: &str) -> Option<CommandResponse> {
        match parse_command(line) {
            Ok(Some(command)) => Some(self.execute(command).await),
            Ok(None) => None,
            Err(e) => Some(CommandResponse::note(Note::Error(e.to_string()))),
        }
    }

    pub async fn execute(&self, command: ConsoleCommand) -> CommandResponse {
        match command {
            ConsoleCommand::GenerateKey => self.generate_key().await,
            ConsoleCommand::ListKeys => self.list_keys().await,
            ConsoleCommand::RemoveKey(key) => self.remove_key(&key).await,
            ConsoleCommand::AddKey(key) => self.add_key(&key).await,
            ConsoleCommand::ChangePort(port) => self.change_port(port).await,
            ConsoleCommand::ChangeBackendPort(port) => self.change_backend_port(port).await,
            ConsoleCommand::Help => CommandResponse::note(Note::Info(help_text())),
            ConsoleCommand::Exit => CommandResponse {
                notes: vec![Note::Info("Shutting down".into())],
                exit: true,
                ..Default::default()
            },
        }
    }

    async fn generate_key(&self) -> CommandResponse {
        let key = generate_key();
        match self.keys.insert(&key).await {
            Ok(_) => {
                info!("Generated a new API key");
                CommandResponse::note(Note::Success(format!("API key generated: {key}")))
            }
            Err(e) => {
                error!(error = %e, "Error generating API key");
                CommandResponse::note(Note::Error(format!("Error generating API key: {e}")))
            }
        }
    }

    async fn list_keys(&self) -> CommandResponse {
        match self.keys.list().await {
            Ok(keys) => CommandResponse {
                keys: Some(keys),
                ..Default::default()
            },
            Err(e) => CommandResponse::note(Note::Error(format!("Error listing API keys: {e}"))),
        }
    }

    async fn remove_key(&self, key: &str) -> CommandResponse {
        match self.keys.remove(key).await {
            Ok(true) => {
                info!("Removed an API key");
                CommandResponse::note(Note::Success(format!("API key removed: {key}")))
            }
            Ok(false) => CommandResponse::note(Note::Warning(format!("Key not found: {key}"))),
            Err(e) => CommandResponse::note(Note::Error(format!("Error removing API key: {e}"))),
        }
    }

    async fn add_key(&self, key: &str) -> CommandResponse {
        let response = CommandResponse::note(Note::Warning(
            "Adding your own keys may be unsafe. It is recommended to generate keys using the generatekey command."
                .into(),
        ));
        match self.keys.insert(key).await {
            Ok(_) => {
                info!("Added an operator-supplied API key");
                response.push(Note::Success(format!("API key added: {key}")))
            }
            Err(KeyStoreError::DuplicateKey) => response.push(Note::Error(format!("Key already exists: {key}"))),
            Err(e) => response.push(Note::Error(format!("Error adding API key: {e}"))),
        }
    }

    /// Rebind first, then persist. A failed write moves the gateway back so
    /// the running port and the saved port never disagree.
    async fn change_port(&self, port: Port) -> CommandResponse {
        let previous = match self.gateway.rebind(port).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, %port, "Port change aborted");
                return CommandResponse::note(Note::Error(format!("Error changing port: {e}")));
            }
        };

        if let Err(e) = self.config.set(ConfigKey::GatewayPort, port).await {
            error!(error = %e, "Error saving port number");
            let response = CommandResponse::note(Note::Error(format!("Error saving port number: {e}")));
            return match self.gateway.rebind(previous).await {
                Ok(_) => response.push(Note::Warning(format!("Server kept on port {previous}"))),
                Err(e) => response.push(Note::Error(format!("Could not return to port {previous}: {e}"))),
            };
        }

        if previous == port {
            CommandResponse::note(Note::Info(format!("Server already running on port {port}")))
        } else {
            CommandResponse::note(Note::Success(format!(
                "Server moved from port {previous} to {port}; saved to {}",
                ConfigKey::GatewayPort.file_name()
            )))
        }
    }

    async fn change_backend_port(&self, port: Port) -> CommandResponse {
        match self.config.set(ConfigKey::BackendPort, port).await {
            Ok(()) => CommandResponse::note(Note::Success(format!(
                "Ollama port number saved to {}: {port}",
                ConfigKey::BackendPort.file_name()
            ))),
            Err(e) => CommandResponse::note(Note::Error(format!("Error saving Ollama port number: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use llamagate_gateway::{AppState, ForwardingProxy, ListenerState, ProxyOptions, build_router};
    use llamagate_security::Authorizer;

    struct Fixture {
        console: Console,
        keys: Arc<KeyStore>,
        config: Arc<ConfigStore>,
        gateway: Arc<GatewayListener>,
        _dir: tempfile::TempDir,
    }

    fn free_port() -> Port {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        Port::new(probe.local_addr().unwrap().port()).unwrap()
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let keys = Arc::new(KeyStore::in_memory().unwrap());
        let config = Arc::new(ConfigStore::new(dir.path()));
        let proxy = ForwardingProxy::new(config.clone(), ProxyOptions::default()).unwrap();
        let router = build_router(AppState {
            authorizer: Authorizer::new(keys.clone()),
            proxy: Arc::new(proxy),
        });
        let gateway = Arc::new(GatewayListener::new(
            router,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            Duration::from_secs(1),
        ));
        let port = free_port();
        gateway.start(port).await.unwrap();
        config.set(ConfigKey::GatewayPort, port).await.unwrap();

        Fixture {
            console: Console::new(keys.clone(), config.clone(), gateway.clone()),
            keys,
            config,
            gateway,
            _dir: dir,
        }
    }

    async fn run(fx: &Fixture, line: &str) -> CommandResponse {
        fx.console.handle_line(line).await.unwrap()
    }

    #[tokio::test]
    async fn generatekey_stores_a_fresh_key() {
        let fx = fixture().await;
        let response = run(&fx, "generatekey").await;
        assert!(!response.failed());

        let Note::Success(text) = &response.notes[0] else {
            panic!("unexpected {response:?}");
        };
        let key = text.trim_start_matches("API key generated: ");
        assert_eq!(key.len(), 40);
        assert!(fx.keys.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn addkey_warns_and_rejects_duplicates() {
        let fx = fixture().await;

        let first = run(&fx, "addkey abc123").await;
        assert!(matches!(first.notes[0], Note::Warning(_)));
        assert_eq!(first.notes[1], Note::Success("API key added: abc123".into()));

        let second = run(&fx, "addkey abc123").await;
        assert!(second.failed());
        assert!(second.notes.contains(&Note::Error("Key already exists: abc123".into())));
        assert_eq!(fx.keys.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn removekey_reports_what_happened() {
        let fx = fixture().await;
        fx.keys.insert("abc123").await.unwrap();

        let removed = run(&fx, "removekey abc123").await;
        assert_eq!(removed.notes, vec![Note::Success("API key removed: abc123".into())]);

        let absent = run(&fx, "removekey abc123").await;
        assert_eq!(absent.notes, vec![Note::Warning("Key not found: abc123".into())]);
        assert!(!absent.failed());
    }

    #[tokio::test]
    async fn listkey_returns_a_snapshot() {
        let fx = fixture().await;
        fx.keys.insert("one").await.unwrap();
        fx.keys.insert("two").await.unwrap();

        let response = run(&fx, "listkey").await;
        let keys: Vec<String> = response.keys.unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn changeport_rebinds_and_persists() {
        let fx = fixture().await;
        let new = free_port();

        let response = run(&fx, &format!("changeport {new}")).await;
        assert!(!response.failed(), "{response:?}");
        assert_eq!(fx.gateway.state(), ListenerState::Listening(new));
        assert_eq!(fx.config.get(ConfigKey::GatewayPort).await.unwrap(), new);
        assert!(tokio::net::TcpStream::connect(("127.0.0.1", new.get())).await.is_ok());
    }

    #[tokio::test]
    async fn changeport_to_a_busy_port_changes_nothing() {
        let fx = fixture().await;
        let before = fx.config.get(ConfigKey::GatewayPort).await.unwrap();
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let busy = blocker.local_addr().unwrap().port();

        let response = run(&fx, &format!("changeport {busy}")).await;
        assert!(response.failed());
        assert_eq!(fx.gateway.state(), ListenerState::Listening(before));
        assert_eq!(fx.config.get(ConfigKey::GatewayPort).await.unwrap(), before);
    }

    #[tokio::test]
    async fn invalid_port_argument_mutates_nothing() {
        let fx = fixture().await;
        let before = fx.config.get(ConfigKey::GatewayPort).await.unwrap();

        for line in ["changeport abc", "changeport 0", "changeollamaport 99999"] {
            assert!(run(&fx, line).await.failed(), "{line}");
        }
        assert_eq!(fx.gateway.state(), ListenerState::Listening(before));
        assert_eq!(fx.config.get(ConfigKey::GatewayPort).await.unwrap(), before);
        assert!(fx.config.get(ConfigKey::BackendPort).await.is_err());
    }

    #[tokio::test]
    async fn changeollamaport_only_persists() {
        let fx = fixture().await;
        let before = fx.gateway.state();

        let response = run(&fx, "changeollamaport 11435").await;
        assert!(!response.failed());
        assert_eq!(
            fx.config.get(ConfigKey::BackendPort).await.unwrap(),
            Port::new(11435).unwrap()
        );
        assert_eq!(fx.gateway.state(), before);
    }

    #[tokio::test]
    async fn unknown_and_blank_input() {
        let fx = fixture().await;
        assert!(fx.console.handle_line("   ").await.is_none());

        let response = run(&fx, "frobnicate").await;
        assert_eq!(response.notes, vec![Note::Error("Unknown command: frobnicate".into())]);
    }

    #[tokio::test]
    async fn store_errors_do_not_stop_the_console() {
        let fx = fixture().await;
        fx.keys.close().await.unwrap();

        assert!(run(&fx, "generatekey").await.failed());
        assert!(run(&fx, "listkey").await.failed());
        // Commands that do not touch the store still work.
        assert!(!run(&fx, "changeollamaport 11434").await.failed());
    }

    #[tokio::test]
    async fn exit_requests_shutdown() {
        let fx = fixture().await;
        assert!(run(&fx, "exit").await.exit);
        assert!(!run(&fx, "help").await.exit);
    }
}
