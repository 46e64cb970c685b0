//! Operator console loop: one command per input line.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, Lines};
use tracing::info;

use llamagate_commands::{CommandResponse, Console};

use crate::terminal_output::print_response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// Input ended; the gateway keeps serving.
    Eof,
    /// The operator asked for shutdown.
    Exit,
}

pub async fn run<R: AsyncBufRead + Unpin>(console: &Console, input: &mut Lines<R>) -> Result<ConsoleExit> {
    run_with(console, input, print_response).await
}

async fn run_with<R, F>(console: &Console, input: &mut Lines<R>, mut render: F) -> Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&CommandResponse),
{
    while let Some(line) = input.next_line().await.context("reading console input")? {
        let Some(response) = console.handle_line(&line).await else {
            continue;
        };
        render(&response);
        if response.exit {
            return Ok(ConsoleExit::Exit);
        }
    }
    info!("Console input closed; gateway keeps running");
    Ok(ConsoleExit::Eof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::AsyncBufReadExt;

    use llamagate_config::ConfigStore;
    use llamagate_core::Port;
    use llamagate_gateway::{build_router, AppState, ForwardingProxy, GatewayListener, ProxyOptions};
    use llamagate_security::{Authorizer, KeyStore};

    fn console(dir: &tempfile::TempDir) -> (Console, Arc<KeyStore>) {
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
        (Console::new(keys.clone(), config, gateway), keys)
    }

    #[tokio::test]
    async fn runs_until_exit() {
        let dir = tempfile::tempdir().unwrap();
        let (console, keys) = console(&dir);
        let mut input = "addkey abc\n\nbogus\nexit\naddkey never\n".as_bytes().lines();

        let mut seen = Vec::new();
        let outcome = run_with(&console, &mut input, |r| seen.push(r.clone()))
            .await
            .unwrap();

        assert_eq!(outcome, ConsoleExit::Exit);
        assert_eq!(seen.len(), 3);
        assert!(seen[1].failed());
        assert!(keys.exists("abc").await.unwrap());
        assert!(!keys.exists("never").await.unwrap());
    }

    #[tokio::test]
    async fn eof_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (console, _) = console(&dir);
        let mut input = "changeollamaport 11434\n".as_bytes().lines();

        let outcome = run_with(&console, &mut input, |_| {}).await.unwrap();
        assert_eq!(outcome, ConsoleExit::Eof);

        let stored = ConfigStore::new(dir.path())
            .get(llamagate_core::ConfigKey::BackendPort)
            .await
            .unwrap();
        assert_eq!(stored, Port::new(11434).unwrap());
    }
}
