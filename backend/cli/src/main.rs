mod bootstrap;
mod config;
mod console;
mod terminal_output;

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use llamagate_commands::{help_text, Console};
use llamagate_config::ConfigStore;
use llamagate_core::{ConfigKey, Port};
use llamagate_gateway::{build_router, AppState, ForwardingProxy, GatewayListener, ProxyOptions};
use llamagate_security::{Authorizer, KeyStore};

use config::RuntimeConfig;
use console::ConsoleExit;

#[derive(Parser)]
#[command(name = "llamagate")]
#[command(about = "API-key gateway for a local Ollama server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway and the operator console
    Serve {
        /// Directory holding the port files and the key database
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Directory for rolling log files
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Address to bind the gateway to
        #[arg(long)]
        bind: Option<IpAddr>,
        /// Host the Ollama server runs on
        #[arg(long)]
        backend_host: Option<String>,
        /// Timeout for a whole Ollama request, in seconds
        #[arg(long)]
        backend_timeout_secs: Option<u64>,
        /// How long a port change waits for in-flight requests, in seconds
        #[arg(long)]
        drain_timeout_secs: Option<u64>,
    },
    /// Check whether a gateway is answering on its configured port
    Status {
        /// API key to authenticate the health check with
        #[arg(long)]
        apikey: Option<String>,
        /// Port to probe instead of the one in port.conf
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            data_dir,
            log_dir,
            bind,
            backend_host,
            backend_timeout_secs,
            drain_timeout_secs,
        } => {
            let config = RuntimeConfig {
                data_dir: data_dir.unwrap_or(config.data_dir),
                log_dir: log_dir.unwrap_or(config.log_dir),
                bind_address: bind.unwrap_or(config.bind_address),
                backend_host: backend_host.unwrap_or(config.backend_host),
                backend_timeout: backend_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(config.backend_timeout),
                drain_timeout: drain_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(config.drain_timeout),
                ..config
            };
            llamagate_logging::init_logger(&config.log_dir, &config.log_level);
            run_server(config).await?;
            // A pending stdin read would keep the runtime from shutting down.
            std::process::exit(0);
        }
        Commands::Status {
            apikey,
            port,
            data_dir,
        } => {
            let data_dir = data_dir.unwrap_or(config.data_dir);
            check_status(data_dir, port, apikey).await?;
        }
    }

    Ok(())
}

async fn run_server(config: RuntimeConfig) -> Result<()> {
    info!(
        data_dir = %config.data_dir.display(),
        bind = %config.bind_address,
        backend_host = %config.backend_host,
        "Starting llamagate"
    );

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;
    let store = Arc::new(ConfigStore::new(&config.data_dir));

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();
    let gateway_port =
        bootstrap::ensure_port(&store, ConfigKey::GatewayPort, &mut input, &mut stdout).await?;
    bootstrap::ensure_port(&store, ConfigKey::BackendPort, &mut input, &mut stdout).await?;

    let keys = Arc::new(
        KeyStore::open(config.key_db_path())
            .with_context(|| format!("opening {}", config.key_db_path().display()))?,
    );

    let proxy = ForwardingProxy::new(
        store.clone(),
        ProxyOptions {
            backend_host: config.backend_host.clone(),
            timeout: config.backend_timeout,
        },
    )
    .context("building the Ollama HTTP client")?;

    let router = build_router(AppState {
        authorizer: Authorizer::new(keys.clone()),
        proxy: Arc::new(proxy),
    });
    let gateway = Arc::new(GatewayListener::new(router, config.bind_address, config.drain_timeout));
    gateway
        .start(gateway_port)
        .await
        .with_context(|| format!("starting the gateway on port {gateway_port}"))?;

    terminal_output::note_info(&format!("Server running on port {gateway_port}"));
    println!("{}", help_text());

    let operator = Console::new(keys.clone(), store, gateway.clone());
    tokio::select! {
        _ = shutdown_signal() => info!("Interrupt received"),
        outcome = console::run(&operator, &mut input) => match outcome {
            Ok(ConsoleExit::Exit) => info!("Exit requested from the console"),
            Ok(ConsoleExit::Eof) => shutdown_signal().await,
            Err(e) => {
                error!(error = %e, "Console failed; gateway keeps running");
                shutdown_signal().await;
            }
        },
    }

    info!("Shutting down");
    gateway.close().await;
    if let Err(e) = keys.close().await {
        warn!(error = %e, "Error closing the API key database");
    }
    info!("Closed the API key database connection");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for the interrupt signal");
        std::future::pending::<()>().await;
    }
}

async fn check_status(data_dir: PathBuf, port: Option<u16>, apikey: Option<String>) -> Result<()> {
    let port = match port {
        Some(p) => Port::new(p)?,
        None => ConfigStore::new(data_dir)
            .get(ConfigKey::GatewayPort)
            .await
            .context("no gateway port configured")?,
    };
    report_health(port, apikey.as_deref()).await
}

/// Query `/health` and print the outcome. Anything but a 2xx answer is an
/// error, so the process exit code tells scripts whether the gateway is up.
async fn report_health(port: Port, apikey: Option<&str>) -> Result<()> {
    let mut request = reqwest::Client::new().get(format!("http://127.0.0.1:{port}/health"));
    if let Some(key) = apikey {
        request = request.query(&[("apikey", key)]);
    }

    let resp = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            terminal_output::note_error(&format!("llamagate is not running on port {port}"));
            bail!("no gateway answering on port {port}: {e}");
        }
    };

    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        terminal_output::note_warn(&format!(
            "llamagate is running on port {port} but answered {status}"
        ));
        bail!("health check on port {port} answered {status}");
    }

    terminal_output::note_success(&format!("llamagate is running on port {port}"));
    Ok(())
}
