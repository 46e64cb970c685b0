//! First-run setup: ask the operator for any port that is not configured yet.

use std::io::Write;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufRead, Lines};
use tracing::{info, warn};

use llamagate_config::{ConfigError, ConfigStore};
use llamagate_core::{ConfigKey, Port};

fn prompt_for(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::GatewayPort => "Enter the port number for the server: ",
        ConfigKey::BackendPort => {
            "Enter the port number for the Ollama server (Port that your Ollama server is running on. \
             By default it is 11434 so if you didnt change anything it should be that.): "
        }
    }
}

/// Return the stored port for `key`, prompting until the operator enters a
/// valid one if the file is missing or unreadable.
///
/// Nothing is defaulted: closing the input before a port is given is an error.
pub async fn ensure_port<R, W>(
    store: &ConfigStore,
    key: ConfigKey,
    input: &mut Lines<R>,
    out: &mut W,
) -> Result<Port>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    match store.get(key).await {
        Ok(port) => return Ok(port),
        Err(e) if e.needs_prompt() => {
            if let ConfigError::Invalid { .. } = e {
                warn!(error = %e, "Ignoring unreadable {key}");
            }
        }
        Err(e) => return Err(e).with_context(|| format!("reading {key}")),
    }

    loop {
        write!(out, "{}", prompt_for(key))?;
        out.flush()?;

        let Some(line) = input.next_line().await.context("reading operator input")? else {
            bail!("input closed before the {key} was configured");
        };

        match store.set_from_str(key, &line).await {
            Ok(port) => {
                info!(%port, "{key} saved to {}", key.file_name());
                writeln!(out, "Port number saved to {}: {port}", key.file_name())?;
                return Ok(port);
            }
            Err(ConfigError::InvalidPort { source, .. }) => {
                writeln!(out, "Invalid port number: {source}")?;
            }
            Err(e) => return Err(e).with_context(|| format!("saving {key}")),
        }
    }
}
