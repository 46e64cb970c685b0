//! Console line parsing: one command per line, `command [argument]`.
use llamagate_core::{ConfigKey, Port};

use crate::registry::{self, CommandSpec};
use crate::types::{ConsoleCommand, ParseError};

/// Parse one line of operator input.
///
/// Returns `Ok(None)` for a blank line. The line is split on whitespace into
/// a command word and a single argument; anything after the argument is
/// ignored.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();

    let command = match name {
        "generatekey" => ConsoleCommand::GenerateKey,
        "listkey" => ConsoleCommand::ListKeys,
        "removekey" => ConsoleCommand::RemoveKey(required(name, argument)?.to_string()),
        "addkey" => ConsoleCommand::AddKey(required(name, argument)?.to_string()),
        "changeport" => ConsoleCommand::ChangePort(port_arg(name, argument, ConfigKey::GatewayPort)?),
        "changeollamaport" => {
            ConsoleCommand::ChangeBackendPort(port_arg(name, argument, ConfigKey::BackendPort)?)
        }
        "help" => ConsoleCommand::Help,
        "exit" => ConsoleCommand::Exit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required<'a>(name: &str, argument: Option<&'a str>) -> Result<&'a str, ParseError> {
    argument.ok_or_else(|| {
        let usage = registry::find(name)
            .map(CommandSpec::usage)
            .unwrap_or_else(|| name.to_string());
        ParseError::MissingArgument(usage)
    })
}

fn port_arg(name: &str, argument: Option<&str>, key: ConfigKey) -> Result<Port, ParseError> {
    required(name, argument)?
        .parse::<Port>()
        .map_err(|source| ParseError::InvalidPort { key, source })
}
