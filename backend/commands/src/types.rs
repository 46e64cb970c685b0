//! Operator console command types.
use thiserror::Error;

use llamagate_core::{ConfigKey, Port, PortError};

/// A validated console command. Arguments are checked while parsing, so
/// executing a command never starts from malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    GenerateKey,
    ListKeys,
    RemoveKey(String),
    AddKey(String),
    ChangePort(Port),
    ChangeBackendPort(Port),
    Help,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: {0}")]
    MissingArgument(String),

    #[error("Invalid {key} number: {source}")]
    InvalidPort {
        key: ConfigKey,
        #[source]
        source: PortError,
    },
}
