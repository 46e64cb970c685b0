pub mod dispatch;
pub mod parse;
pub mod registry;
pub mod types;

pub use dispatch::{CommandResponse, Console, Note};
pub use parse::parse_command;
pub use registry::{COMMANDS, CommandSpec, help_text};
pub use types::{ConsoleCommand, ParseError};
