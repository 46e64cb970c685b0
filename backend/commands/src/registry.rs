//! Console command registry: names, arguments and help text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub argument: Option<&'static str>,
    pub description: &'static str,
}

impl CommandSpec {
    pub fn usage(&self) -> String {
        match self.argument {
            Some(arg) => format!("{} <{}>", self.name, arg),
            None => self.name.to_string(),
        }
    }
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "generatekey",
        argument: None,
        description: "Generate a new random API key.",
    },
    CommandSpec {
        name: "listkey",
        argument: None,
        description: "List all API keys.",
    },
    CommandSpec {
        name: "removekey",
        argument: Some("key"),
        description: "Remove an API key.",
    },
    CommandSpec {
        name: "addkey",
        argument: Some("key"),
        description: "Add a custom API key (generated keys are safer).",
    },
    CommandSpec {
        name: "changeport",
        argument: Some("port"),
        description: "Move the gateway to a new port.",
    },
    CommandSpec {
        name: "changeollamaport",
        argument: Some("port"),
        description: "Change the port of the Ollama server.",
    },
    CommandSpec {
        name: "help",
        argument: None,
        description: "Show available commands.",
    },
    CommandSpec {
        name: "exit",
        argument: None,
        description: "Stop the gateway and exit.",
    },
];

pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

pub fn help_text() -> String {
    let width = COMMANDS.iter().map(|c| c.usage().len()).max().unwrap_or(0);
    let mut out = String::from("Available commands:");
    for cmd in COMMANDS {
        out.push_str(&format!("\n  {:<width$}  {}", cmd.usage(), cmd.description));
    }
    out
}
