//! Operator input: scanner lines and `:`-prefixed console commands.

use shared::domain::Mode;

pub const HELP_TEXT: &str = "\
Scan a barcode to add or remove one unit, depending on the mode.
  :add            switch to ADD mode (reverts to REMOVE after the timeout)
  :remove, :rm    switch to REMOVE mode
  :url <address>  set the backend base URL (blank clears it)
  :list           show the current inventory
  :status         show mode, countdown and backend
  :help           show this text
  :quit, :q       exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Raw scanner payload; trimming and blank handling is the session's job.
    Scan(String),
    SelectMode(Mode),
    SetBackendUrl(String),
    ListInventory,
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_line(line: &str) -> OperatorCommand {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix(':') else {
        return OperatorCommand::Scan(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "add" | "a" => OperatorCommand::SelectMode(Mode::Add),
        "remove" | "rm" | "r" => OperatorCommand::SelectMode(Mode::Remove),
        "url" => OperatorCommand::SetBackendUrl(rest.to_string()),
        "list" | "ls" => OperatorCommand::ListInventory,
        "status" => OperatorCommand::Status,
        "help" | "h" | "?" => OperatorCommand::Help,
        "quit" | "q" | "exit" => OperatorCommand::Quit,
        _ => OperatorCommand::Unknown(trimmed.to_string()),
    }
}
