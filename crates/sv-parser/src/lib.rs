mod attrs;
mod command;
mod tokenize;

pub use command::{parse_command, parse_commands, Command, ParsedCommand, ScopeTarget};
pub use tokenize::{strip_commands, tokenize_commands, CommandKind, TagSpan};
