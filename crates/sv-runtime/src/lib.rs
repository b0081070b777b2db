mod commands;
mod lock;
mod macros;
mod path;
mod registry;
mod store;
mod templates;
mod visibility;

pub use commands::{
    apply_command, apply_commands, reaches_global, CommandOptions, CommandReport, RegisterPolicy,
};
pub use lock::LockManager;
pub use macros::{resolve, resolve_with, MacroOptions, MacroOutcome, DEFAULT_PASS_FLOOR};
pub use path::{read, read_variable_path, write, write_variable_path};
pub use registry::{ScopeRegistry, ScopeState};
pub use store::VariableStore;
pub use templates::{todo_list_template, TemplateSet, TODO_LIST_TEMPLATE};
pub use visibility::is_visible;
