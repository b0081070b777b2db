use std::fmt::Display;

use sv_core::{ErrorKind, VarError};

fn map_error(kind: ErrorKind, context: &str, error: impl Display) -> VarError {
    VarError::new(kind, format!("{}: {}", context, error))
}

pub(crate) fn emit_error(error: VarError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code());
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).expect("string json")
    );
    1
}

pub(crate) fn map_cli_runtime(error: std::io::Error) -> VarError {
    map_error(ErrorKind::Persistence, "async runtime", error)
}

pub(crate) fn map_cli_config_read(error: std::io::Error) -> VarError {
    map_error(ErrorKind::Config, "config read", error)
}

pub(crate) fn map_cli_config_invalid(error: serde_json::Error) -> VarError {
    map_error(ErrorKind::Config, "config invalid", error)
}

pub(crate) fn map_cli_state_read(error: std::io::Error) -> VarError {
    map_error(ErrorKind::Persistence, "state read", error)
}

pub(crate) fn map_cli_state_write(error: std::io::Error) -> VarError {
    map_error(ErrorKind::Persistence, "state write", error)
}
