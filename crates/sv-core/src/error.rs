use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    PathNotFound,
    MalformedPath,
    MalformedLiteral,
    MalformedCommand,
    UnknownScope,
    ScopeExists,
    CycleLimitExceeded,
    VisibilityEval,
    LockedOperationFailure,
    Persistence,
    Config,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::PathNotFound => "PATH_NOT_FOUND",
            Self::MalformedPath => "MALFORMED_PATH",
            Self::MalformedLiteral => "MALFORMED_LITERAL",
            Self::MalformedCommand => "MALFORMED_COMMAND",
            Self::UnknownScope => "UNKNOWN_SCOPE",
            Self::ScopeExists => "SCOPE_EXISTS",
            Self::CycleLimitExceeded => "CYCLE_LIMIT_EXCEEDED",
            Self::VisibilityEval => "VISIBILITY_EVAL",
            Self::LockedOperationFailure => "LOCKED_OPERATION_FAILURE",
            Self::Persistence => "PERSISTENCE",
            Self::Config => "CONFIG",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{}: {message}", kind.code())]
pub struct VarError {
    pub kind: ErrorKind,
    pub message: String,
}

impl VarError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn path_not_found(path: &str) -> Self {
        Self::new(
            ErrorKind::PathNotFound,
            format!("Path \"{}\" does not exist.", path),
        )
    }

    pub fn unknown_scope(scope: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::UnknownScope,
            format!("Scope \"{}\" is not initialized.", scope),
        )
    }
}
