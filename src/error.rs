use thiserror::Error;

use crate::model::EntityKind;

#[derive(Debug, Error)]
pub enum TaskboardError {
    #[error("not a taskboard directory (run `taskboard init` first)")]
    NotInitialized,

    #[error("taskboard already initialized in this directory")]
    AlreadyInitialized,

    #[error("{0} {1} not found")]
    NotFound(EntityKind, String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("{kind} {key} is referenced by {count} task(s)")]
    InUse {
        kind: EntityKind,
        key: String,
        count: usize,
    },

    #[error("{0} with {1} already exists")]
    Conflict(EntityKind, String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("locked by another process: {0}")]
    Locked(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("password hashing failed: {0}")]
    Password(#[from] bcrypt::BcryptError),
}

impl TaskboardError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::AlreadyInitialized => "already_initialized",
            Self::NotFound(_, _) => "not_found",
            Self::ValidationFailed(_) => "validation_failed",
            Self::InUse { .. } => "in_use",
            Self::Conflict(_, _) => "conflict",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Locked(_) => "locked",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Db(_) => "db_error",
            Self::Password(_) => "password_error",
        }
    }

    pub(crate) fn not_found(kind: EntityKind, key: impl ToString) -> Self {
        Self::NotFound(kind, key.to_string())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TaskboardError>;
