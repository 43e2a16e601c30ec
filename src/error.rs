//! Error taxonomy for the control plane core.
//!
//! Mirrors the kind-based taxonomy described by the platform spec: every
//! failure the core can produce classifies into one of a handful of kinds,
//! and nothing is recovered locally — callers (the façade's caller, or the
//! HTTP front-end) decide what to do with it.

use thiserror::Error;

/// Coarse classification of a [`CoreError`], used by transport layers to
/// pick a status code. The core itself never performs that mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Build,
    Loader,
    Storage,
    Cancel,
}

#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("build error: {message}")]
    Build {
        message: String,
        stack: Option<String>,
    },

    #[error("loader error: {0}")]
    Loader(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation cancelled: {0}")]
    Cancel(String),
}

impl CoreError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound(format!("{kind} '{id}' not found"))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CoreError::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn build(message: impl Into<String>, stack: Option<String>) -> Self {
        CoreError::Build {
            message: message.into(),
            stack,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Build { .. } => ErrorKind::Build,
            CoreError::Loader(_) => ErrorKind::Loader,
            CoreError::Storage(_) => ErrorKind::Storage,
            CoreError::Cancel(_) => ErrorKind::Cancel,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Validation(format!("invalid JSON: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification() {
        assert_eq!(CoreError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(CoreError::not_found("tenant", "acme").kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::conflict("dup").kind(), ErrorKind::Conflict);
        assert_eq!(
            CoreError::build("syntax error", None).kind(),
            ErrorKind::Build
        );
    }

    #[test]
    fn not_found_message_includes_kind_and_id() {
        let err = CoreError::not_found("worker", "api");
        assert_eq!(err.to_string(), "not found: worker 'api' not found");
    }
}
