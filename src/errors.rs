//! Unified error type for the moderation core.
//!
//! Errors raised before a transaction commits abort the whole action. The
//! `AssetCleanup` and `Notification` variants only ever describe post-commit
//! failures; they are logged by the service and never returned to callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Cannot {action} an establishment with status {status}")]
    InvalidStateTransition { status: String, action: String },

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Failed to remove asset '{path}': {source}")]
    AssetCleanup {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Notification dispatch failed: {message}")]
    Notification { message: String },
}

impl Error {
    /// Shorthand for an establishment lookup miss.
    pub fn establishment_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "Establishment",
            key: key.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// HTTP status the transport layer should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidStateTransition { .. } | Self::Validation { .. } => 400,
            _ => 500,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::establishment_not_found(42).status_code(), 404);
        assert_eq!(
            Error::InvalidStateTransition {
                status: "PENDING_DELETION".to_string(),
                action: "edit and approve".to_string(),
            }
            .status_code(),
            400
        );
        assert_eq!(Error::validation("descricao", "too long").status_code(), 400);
        assert_eq!(
            Error::Database(sea_orm::DbErr::Custom("boom".to_string())).status_code(),
            500
        );
    }

    #[test]
    fn test_messages_name_the_field() {
        let err = Error::validation("nomeFantasia", "cannot be empty");
        assert_eq!(
            err.to_string(),
            "Invalid value for 'nomeFantasia': cannot be empty"
        );
    }
}
