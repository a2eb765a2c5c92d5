use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::{path::PathBuf, time::Duration};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The router rejected the configured credentials
    #[error("Authentication to {host} failed")]
    AuthenticationFailed { host: String },

    /// Connection refused, timed out or closed by the router
    #[error("Could not connect to host {host}: {reason}")]
    DeviceUnreachable { host: String, reason: String },

    /// The session was established but the command was rejected or failed
    #[error("Command {command} on {host} failed: {message}")]
    CommandFailed {
        host: String,
        command: String,
        message: String,
    },

    /// The backup guard for a router could not be acquired in time
    #[error("Backup for {host} still in progress after waiting {waited:?}")]
    GuardTimeout { host: String, waited: Duration },

    /// The exported configuration could not be written to disk
    #[error("Failed to write config backup to {}", path.display())]
    BackupWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backup directory holds no backups (or cannot be read)
    #[error("No backup file found in {}", path.display())]
    NoBackupsFound { path: PathBuf },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::AuthenticationFailed { .. } => StatusCode::BAD_REQUEST,
            Error::DeviceUnreachable { .. } => StatusCode::NOT_FOUND,
            Error::CommandFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::GuardTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::BackupWriteFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NoBackupsFound { .. } => StatusCode::NOT_FOUND,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::AuthenticationFailed { .. } => "Username or password not valid".to_string(),
            Error::DeviceUnreachable { host, .. } => format!("Could not connect to host: {host}"),
            Error::CommandFailed { host, command, .. } => format!("Execution of '{command}' on {host} failed."),
            Error::GuardTimeout { host, .. } => format!("A config backup for {host} is already in progress"),
            Error::BackupWriteFailed { .. } => "Failed to write config backup to disk.".to_string(),
            Error::NoBackupsFound { .. } => "No backup file found!".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::BackupWriteFailed { .. } | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::CommandFailed { .. } | Error::GuardTimeout { .. } => {
                tracing::warn!("Router operation error: {}", self);
            }
            Error::AuthenticationFailed { .. } | Error::DeviceUnreachable { .. } => {
                tracing::info!("Router connection error: {}", self);
            }
            Error::BadRequest { .. } | Error::NoBackupsFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
