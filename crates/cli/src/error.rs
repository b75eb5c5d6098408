use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Acquisition(#[from] oxy::Error),

    #[error("command not found: {name}")]
    CommandNotFound { name: String },

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("token file {}: {reason}", .path.display())]
    TokenFile { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Distinct exit codes so wrapping scripts can tell failures apart.
    /// 127 for a missing command follows shell convention.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::CommandNotFound { .. } => 127,
            CliError::Acquisition(_) | CliError::RefreshFailed(_) => 3,
            CliError::TokenFile { .. } => 4,
            CliError::Config(_) | CliError::Io(_) | CliError::Json(_) => 1,
        }
    }
}
