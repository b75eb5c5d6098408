use thiserror::Error;

/// Result type alias for acquisition operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while acquiring a token.
///
/// Every failure inside the flow aborts the whole attempt; no partial
/// token is ever handed back to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("browser session launch failed: {0}")]
    SessionLaunch(String),

    #[error("could not locate {target} with any known strategy within {ms}ms")]
    LocatorNotFound { target: String, ms: u64 },

    #[error("credential input failed: {0}")]
    CredentialInput(String),

    #[error("MFA challenge not completed within {ms}ms")]
    MfaTimeout { ms: u64 },

    #[error("probe navigation failed for {url}: {reason}")]
    ProbeNavigation { url: String, reason: String },

    #[error("no oauth2-proxy token found: {0}")]
    TokenNotFound(String),

    #[error("browser command failed: {0}")]
    Driver(String),

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
