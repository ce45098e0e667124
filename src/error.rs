use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while talking to Odoo or handling task files
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status code
    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Server answered the call with a JSON-RPC fault
    #[error("RPC fault ({code}): {message}")]
    Fault { code: i64, message: String },

    /// Response could not be interpreted
    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("authentication failed for user '{user}' on database '{db}'; please check Odoo credentials")]
    AuthenticationFailed { user: String, db: String },

    #[error("unsupported Odoo server {found}: Odoo {minimum}.x or newer is required")]
    UnsupportedVersion { found: String, minimum: u32 },

    #[error("no valid field found for model {0}")]
    NoFields(String),

    #[error("no project found for filter {0}")]
    NoProject(String),

    #[error("invalid update payload: {0}")]
    InvalidPayload(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
