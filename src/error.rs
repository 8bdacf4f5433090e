use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum IndexSyncError {
    #[error("Transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    #[error("Timed out during {operation} after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Engine returned {status} during {operation}: {body}")]
    Engine {
        operation: String,
        status: StatusCode,
        body: String,
    },

    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),

    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine integration is not active")]
    Inactive,

    #[error("Invalid query parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, IndexSyncError>;

impl From<std::io::Error> for IndexSyncError {
    fn from(e: std::io::Error) -> Self {
        IndexSyncError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for IndexSyncError {
    fn from(e: serde_json::Error) -> Self {
        IndexSyncError::Json(e.to_string())
    }
}

impl From<reqwest::Error> for IndexSyncError {
    fn from(e: reqwest::Error) -> Self {
        let operation = e
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "request".to_string());
        if e.is_timeout() {
            return IndexSyncError::Timeout {
                operation,
                after_ms: 0,
            };
        }
        if e.is_decode() {
            return IndexSyncError::MalformedResponse(e.to_string());
        }
        match e.status() {
            Some(status) => IndexSyncError::Engine {
                operation,
                status,
                body: e.to_string(),
            },
            None => IndexSyncError::Transport {
                operation,
                message: e.to_string(),
            },
        }
    }
}

impl IndexSyncError {
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        IndexSyncError::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// True when the connection that produced this error should not be reused.
    pub fn is_connection_failure(&self) -> bool {
        match self {
            IndexSyncError::Transport { .. } | IndexSyncError::Timeout { .. } => true,
            IndexSyncError::Engine { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    /// Errors that describe a setup mistake rather than a transient condition.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, IndexSyncError::Config(_))
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            IndexSyncError::Engine { status, .. } => Some(*status),
            IndexSyncError::Timeout { .. } => Some(StatusCode::GATEWAY_TIMEOUT),
            IndexSyncError::Transport { .. } => Some(StatusCode::BAD_GATEWAY),
            _ => None,
        }
    }
}
