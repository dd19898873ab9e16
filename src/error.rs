use thiserror::Error;

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid transition from `{from}` to `{to}`")]
    InvalidTransition { from: String, to: String },
    #[error("no workflow mounted")]
    NoWorkflowMounted,
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for TelemetryError {
    fn from(error: serde_json::Error) -> Self {
        TelemetryError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(error: std::io::Error) -> Self {
        TelemetryError::Storage(error.to_string())
    }
}
