use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed hex value {0:?}")]
    MalformedHex(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("schema error: {0}")]
    Schema(String),
}

impl IngestError {
    /// Errors worth retrying: the node or the network may recover on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rpc { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Schema(_))
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<diesel::result::Error> for IngestError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}
