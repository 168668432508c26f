use thiserror::Error;

pub type Result<T, E = VantageError> = std::result::Result<T, E>;

/// Unified error type covering failure scenarios across the client.
#[derive(Debug, Error)]
pub enum VantageError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("rejected by backend: {0}")]
    Rejected(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("rules error: {0}")]
    Rules(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VantageError {
    /// Transport-level failures the session answers with a resync.
    pub fn is_transport(&self) -> bool {
        matches!(self, VantageError::Network(_) | VantageError::Protocol(_))
    }
}
