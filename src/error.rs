use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotteryError>;

#[derive(Error, Debug)]
pub enum LotteryError {
    #[error("unsupported lottery type: {0} (expected one of ssq, 3d, qlc, kl8)")]
    InvalidLotteryType(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("remote fetch failed: {0}")]
    RemoteFetch(#[from] FetchError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LotteryError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        LotteryError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the errors caused by the caller's input rather than by the system.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            LotteryError::InvalidLotteryType(_) | LotteryError::InvalidParameter { .. }
        )
    }
}

/// Failure modes of the remote draw source. Never surfaced to callers of the
/// read path; the orchestrator records them in the sync log instead.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned state {state}: {message}")]
    Remote { state: i64, message: String },

    #[error("remote returned no draws")]
    Empty,

    #[error("all {0} fetched records were rejected")]
    AllRejected(usize),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
