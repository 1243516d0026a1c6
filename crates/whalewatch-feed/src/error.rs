//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Frame parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
