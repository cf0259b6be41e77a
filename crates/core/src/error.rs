use thiserror::Error;

use crate::types::UserId;

pub type RecResult<T> = Result<T, RecError>;

#[derive(Error, Debug)]
pub enum RecError {
    #[error("User {user_id} has no ratings")]
    NotFound { user_id: UserId },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
