use thiserror::Error;

pub type Result<T> = std::result::Result<T, InteractionError>;

/// Failures surfaced by the interaction core. Never retried internally.
#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("corrupt event row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for InteractionError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
