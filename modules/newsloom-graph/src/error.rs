use newsloom_common::NewsloomError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Storyline not found: {0}")]
    StorylineNotFound(i64),

    #[error("Alert not found: {0}")]
    AlertNotFound(i64),

    #[error(transparent)]
    Config(#[from] NewsloomError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
