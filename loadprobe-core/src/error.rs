pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`concurrency` must be between 1 and {}", crate::driver::MAX_CONCURRENCY)]
    InvalidConcurrency,

    #[error("`requests` must be a positive integer (or use a duration)")]
    InvalidRequests,

    #[error("endpoint set is empty")]
    EmptyEndpoints,

    #[error("endpoint weights must not all be zero")]
    InvalidWeights,

    #[error("invalid base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("`stages` must be a non-empty list of {{ duration, target }} with a non-zero total duration")]
    InvalidStages,

    #[error("invalid load shape: {0}")]
    InvalidShape(String),
}
