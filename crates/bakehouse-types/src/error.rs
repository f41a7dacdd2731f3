use thiserror::Error;

#[derive(Debug, Error)]
pub enum BakehouseError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: balance {balance} BP, required {required} BP")]
    InsufficientFunds { balance: i64, required: i64 },

    #[error("Rate limited: next bake allowed in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    #[error("Agent not found: {0}")]
    AgentNotFound(uuid::Uuid),

    #[error("Bake not found: {0}")]
    BakeNotFound(uuid::Uuid),

    #[error("Submission not found: {0}")]
    SubmissionNotFound(uuid::Uuid),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transient store error: {0}")]
    TransientStore(String),
}

pub type Result<T> = std::result::Result<T, BakehouseError>;
