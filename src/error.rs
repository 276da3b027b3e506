use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Not in a thoughtboard project. Run 'thoughtboard init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .thoughtboard/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Invalid store path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Transaction at '{path}' gave up after {attempts} conflicting attempts")]
    TransactionAborted { path: String, attempts: u32 },

    #[error("Subscription to '{0}' is closed")]
    SubscriptionClosed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("AI error: {0}")]
    Ai(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Loro error: {0}")]
    Loro(#[from] loro::LoroError),

    #[error("Loro encode error: {0}")]
    LoroEncode(#[from] loro::LoroEncodeError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, BoardError>;
