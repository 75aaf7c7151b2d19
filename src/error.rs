use thiserror::Error;

#[derive(Debug, Error)]
pub enum WhitelistError {
    #[error("invalid hardware address: {0}")]
    InvalidAddress(String),

    #[error("invalid network name: {0}")]
    InvalidName(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("invalid regex pattern: {0}")]
    InvalidPattern(String),

    #[error("entry has neither a hardware address nor a network name")]
    EmptyRule,

    #[error("duplicate entry: {0}")]
    Duplicate(String),

    #[error("no matching entry: {0}")]
    NotFound(String),

    #[error("corrupt whitelist document: {0}")]
    CorruptDocument(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] std::io::Error),
}

impl WhitelistError {
    /// Whether the error is a validation failure (rejected input, nothing applied).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WhitelistError::InvalidAddress(_)
                | WhitelistError::InvalidName(_)
                | WhitelistError::InvalidRule(_)
                | WhitelistError::InvalidPattern(_)
                | WhitelistError::EmptyRule
        )
    }
}

pub type Result<T> = std::result::Result<T, WhitelistError>;
