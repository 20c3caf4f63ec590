use thiserror::Error;

#[derive(Error, Debug)]
pub enum SysmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SysmResult<T> = Result<T, SysmError>;

impl From<std::io::Error> for SysmError {
    fn from(err: std::io::Error) -> Self {
        SysmError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SysmError {
    fn from(err: serde_json::Error) -> Self {
        SysmError::Serialization(err.to_string())
    }
}
