use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdError {
    #[error("Malformed job id: {0}")]
    Malformed(String),
}
