use thiserror::Error;

pub type Result<T> = std::result::Result<T, PushError>;

/// Push gateway error types
#[derive(Error, Debug)]
pub enum PushError {
    #[error("Push request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Push API error: {0} - {1}")]
    Api(String, String),

    #[error("Failed to parse push response: {0}")]
    ResponseParse(String),
}
