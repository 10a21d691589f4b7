use replyhound_core::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed AI output: {0}")]
    Malformed(String),

    #[error("AI returned empty output")]
    Empty,

    #[error("AI client is not configured: {0}")]
    Config(String),
}

impl From<AiError> for ModelError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Http(e) if e.is_decode() => ModelError::Malformed(e.to_string()),
            AiError::Http(e) if e.is_builder() => {
                ModelError::InvalidRequest(e.to_string())
            }
            AiError::Http(e) => ModelError::Connection(e.to_string()),
            AiError::Api { status: 429, body } => ModelError::RateLimited(body),
            AiError::Api { status, body } if status >= 500 => ModelError::Upstream {
                status,
                message: body,
            },
            AiError::Api { status, body } => {
                ModelError::InvalidRequest(format!("status {status}: {body}"))
            }
            AiError::Malformed(msg) => ModelError::Malformed(msg),
            AiError::Empty => ModelError::EmptyOutput,
            AiError::Config(msg) => ModelError::InvalidRequest(msg),
        }
    }
}
