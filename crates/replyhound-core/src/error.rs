use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read businesses file {path}: {source}")]
    BusinessesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse businesses file: {0}")]
    BusinessesFileParse(#[from] serde_yaml::Error),

    #[error("businesses file validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("unknown tone: {0}")]
    UnknownTone(String),

    #[error("unknown feedback kind: {0}")]
    UnknownFeedback(String),

    #[error("unknown status: {0}")]
    UnknownStatus(String),

    #[error("intent score {0} is outside 1..=10")]
    IntentOutOfRange(i64),
}
