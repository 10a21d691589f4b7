use replyhound_core::{DeliveryError, ModelError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
