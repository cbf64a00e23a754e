use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainingError {
    #[error("not enough rows to train: need {needed}, got {got}")]
    NotEnoughRows { needed: usize, got: usize },

    #[error("training rows hold a single class; nothing to separate")]
    SingleClass,

    #[error("dimension mismatch: expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("model has not been fitted yet")]
    NotFitted,

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),
}
