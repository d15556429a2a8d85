use thiserror::Error;

/// Errors surfaced by the compatibility engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Resident not found: {0}")]
    NotFound(u32),

    #[error("Invalid pair: resident {0} cannot be compared with itself")]
    InvalidPair(u32),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Population is empty")]
    EmptyPopulation,

    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    #[error("Training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("Model store error: {0}")]
    Persistence(#[from] StoreError),
}

/// Reasons a training run is aborted before anything is published
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Labels contain a single class ({0}); need both compatible and incompatible examples")]
    SingleClass(u8),
}

/// Errors reading or writing trained artifacts
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
