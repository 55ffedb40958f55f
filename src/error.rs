//! Aggregate error type for the grouping engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("Validation error: {0}")]
    Validation(#[from] crate::validation::ValidationError),
    #[error("Service error: {0}")]
    Service(#[from] crate::grouping::semantic::ServiceError),
}

pub type EngineResult<T> = Result<T, EngineError>;
