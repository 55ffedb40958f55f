//! Engine configuration
//! Invalid configuration is fatal at startup; a run never begins with it

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("batch_size must be positive")]
    InvalidBatchSize,
    #[error("max_snippet_chars must be positive")]
    InvalidSnippetBudget,
    #[error("section_snippet_chars must be positive")]
    InvalidSectionBudget,
    #[error("retries must be at least 1")]
    InvalidRetries,
    #[error("backoff_seconds must be positive and finite")]
    InvalidBackoff,
    #[error("similarity_threshold must be within [0, 1]")]
    InvalidThreshold,
    #[error("use_ai requires a service endpoint")]
    MissingEndpoint,
}

/// Recognized engine options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Records per grouping batch (default: 40)
    pub batch_size: usize,
    /// Per-record context budget in characters (default: 5000)
    pub max_snippet_chars: usize,
    /// Sections excerpted per record (default: 5)
    pub max_sections: usize,
    /// Per-section excerpt budget in characters (default: 300)
    pub section_snippet_chars: usize,
    /// Attempts against the similarity service before fallback (default: 3)
    pub retries: u32,
    /// Base backoff between attempts, exponential (default: 1.25)
    pub backoff_seconds: f64,
    /// AI-assisted grouping when true, pure rule-based otherwise
    pub use_ai: bool,
    /// Minimum similarity score for the AI path to accept a pairing;
    /// ignored in rule-based mode
    pub similarity_threshold: f64,
    /// Similarity service endpoint; required when `use_ai` is set
    pub service_endpoint: Option<String>,
    /// Similarity service request timeout in seconds (default: 60)
    pub service_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 40,
            max_snippet_chars: 5000,
            max_sections: 5,
            section_snippet_chars: 300,
            retries: 3,
            backoff_seconds: 1.25,
            use_ai: false,
            similarity_threshold: 0.5,
            service_endpoint: None,
            service_timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Validate at startup. Any failure here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.max_snippet_chars == 0 {
            return Err(ConfigError::InvalidSnippetBudget);
        }
        if self.section_snippet_chars == 0 {
            return Err(ConfigError::InvalidSectionBudget);
        }
        if self.retries == 0 {
            return Err(ConfigError::InvalidRetries);
        }
        if !self.backoff_seconds.is_finite() || self.backoff_seconds <= 0.0 {
            return Err(ConfigError::InvalidBackoff);
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::InvalidThreshold);
        }
        if self.use_ai && self.service_endpoint.is_none() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(())
    }

    /// Retry policy for the external service derived from this config
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_secs_f64(self.backoff_seconds))
    }
}
