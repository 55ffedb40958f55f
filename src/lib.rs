//! lexgroup: contextual grouping and versioning for legal enactment records
//!
//! Records are partitioned by jurisdiction and instrument type, clustered
//! into version families (rule-based or via an external similarity service),
//! assigned chronological version numbers, and persisted as idempotent group
//! documents in SQLite.

pub mod basename;
pub mod config;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod model;
pub mod partition;
pub mod progress;
pub mod provider;
pub mod retry;
pub mod store;
pub mod validation;
pub mod versioning;

pub use config::EngineConfig;
pub use engine::{RunOrchestrator, RunSummary};
pub use error::{EngineError, EngineResult};
pub use model::{StatuteGroup, StatuteRecord};
pub use progress::{CancellationToken, ProgressEvent, RunContext, RunStatus};
pub use store::GroupStore;
