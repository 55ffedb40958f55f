//! Run state machine, progress events, and cooperative cancellation
//!
//! The engine only pushes immutable event values into a bounded channel and
//! never depends on a consumer being attached. Whatever transport carries the
//! events to a client lives outside this crate.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Fetching,
    Partitioning,
    Batching,
    Grouping,
    Versioning,
    Persisting,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Partitioning => write!(f, "partitioning"),
            Self::Batching => write!(f, "batching"),
            Self::Grouping => write!(f, "grouping"),
            Self::Versioning => write!(f, "versioning"),
            Self::Persisting => write!(f, "persisting"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "fetching" => Ok(Self::Fetching),
            "partitioning" => Ok(Self::Partitioning),
            "batching" => Ok(Self::Batching),
            "grouping" => Ok(Self::Grouping),
            "versioning" => Ok(Self::Versioning),
            "persisting" => Ok(Self::Persisting),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One progress record, emitted on every state transition
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub run_id: String,
    pub status: RunStatus,
    pub message: String,
    pub progress_percent: f32,
    pub processed_count: usize,
    pub total_count: usize,
    pub groups_created: usize,
}

/// Cancellation token checked at batch boundaries, never mid-batch
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-run context threaded through the pipeline
///
/// Holds the current status behind a lock so callers can query a running
/// pipeline; multiple concurrent runs never share state.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: String,
    status: Arc<RwLock<RunStatus>>,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<ProgressEvent>>,
}

impl RunContext {
    pub fn new(run_id: String, events: Option<mpsc::Sender<ProgressEvent>>) -> Self {
        Self {
            run_id,
            status: Arc::new(RwLock::new(RunStatus::Idle)),
            cancel: CancellationToken::new(),
            events,
        }
    }

    pub fn status(&self) -> RunStatus {
        *self.status.read()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Move to a new state and emit exactly one progress event.
    /// Emission is fire-and-forget: a full or absent channel drops the event.
    pub fn transition(
        &self,
        status: RunStatus,
        message: impl Into<String>,
        progress_percent: f32,
        processed_count: usize,
        total_count: usize,
        groups_created: usize,
    ) {
        *self.status.write() = status;
        if let Some(tx) = &self.events {
            let _ = tx.try_send(ProgressEvent {
                run_id: self.run_id.clone(),
                status,
                message: message.into(),
                progress_percent: progress_percent.clamp(0.0, 100.0),
                processed_count,
                total_count,
                groups_created,
            });
        }
    }
}
