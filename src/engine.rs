//! Run orchestration: fetch → partition → batch → group → version → persist
//!
//! Partitions are processed one at a time and batches within a partition one
//! at a time, so the external similarity service is never called
//! concurrently. Cancellation is checked at batch boundaries only.

use tracing::{error, info, warn};

use crate::basename;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::grouping::{self, semantic::SimilarityService};
use crate::model::{PartitionKey, StatuteGroup, StatuteRecord};
use crate::partition;
use crate::progress::{RunContext, RunStatus};
use crate::provider::{RecordFilter, RecordProvider};
use crate::retry::RetryPolicy;
use crate::store::{self, GroupStore};
use crate::validation;
use crate::versioning;

/// Final accounting for one run. Every input record shows up here as
/// processed, skipped, or failed; nothing is silently dropped.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub total_records: usize,
    pub processed_records: usize,
    pub skipped_records: usize,
    pub failed_records: usize,
    pub batches_total: usize,
    pub fallback_batches: usize,
    pub failed_partitions: usize,
    pub groups_created: usize,
}

/// Drives the full pipeline over one input snapshot
pub struct RunOrchestrator<S: SimilarityService> {
    config: EngineConfig,
    policy: RetryPolicy,
    store: GroupStore,
    service: Option<S>,
}

impl<S: SimilarityService> RunOrchestrator<S> {
    /// Validates configuration and initializes the output store.
    /// Invalid configuration is fatal here; a run never begins with it.
    pub fn new(
        config: EngineConfig,
        store: GroupStore,
        service: Option<S>,
    ) -> EngineResult<Self> {
        config.validate()?;
        store.initialize()?;
        let policy = config.retry_policy();
        Ok(Self {
            config,
            policy,
            store,
            service,
        })
    }

    pub fn store(&self) -> &GroupStore {
        &self.store
    }

    /// Run the pipeline once over the provider's current snapshot
    pub async fn run<P: RecordProvider>(
        &mut self,
        provider: &P,
        filter: Option<&RecordFilter>,
        ctx: &RunContext,
    ) -> EngineResult<RunSummary> {
        let mut summary = RunSummary {
            run_id: ctx.run_id.clone(),
            status: RunStatus::Idle,
            total_records: 0,
            processed_records: 0,
            skipped_records: 0,
            failed_records: 0,
            batches_total: 0,
            fallback_batches: 0,
            failed_partitions: 0,
            groups_created: 0,
        };

        ctx.transition(RunStatus::Fetching, "Fetching records", 0.0, 0, 0, 0);
        let records = match provider.fetch(filter) {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "record fetch failed");
                ctx.transition(RunStatus::Failed, format!("Fetch failed: {}", e), 0.0, 0, 0, 0);
                summary.status = RunStatus::Failed;
                return Err(e.into());
            }
        };
        summary.total_records = records.len();

        // Per-record validation failures are isolated: skip, log, continue
        let mut valid = Vec::with_capacity(records.len());
        for record in records {
            match validation::validate_record(&record) {
                Ok(()) => valid.push(record),
                Err(e) => {
                    warn!(error = %e, "skipping invalid record");
                    summary.skipped_records += 1;
                }
            }
        }

        ctx.transition(
            RunStatus::Partitioning,
            "Partitioning by jurisdiction",
            0.0,
            0,
            summary.total_records,
            0,
        );
        let partitions = partition::partition(valid);
        info!(
            partitions = partitions.len(),
            records = summary.total_records - summary.skipped_records,
            "partitioned input"
        );

        for (key, partition_records) in &partitions {
            let aborted = self
                .process_partition(key, partition_records, ctx, &mut summary)
                .await;

            if ctx.is_cancelled() {
                ctx.transition(
                    RunStatus::Cancelled,
                    "Run cancelled",
                    percent(summary.processed_records, summary.total_records),
                    summary.processed_records,
                    summary.total_records,
                    summary.groups_created,
                );
                summary.status = RunStatus::Cancelled;
                return Ok(summary);
            }

            if aborted {
                // Persistence failure: this partition is reported and the
                // run moves on to the next one
                summary.failed_partitions += 1;
            }
        }

        ctx.transition(
            RunStatus::Completed,
            format!("Completed: {} groups", summary.groups_created),
            100.0,
            summary.processed_records,
            summary.total_records,
            summary.groups_created,
        );
        summary.status = RunStatus::Completed;
        Ok(summary)
    }

    /// Returns true when the partition was aborted by a persistence failure
    async fn process_partition(
        &mut self,
        key: &PartitionKey,
        records: &[StatuteRecord],
        ctx: &RunContext,
        summary: &mut RunSummary,
    ) -> bool {
        let batches = partition::batches(records, self.config.batch_size);

        for (batch_idx, batch) in batches.iter().enumerate() {
            // Cancellation is only honored between batches; an in-flight
            // service call always runs to completion
            if ctx.is_cancelled() {
                return false;
            }

            ctx.transition(
                RunStatus::Batching,
                format!("Partition {} batch {}", key, batch_idx + 1),
                percent(summary.processed_records, summary.total_records),
                summary.processed_records,
                summary.total_records,
                summary.groups_created,
            );

            ctx.transition(
                RunStatus::Grouping,
                format!("Grouping {} records", batch.len()),
                percent(summary.processed_records, summary.total_records),
                summary.processed_records,
                summary.total_records,
                summary.groups_created,
            );
            let outcome = grouping::group_batch(
                batch,
                &self.config,
                &self.policy,
                self.service.as_ref(),
            )
            .await;
            summary.batches_total += 1;
            if outcome.used_fallback {
                summary.fallback_batches += 1;
            }

            ctx.transition(
                RunStatus::Versioning,
                "Assigning versions",
                percent(summary.processed_records, summary.total_records),
                summary.processed_records,
                summary.total_records,
                summary.groups_created,
            );
            let batch_key = format!("grouped:{}:{}", key, batch_idx);
            let groups: Vec<StatuteGroup> = outcome
                .groups
                .into_iter()
                .map(|candidate| build_group(key, &batch_key, candidate))
                .collect();

            ctx.transition(
                RunStatus::Persisting,
                format!("Persisting {} groups", groups.len()),
                percent(summary.processed_records, summary.total_records),
                summary.processed_records,
                summary.total_records,
                summary.groups_created,
            );
            if let Err(e) = self.store.replace_groups(&groups) {
                error!(partition = %key, error = %e, "persist failed, aborting partition");
                summary.failed_records += records.len() - (batch_idx * self.config.batch_size);
                return true;
            }

            summary.processed_records += batch.len();
            summary.groups_created += groups.len();
        }

        false
    }
}

fn percent(processed: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        processed as f32 * 100.0 / total as f32
    }
}

/// Assemble the output document for one candidate group
fn build_group(
    key: &PartitionKey,
    batch_key: &str,
    candidate: grouping::CandidateGroup,
) -> StatuteGroup {
    let members = versioning::assign(candidate.members);

    // Base name comes from the group's base version
    let base_name = members
        .first()
        .map(|m| basename::extract(&m.title))
        .unwrap_or_default();

    let member_ids: Vec<&str> = members.iter().map(|m| m.record_id.as_str()).collect();
    let id = store::group_id(batch_key, &base_name, &member_ids);

    StatuteGroup {
        id,
        base_name,
        jurisdiction: key.jurisdiction.clone(),
        instrument_type: key.instrument_type.clone(),
        category: key.category.clone(),
        batch_key: batch_key.to_string(),
        metadata: StatuteGroup::compute_metadata(&members),
        members,
    }
}
