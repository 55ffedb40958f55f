//! Per-batch similarity grouping
//! Rule-based (deterministic) or AI-assisted with retry and batch-local
//! fallback: one bad batch never aborts the partition or the run

pub mod rules;
pub mod semantic;

use tracing::warn;

use crate::config::EngineConfig;
use crate::model::{Relation, StatuteRecord};
use crate::retry::RetryPolicy;
use semantic::{SimilarityService, ValidatedResponse};

/// A record annotated with its clustering result, before versioning
#[derive(Debug, Clone)]
pub struct CandidateMember {
    pub record: StatuteRecord,
    pub relation: Relation,
    pub similarity: f64,
    pub confidence: f64,
}

/// One candidate version family within a batch
#[derive(Debug, Clone)]
pub struct CandidateGroup {
    pub members: Vec<CandidateMember>,
}

/// Result of grouping one batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub groups: Vec<CandidateGroup>,
    /// True when the AI path was requested but this batch fell back to rules
    pub used_fallback: bool,
    /// Service attempts made (0 in rule-based mode)
    pub attempts: u32,
}

/// Group one partition's batch. In AI mode the similarity service is called
/// once per batch with bounded retries; a permanently failing or malformed
/// response falls back to rule-based grouping for this batch only.
pub async fn group_batch<S: SimilarityService>(
    batch: &[StatuteRecord],
    config: &EngineConfig,
    policy: &RetryPolicy,
    service: Option<&S>,
) -> BatchOutcome {
    let service = match (config.use_ai, service) {
        (true, Some(s)) => s,
        _ => {
            return BatchOutcome {
                groups: rules::rule_based_groups(batch),
                used_fallback: false,
                attempts: 0,
            }
        }
    };

    let request = semantic::build_request(batch, config);
    let mut attempts = 0;

    loop {
        match service.group_batch(&request).await {
            Ok(raw) => match semantic::validate_response(&raw, batch.len()) {
                Ok(validated) => {
                    return BatchOutcome {
                        groups: apply_response(batch, &validated, config.similarity_threshold),
                        used_fallback: false,
                        attempts: attempts + 1,
                    };
                }
                Err(reason) => {
                    warn!(attempt = attempts, %reason, "malformed similarity response");
                }
            },
            Err(e) => {
                warn!(attempt = attempts, error = %e, "similarity service call failed");
            }
        }

        if !policy.should_retry(attempts) {
            warn!(
                attempts = attempts + 1,
                "similarity service exhausted retries, falling back to rule-based grouping"
            );
            return BatchOutcome {
                groups: rules::rule_based_groups(batch),
                used_fallback: true,
                attempts: attempts + 1,
            };
        }

        tokio::time::sleep(policy.backoff_for(attempts)).await;
        attempts += 1;
    }
}

/// Turn a validated response into candidate groups.
///
/// Members scoring below the similarity threshold are ejected from their
/// proposed cluster into singletons; batch indices the service never
/// mentioned become singletons as well, so every input record appears in
/// exactly one group.
fn apply_response(
    batch: &[StatuteRecord],
    response: &ValidatedResponse,
    threshold: f64,
) -> Vec<CandidateGroup> {
    let mut seen = vec![false; batch.len()];
    let mut groups = Vec::new();
    let mut singletons = Vec::new();

    for cluster in &response.groups {
        let mut members = Vec::new();
        for &idx in cluster {
            seen[idx] = true;
            let similarity = response.similarity.get(&idx).copied().unwrap_or(0.0);
            let (relation, confidence) = response
                .relations
                .get(&idx)
                .copied()
                .unwrap_or((Relation::Unknown, 0.0));
            let member = CandidateMember {
                record: batch[idx].clone(),
                relation,
                similarity,
                confidence,
            };
            if cluster.len() > 1 && similarity < threshold {
                singletons.push(member);
            } else {
                members.push(member);
            }
        }
        if !members.is_empty() {
            groups.push(CandidateGroup { members });
        }
    }

    for (idx, seen) in seen.iter().enumerate() {
        if !seen {
            singletons.push(CandidateMember {
                record: batch[idx].clone(),
                relation: Relation::Unknown,
                similarity: 0.0,
                confidence: 0.0,
            });
        }
    }

    groups.extend(
        singletons
            .into_iter()
            .map(|m| CandidateGroup { members: vec![m] }),
    );
    groups
}
