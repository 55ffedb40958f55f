//! AI-assisted grouping: snippet building, the similarity-service wire
//! contract, and strict response validation. Indices are validated for range
//! and uniqueness before anything downstream sees them.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::model::{Relation, StatuteRecord};

/// Fixed instructions sent with every batch
pub const INSTRUCTIONS: &str = "You are given numbered snippets of legal enactments from a single \
jurisdiction and instrument type. Cluster snippets that are versions of the same underlying law \
(an act and its amendments, ordinances, or supplements). Reply with JSON only, in the shape \
{\"groups\": [[index, ...], ...], \"relations\": {\"<index>\": {\"relation\": \
\"original|amendment|ordinance|supplement|unknown\", \"confidence\": 0.0-1.0}}, \
\"similarity\": {\"<index>\": 0.0-1.0}}. Use each index at most once.";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0} from similarity service")]
    Http(u16),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Request body: fixed instructions plus the ordered snippet list
#[derive(Debug, Clone, Serialize)]
pub struct ServiceRequest {
    pub instructions: String,
    pub batch: Vec<String>,
}

/// Relation entry as received on the wire
#[derive(Debug, Clone, Deserialize)]
pub struct RawRelation {
    pub relation: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Response as received, untrusted until validated
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub groups: Vec<Vec<i64>>,
    #[serde(default)]
    pub relations: HashMap<String, RawRelation>,
    #[serde(default)]
    pub similarity: HashMap<String, f64>,
}

/// Why a response was rejected
#[derive(Debug, Clone)]
pub struct InvalidResponse {
    pub reason: String,
}

impl std::fmt::Display for InvalidResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

/// A response whose indices are in range and unique
#[derive(Debug, Clone)]
pub struct ValidatedResponse {
    pub groups: Vec<Vec<usize>>,
    pub relations: HashMap<usize, (Relation, f64)>,
    pub similarity: HashMap<usize, f64>,
}

/// External semantic-grouping service boundary. Implemented over HTTP in
/// production and by fakes in tests.
pub trait SimilarityService {
    fn group_batch(
        &self,
        request: &ServiceRequest,
    ) -> impl std::future::Future<Output = Result<RawResponse, ServiceError>> + Send;
}

/// Truncate to a character budget without splitting a code point
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Bounded context snippet for one record: title, truncated preamble, and
/// the first K section excerpts, capped overall at `max_snippet_chars`
pub fn build_snippet(record: &StatuteRecord, config: &EngineConfig) -> String {
    let mut snippet = String::new();
    snippet.push_str(record.title.trim());

    let preamble = record.preamble.trim();
    if !preamble.is_empty() {
        snippet.push('\n');
        snippet.push_str(truncate_chars(preamble, config.section_snippet_chars));
    }

    for section in record.sections.iter().take(config.max_sections) {
        snippet.push('\n');
        let title = section.title.trim();
        if !title.is_empty() {
            snippet.push_str(title);
            snippet.push_str(": ");
        }
        snippet.push_str(truncate_chars(section.body.trim(), config.section_snippet_chars));
    }

    truncate_chars(&snippet, config.max_snippet_chars).to_string()
}

/// One request per batch: instructions plus ordered snippets
pub fn build_request(batch: &[StatuteRecord], config: &EngineConfig) -> ServiceRequest {
    ServiceRequest {
        instructions: INSTRUCTIONS.to_string(),
        batch: batch.iter().map(|r| build_snippet(r, config)).collect(),
    }
}

/// Validate index bounds and uniqueness. All-or-nothing: any out-of-range or
/// duplicated index rejects the whole response.
pub fn validate_response(
    raw: &RawResponse,
    batch_len: usize,
) -> Result<ValidatedResponse, InvalidResponse> {
    let mut used: HashSet<usize> = HashSet::new();
    let mut groups = Vec::with_capacity(raw.groups.len());

    for cluster in &raw.groups {
        let mut indices = Vec::with_capacity(cluster.len());
        for &raw_idx in cluster {
            if raw_idx < 0 || raw_idx as usize >= batch_len {
                return Err(InvalidResponse {
                    reason: format!("index {} out of range for batch of {}", raw_idx, batch_len),
                });
            }
            let idx = raw_idx as usize;
            if !used.insert(idx) {
                return Err(InvalidResponse {
                    reason: format!("index {} appears in more than one group", idx),
                });
            }
            indices.push(idx);
        }
        if !indices.is_empty() {
            groups.push(indices);
        }
    }

    let mut relations = HashMap::new();
    for (key, raw_rel) in &raw.relations {
        let idx = parse_index(key, batch_len)?;
        let relation = raw_rel.relation.parse().unwrap_or(Relation::Unknown);
        relations.insert(idx, (relation, raw_rel.confidence.clamp(0.0, 1.0)));
    }

    let mut similarity = HashMap::new();
    for (key, score) in &raw.similarity {
        let idx = parse_index(key, batch_len)?;
        similarity.insert(idx, score.clamp(0.0, 1.0));
    }

    Ok(ValidatedResponse {
        groups,
        relations,
        similarity,
    })
}

fn parse_index(key: &str, batch_len: usize) -> Result<usize, InvalidResponse> {
    let idx: usize = key.parse().map_err(|_| InvalidResponse {
        reason: format!("non-numeric index key {:?}", key),
    })?;
    if idx >= batch_len {
        return Err(InvalidResponse {
            reason: format!("index {} out of range for batch of {}", idx, batch_len),
        });
    }
    Ok(idx)
}

/// HTTP client for the semantic-grouping service
pub struct HttpSimilarityService {
    client: Client,
    endpoint: String,
}

impl HttpSimilarityService {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

impl SimilarityService for HttpSimilarityService {
    async fn group_batch(&self, request: &ServiceRequest) -> Result<RawResponse, ServiceError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "similarity service error response");
            return Err(ServiceError::Http(status.as_u16()));
        }

        let raw: RawResponse = resp.json().await?;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatuteSection;

    fn record_with_sections(section_count: usize, body_len: usize) -> StatuteRecord {
        StatuteRecord {
            id: "r1".into(),
            title: "Companies Act 1984".into(),
            jurisdiction: "Pakistan".into(),
            instrument_type: "Act".into(),
            category: None,
            preamble: "An Act to consolidate company law".into(),
            sections: (0..section_count)
                .map(|i| StatuteSection {
                    title: format!("Section {}", i + 1),
                    body: "x".repeat(body_len),
                })
                .collect(),
            candidate_dates: vec![],
        }
    }

    #[test]
    fn test_snippet_respects_section_budget() {
        let config = EngineConfig::default();
        let record = record_with_sections(1, 10_000);
        let snippet = build_snippet(&record, &config);
        // title + preamble + one truncated section
        assert!(snippet.chars().count() < 1000);
        assert!(snippet.starts_with("Companies Act 1984"));
    }

    #[test]
    fn test_snippet_limits_section_count() {
        let config = EngineConfig::default();
        let record = record_with_sections(20, 10);
        let snippet = build_snippet(&record, &config);
        assert_eq!(snippet.matches("Section").count(), config.max_sections);
    }

    #[test]
    fn test_snippet_overall_cap() {
        let config = EngineConfig {
            max_snippet_chars: 50,
            ..Default::default()
        };
        let record = record_with_sections(5, 300);
        let snippet = build_snippet(&record, &config);
        assert!(snippet.chars().count() <= 50);
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        let text = "статут".repeat(100);
        let truncated = truncate_chars(&text, 7);
        assert_eq!(truncated.chars().count(), 7);
    }

    #[test]
    fn test_build_request_one_snippet_per_record() {
        let config = EngineConfig::default();
        let batch = vec![record_with_sections(0, 0), record_with_sections(0, 0)];
        let request = build_request(&batch, &config);
        assert_eq!(request.batch.len(), 2);
        assert_eq!(request.instructions, INSTRUCTIONS);
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let raw = RawResponse {
            groups: vec![vec![0, 2], vec![1]],
            relations: HashMap::from([(
                "2".to_string(),
                RawRelation {
                    relation: "amendment".into(),
                    confidence: 0.8,
                },
            )]),
            similarity: HashMap::from([("0".to_string(), 0.9)]),
        };
        let validated = validate_response(&raw, 3).unwrap();
        assert_eq!(validated.groups, vec![vec![0, 2], vec![1]]);
        assert_eq!(
            validated.relations.get(&2),
            Some(&(Relation::Amendment, 0.8))
        );
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let raw = RawResponse {
            groups: vec![vec![0, 99]],
            relations: HashMap::new(),
            similarity: HashMap::new(),
        };
        let err = validate_response(&raw, 5).unwrap_err();
        assert!(err.reason.contains("99"));
    }

    #[test]
    fn test_validate_rejects_negative_index() {
        let raw = RawResponse {
            groups: vec![vec![-1]],
            relations: HashMap::new(),
            similarity: HashMap::new(),
        };
        assert!(validate_response(&raw, 5).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_index() {
        let raw = RawResponse {
            groups: vec![vec![0, 1], vec![1]],
            relations: HashMap::new(),
            similarity: HashMap::new(),
        };
        let err = validate_response(&raw, 5).unwrap_err();
        assert!(err.reason.contains("more than one group"));
    }

    #[test]
    fn test_validate_clamps_scores() {
        let raw = RawResponse {
            groups: vec![vec![0]],
            relations: HashMap::from([(
                "0".to_string(),
                RawRelation {
                    relation: "amendment".into(),
                    confidence: 3.0,
                },
            )]),
            similarity: HashMap::from([("0".to_string(), -0.5)]),
        };
        let validated = validate_response(&raw, 1).unwrap();
        assert_eq!(validated.relations.get(&0), Some(&(Relation::Amendment, 1.0)));
        assert_eq!(validated.similarity.get(&0), Some(&0.0));
    }

    #[test]
    fn test_validate_unknown_relation_string_tolerated() {
        let raw = RawResponse {
            groups: vec![vec![0]],
            relations: HashMap::from([(
                "0".to_string(),
                RawRelation {
                    relation: "repeal".into(),
                    confidence: 0.7,
                },
            )]),
            similarity: HashMap::new(),
        };
        let validated = validate_response(&raw, 1).unwrap();
        assert_eq!(validated.relations.get(&0), Some(&(Relation::Unknown, 0.7)));
    }

    #[test]
    fn test_raw_response_tolerates_missing_fields() {
        let raw: RawResponse = serde_json::from_str(r#"{"groups": [[0]]}"#).unwrap();
        assert!(raw.relations.is_empty());
        assert!(raw.similarity.is_empty());
    }
}
