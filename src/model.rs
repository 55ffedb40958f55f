//! Data model for the grouping engine
//! Input records are owned by the upstream provider and read-only here

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single section of an enactment (title + body text)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatuteSection {
    pub title: String,
    pub body: String,
}

/// Input record describing one legal enactment
///
/// Produced by the upstream normalization pipeline. `title`, `jurisdiction`
/// and `instrument_type` must be non-empty; everything else may be empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatuteRecord {
    pub id: String,
    pub title: String,
    pub jurisdiction: String,
    pub instrument_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub preamble: String,
    #[serde(default)]
    pub sections: Vec<StatuteSection>,
    /// Candidate enactment dates from the upstream date-extraction stage,
    /// as ISO dates ("1984-06-01") or bare years ("1984")
    #[serde(default)]
    pub candidate_dates: Vec<String>,
}

/// Partition key: records with different keys are never grouped together
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub jurisdiction: String,
    pub instrument_type: String,
    pub category: Option<String>,
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.category {
            Some(cat) => write!(f, "{}/{}/{}", self.jurisdiction, self.instrument_type, cat),
            None => write!(f, "{}/{}", self.jurisdiction, self.instrument_type),
        }
    }
}

/// Role of a group member relative to the base version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Original,
    Amendment,
    Ordinance,
    Supplement,
    Unknown,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Amendment => write!(f, "amendment"),
            Self::Ordinance => write!(f, "ordinance"),
            Self::Supplement => write!(f, "supplement"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for Relation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(Self::Original),
            "amendment" => Ok(Self::Amendment),
            "ordinance" => Ok(Self::Ordinance),
            "supplement" => Ok(Self::Supplement),
            "unknown" => Ok(Self::Unknown),
            _ => Err(()),
        }
    }
}

/// One versioned member of a statute group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedMember {
    pub record_id: String,
    pub title: String,
    pub extracted_year: Option<i32>,
    pub is_base_version: bool,
    /// Positive, contiguous 1..N within the group
    pub version_number: u32,
    pub relation: Relation,
    /// Clustering strength from the AI path, 1.0 for rule-based matches
    pub similarity: f64,
    /// Classification certainty for `relation`
    pub confidence: f64,
}

/// Aggregate metadata computed over a finished member list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub version_count: u32,
    pub earliest_year: Option<i32>,
    pub latest_year: Option<i32>,
    pub relation_counts: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
}

/// Output document: a version family of related enactments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatuteGroup {
    pub id: String,
    pub base_name: String,
    pub jurisdiction: String,
    pub instrument_type: String,
    pub category: Option<String>,
    /// Identifies the source partition/batch this group was produced from,
    /// prefixed to mark grouped/versioned output (e.g. "grouped:pakistan/act:0")
    pub batch_key: String,
    pub members: Vec<GroupedMember>,
    pub metadata: GroupMetadata,
}

impl StatuteGroup {
    /// Recompute aggregate metadata by scanning the member list
    pub fn compute_metadata(members: &[GroupedMember]) -> GroupMetadata {
        let mut relation_counts: BTreeMap<String, u32> = BTreeMap::new();
        for m in members {
            *relation_counts.entry(m.relation.to_string()).or_insert(0) += 1;
        }

        GroupMetadata {
            version_count: members.len() as u32,
            earliest_year: members.iter().filter_map(|m| m.extracted_year).min(),
            latest_year: members.iter().filter_map(|m| m.extracted_year).max(),
            relation_counts,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_display_roundtrip() {
        for r in [
            Relation::Original,
            Relation::Amendment,
            Relation::Ordinance,
            Relation::Supplement,
            Relation::Unknown,
        ] {
            let parsed: Relation = r.to_string().parse().unwrap();
            assert_eq!(parsed, r);
        }
    }

    #[test]
    fn test_partition_key_display() {
        let key = PartitionKey {
            jurisdiction: "pakistan".into(),
            instrument_type: "act".into(),
            category: None,
        };
        assert_eq!(key.to_string(), "pakistan/act");

        let key = PartitionKey {
            jurisdiction: "pakistan".into(),
            instrument_type: "ordinance".into(),
            category: Some("criminal".into()),
        };
        assert_eq!(key.to_string(), "pakistan/ordinance/criminal");
    }

    #[test]
    fn test_compute_metadata() {
        let members = vec![
            GroupedMember {
                record_id: "r1".into(),
                title: "Companies Act".into(),
                extracted_year: Some(1984),
                is_base_version: true,
                version_number: 1,
                relation: Relation::Original,
                similarity: 1.0,
                confidence: 1.0,
            },
            GroupedMember {
                record_id: "r2".into(),
                title: "Companies Act (Amendment) 2020".into(),
                extracted_year: Some(2020),
                is_base_version: false,
                version_number: 2,
                relation: Relation::Amendment,
                similarity: 1.0,
                confidence: 0.9,
            },
        ];

        let meta = StatuteGroup::compute_metadata(&members);
        assert_eq!(meta.version_count, 2);
        assert_eq!(meta.earliest_year, Some(1984));
        assert_eq!(meta.latest_year, Some(2020));
        assert_eq!(meta.relation_counts.get("original"), Some(&1));
        assert_eq!(meta.relation_counts.get("amendment"), Some(&1));
    }

    #[test]
    fn test_record_deserialize_defaults() {
        let json = r#"{
            "id": "r1",
            "title": "Companies Act 1984",
            "jurisdiction": "Pakistan",
            "instrument_type": "Act"
        }"#;
        let record: StatuteRecord = serde_json::from_str(json).unwrap();
        assert!(record.preamble.is_empty());
        assert!(record.sections.is_empty());
        assert!(record.candidate_dates.is_empty());
        assert!(record.category.is_none());
    }
}
