//! Rule-based grouping: composite-key equality over (base name,
//! jurisdiction, instrument type). Fully deterministic.

use std::collections::HashMap;

use crate::basename;
use crate::model::{Relation, StatuteRecord};
use crate::partition;

use super::{CandidateGroup, CandidateMember};

/// Classifies a member's relation to its group from the title alone.
/// The AI path supplies its own relation and bypasses this.
pub trait RelationClassifier {
    fn classify(&self, title: &str) -> (Relation, f64);
}

/// Default classifier: case-insensitive keyword match in the title,
/// first match wins in amendment > ordinance > supplement order
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl RelationClassifier for KeywordClassifier {
    fn classify(&self, title: &str) -> (Relation, f64) {
        let lower = title.to_lowercase();
        if lower.contains("amend") {
            (Relation::Amendment, 0.9)
        } else if lower.contains("ordinance") {
            (Relation::Ordinance, 0.9)
        } else if lower.contains("supplement") {
            (Relation::Supplement, 0.9)
        } else {
            (Relation::Unknown, 0.5)
        }
    }
}

/// Group a batch by composite-key equality, preserving first-appearance
/// order of groups and input order within each group.
pub fn rule_based_groups(batch: &[StatuteRecord]) -> Vec<CandidateGroup> {
    group_with_classifier(batch, &KeywordClassifier)
}

pub fn group_with_classifier<C: RelationClassifier>(
    batch: &[StatuteRecord],
    classifier: &C,
) -> Vec<CandidateGroup> {
    let mut index_by_key: HashMap<(String, String, String), usize> = HashMap::new();
    let mut groups: Vec<CandidateGroup> = Vec::new();

    for record in batch {
        let key = (
            basename::extract(&record.title),
            partition::normalize(&record.jurisdiction),
            partition::normalize(&record.instrument_type),
        );

        let (relation, confidence) = classifier.classify(&record.title);
        let member = CandidateMember {
            record: record.clone(),
            relation,
            similarity: 1.0,
            confidence,
        };

        match index_by_key.get(&key) {
            Some(&i) => groups[i].members.push(member),
            None => {
                index_by_key.insert(key, groups.len());
                groups.push(CandidateGroup {
                    members: vec![member],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str) -> StatuteRecord {
        StatuteRecord {
            id: id.into(),
            title: title.into(),
            jurisdiction: "Pakistan".into(),
            instrument_type: "Act".into(),
            category: None,
            preamble: String::new(),
            sections: vec![],
            candidate_dates: vec![],
        }
    }

    #[test]
    fn test_same_base_name_grouped() {
        let batch = vec![
            record("r1", "Companies Act 1984"),
            record("r2", "Companies Act 1984 (Amendment) 2020"),
            record("r3", "Penal Code"),
        ];
        let groups = rule_based_groups(&batch);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[1].members.len(), 1);
    }

    #[test]
    fn test_deterministic_over_repeated_runs() {
        let batch = vec![
            record("r1", "Companies Act 1984"),
            record("r2", "Stamp Act 1899"),
            record("r3", "Companies Act 1984 (Amendment) 2020"),
        ];
        let a = rule_based_groups(&batch);
        let b = rule_based_groups(&batch);
        let ids = |groups: &[CandidateGroup]| -> Vec<Vec<String>> {
            groups
                .iter()
                .map(|g| g.members.iter().map(|m| m.record.id.clone()).collect())
                .collect()
        };
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_keyword_relations() {
        let classifier = KeywordClassifier;
        assert_eq!(
            classifier.classify("Companies (Amendment) Act 2020").0,
            Relation::Amendment
        );
        assert_eq!(
            classifier.classify("Income Tax Ordinance 2001").0,
            Relation::Ordinance
        );
        assert_eq!(
            classifier.classify("Finance Supplement 2019").0,
            Relation::Supplement
        );
        assert_eq!(classifier.classify("Penal Code").0, Relation::Unknown);
    }

    #[test]
    fn test_rule_members_carry_full_similarity() {
        let groups = rule_based_groups(&[record("r1", "Companies Act 1984")]);
        assert_eq!(groups[0].members[0].similarity, 1.0);
    }
}
