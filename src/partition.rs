//! Jurisdiction partitioning
//! A pure function of (jurisdiction, type, category); similarity never sees
//! records from two different partitions, which enforces the never-merge
//! invariant structurally

use std::collections::BTreeMap;

use crate::model::{PartitionKey, StatuteRecord};

/// Case-fold and whitespace-collapse a jurisdiction or instrument-type string
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Partition key for a single record
pub fn key_for(record: &StatuteRecord) -> PartitionKey {
    PartitionKey {
        jurisdiction: normalize(&record.jurisdiction),
        instrument_type: normalize(&record.instrument_type),
        category: record
            .category
            .as_deref()
            .map(normalize)
            .filter(|c| !c.is_empty()),
    }
}

/// Split records into partitions. Every input record lands in exactly one
/// partition; iteration order over the map is deterministic.
pub fn partition(records: Vec<StatuteRecord>) -> BTreeMap<PartitionKey, Vec<StatuteRecord>> {
    let mut partitions: BTreeMap<PartitionKey, Vec<StatuteRecord>> = BTreeMap::new();
    for record in records {
        let key = key_for(&record);
        partitions.entry(key).or_default().push(record);
    }
    partitions
}

/// Slice one partition's records into bounded batches, preserving order
pub fn batches(records: &[StatuteRecord], batch_size: usize) -> Vec<&[StatuteRecord]> {
    records.chunks(batch_size.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, jurisdiction: &str, instrument_type: &str) -> StatuteRecord {
        StatuteRecord {
            id: id.into(),
            title: format!("Title {}", id),
            jurisdiction: jurisdiction.into(),
            instrument_type: instrument_type.into(),
            category: None,
            preamble: String::new(),
            sections: vec![],
            candidate_dates: vec![],
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Pakistan  "), "pakistan");
        assert_eq!(normalize("AZAD  KASHMIR"), "azad kashmir");
    }

    #[test]
    fn test_equivalent_jurisdictions_share_partition() {
        let partitions = partition(vec![
            record("r1", "Pakistan", "Act"),
            record("r2", "  pakistan ", "ACT"),
        ]);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions.values().next().unwrap().len(), 2);
    }

    #[test]
    fn test_different_types_split() {
        let partitions = partition(vec![
            record("r1", "Pakistan", "Act"),
            record("r2", "Pakistan", "Ordinance"),
        ]);
        assert_eq!(partitions.len(), 2);
    }

    #[test]
    fn test_every_record_lands_once() {
        let records: Vec<_> = (0..10)
            .map(|i| {
                record(
                    &format!("r{}", i),
                    if i % 2 == 0 { "Pakistan" } else { "India" },
                    "Act",
                )
            })
            .collect();
        let partitions = partition(records);
        let total: usize = partitions.values().map(|v| v.len()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_empty_category_dropped() {
        let mut r = record("r1", "Pakistan", "Act");
        r.category = Some("   ".into());
        assert_eq!(key_for(&r).category, None);
    }

    #[test]
    fn test_batches_bounded() {
        let records: Vec<_> = (0..95)
            .map(|i| record(&format!("r{}", i), "Pakistan", "Act"))
            .collect();
        let chunks = batches(&records, 40);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 40);
        assert_eq!(chunks[2].len(), 15);
    }

    #[test]
    fn test_batches_zero_size_clamped() {
        let records = vec![record("r1", "Pakistan", "Act")];
        assert_eq!(batches(&records, 0).len(), 1);
    }
}
