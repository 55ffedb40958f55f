//! Input record validation
//! Records missing required fields are skipped and logged, never grouped

use thiserror::Error;

use crate::model::StatuteRecord;

/// Maximum size for a record title
pub const MAX_TITLE_BYTES: usize = 10_000;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Record {0}: title is empty")]
    EmptyTitle(String),
    #[error("Record {0}: jurisdiction is empty")]
    EmptyJurisdiction(String),
    #[error("Record {0}: instrument type is empty")]
    EmptyInstrumentType(String),
    #[error("Record {0}: title exceeds {1} bytes")]
    TitleTooLarge(String, usize),
    #[error("Record id is empty")]
    EmptyId,
}

/// Validate that a record carries the fields the engine requires.
/// Preamble, sections, and dates may all be empty.
pub fn validate_record(record: &StatuteRecord) -> Result<(), ValidationError> {
    if record.id.trim().is_empty() {
        return Err(ValidationError::EmptyId);
    }
    if record.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle(record.id.clone()));
    }
    if record.title.len() > MAX_TITLE_BYTES {
        return Err(ValidationError::TitleTooLarge(
            record.id.clone(),
            MAX_TITLE_BYTES,
        ));
    }
    if record.jurisdiction.trim().is_empty() {
        return Err(ValidationError::EmptyJurisdiction(record.id.clone()));
    }
    if record.instrument_type.trim().is_empty() {
        return Err(ValidationError::EmptyInstrumentType(record.id.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, jurisdiction: &str, instrument_type: &str) -> StatuteRecord {
        StatuteRecord {
            id: "r1".into(),
            title: title.into(),
            jurisdiction: jurisdiction.into(),
            instrument_type: instrument_type.into(),
            category: None,
            preamble: String::new(),
            sections: vec![],
            candidate_dates: vec![],
        }
    }

    #[test]
    fn test_valid_record() {
        assert!(validate_record(&record("Companies Act", "Pakistan", "Act")).is_ok());
    }

    #[test]
    fn test_empty_title_rejected() {
        assert!(matches!(
            validate_record(&record("   ", "Pakistan", "Act")),
            Err(ValidationError::EmptyTitle(_))
        ));
    }

    #[test]
    fn test_empty_jurisdiction_rejected() {
        assert!(matches!(
            validate_record(&record("Companies Act", "", "Act")),
            Err(ValidationError::EmptyJurisdiction(_))
        ));
    }

    #[test]
    fn test_empty_type_rejected() {
        assert!(matches!(
            validate_record(&record("Companies Act", "Pakistan", "")),
            Err(ValidationError::EmptyInstrumentType(_))
        ));
    }

    #[test]
    fn test_oversized_title_rejected() {
        let big = "x".repeat(MAX_TITLE_BYTES + 1);
        assert!(matches!(
            validate_record(&record(&big, "Pakistan", "Act")),
            Err(ValidationError::TitleTooLarge(..))
        ));
    }
}
