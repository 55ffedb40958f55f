//! Upstream record provider boundary
//! The engine never owns record acquisition; collaborators implement `fetch`

use std::path::Path;
use thiserror::Error;

use crate::model::StatuteRecord;
use crate::partition;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Provider error: {0}")]
    Other(String),
}

/// Optional fetch filter
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub jurisdiction: Option<String>,
    pub instrument_type: Option<String>,
}

impl RecordFilter {
    fn matches(&self, record: &StatuteRecord) -> bool {
        if let Some(jur) = &self.jurisdiction {
            if partition::normalize(&record.jurisdiction) != partition::normalize(jur) {
                return false;
            }
        }
        if let Some(ty) = &self.instrument_type {
            if partition::normalize(&record.instrument_type) != partition::normalize(ty) {
                return false;
            }
        }
        true
    }
}

/// Upstream record source
pub trait RecordProvider {
    fn fetch(&self, filter: Option<&RecordFilter>) -> Result<Vec<StatuteRecord>, ProviderError>;
}

/// Provider over an owned record list, used in tests and embedding callers
pub struct InMemoryProvider {
    records: Vec<StatuteRecord>,
}

impl InMemoryProvider {
    pub fn new(records: Vec<StatuteRecord>) -> Self {
        Self { records }
    }
}

impl RecordProvider for InMemoryProvider {
    fn fetch(&self, filter: Option<&RecordFilter>) -> Result<Vec<StatuteRecord>, ProviderError> {
        Ok(self
            .records
            .iter()
            .filter(|r| filter.map(|f| f.matches(r)).unwrap_or(true))
            .cloned()
            .collect())
    }
}

/// Provider reading a JSON array of records from disk (CLI input format)
pub struct JsonFileProvider {
    path: std::path::PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl RecordProvider for JsonFileProvider {
    fn fetch(&self, filter: Option<&RecordFilter>) -> Result<Vec<StatuteRecord>, ProviderError> {
        let content = std::fs::read_to_string(&self.path)?;
        let records: Vec<StatuteRecord> = serde_json::from_str(&content)?;
        Ok(records
            .into_iter()
            .filter(|r| filter.map(|f| f.matches(r)).unwrap_or(true))
            .collect())
    }
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
    fn test_in_memory_unfiltered() {
        let provider = InMemoryProvider::new(vec![
            record("r1", "Pakistan", "Act"),
            record("r2", "India", "Act"),
        ]);
        assert_eq!(provider.fetch(None).unwrap().len(), 2);
    }

    #[test]
    fn test_filter_by_jurisdiction() {
        let provider = InMemoryProvider::new(vec![
            record("r1", "Pakistan", "Act"),
            record("r2", "India", "Act"),
        ]);
        let filter = RecordFilter {
            jurisdiction: Some("pakistan".into()),
            instrument_type: None,
        };
        let fetched = provider.fetch(Some(&filter)).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, "r1");
    }

    #[test]
    fn test_json_file_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(
            &path,
            r#"[{"id": "r1", "title": "Companies Act 1984",
                "jurisdiction": "Pakistan", "instrument_type": "Act"}]"#,
        )
        .unwrap();

        let provider = JsonFileProvider::new(&path);
        let records = provider.fetch(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Companies Act 1984");
    }

    #[test]
    fn test_json_file_missing() {
        let provider = JsonFileProvider::new(Path::new("/nonexistent/records.json"));
        assert!(matches!(provider.fetch(None), Err(ProviderError::Io(_))));
    }
}
