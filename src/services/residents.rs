use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Resident;

/// Errors that can occur when reading resident records
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

/// Anything that can hand over the full set of resident records
pub trait ResidentSource: Send + Sync {
    fn fetch_all(&self) -> Result<Vec<Map<String, Value>>, SourceError>;

    fn describe(&self) -> String;
}

/// Reads a JSON array of resident objects from a file
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResidentSource for JsonFileSource {
    fn fetch_all(&self) -> Result<Vec<Map<String, Value>>, SourceError> {
        let bytes = fs::read(&self.path)?;
        let value: Value = serde_json::from_slice(&bytes)?;
        records_from_value(value)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Fixed set of records held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<Map<String, Value>>,
}

impl StaticSource {
    pub fn new(records: Vec<Map<String, Value>>) -> Self {
        Self { records }
    }
}

impl ResidentSource for StaticSource {
    fn fetch_all(&self) -> Result<Vec<Map<String, Value>>, SourceError> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("static:{} records", self.records.len())
    }
}

/// Accepts either a bare array or an object with a `residents` array
fn records_from_value(value: Value) -> Result<Vec<Map<String, Value>>, SourceError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("residents") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(SourceError::InvalidFormat(
                    "expected an array or an object with a 'residents' array".to_string(),
                ))
            }
        },
        _ => return Err(SourceError::InvalidFormat("expected a JSON array".to_string())),
    };

    let mut records = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => records.push(map),
            other => warn!("Skipping non-object resident entry at {}: {}", position, other),
        }
    }
    Ok(records)
}

/// Parsed residents plus what the raw records looked like
#[derive(Debug, Clone, Default)]
pub struct LoadedResidents {
    pub residents: Vec<Resident>,
    /// Union of field names across records
    pub columns: Vec<String>,
    pub rejected: usize,
}

/// Fetch and parse every record; unrecoverable records are skipped
pub fn load_residents(source: &dyn ResidentSource) -> Result<LoadedResidents, SourceError> {
    let records = source.fetch_all()?;
    let columns: BTreeSet<String> = records.iter().flat_map(|r| r.keys().cloned()).collect();

    let (residents, errors) = Resident::parse_batch(&records);
    debug!(
        source = %source.describe(),
        parsed = residents.len(),
        rejected = errors.len(),
        "Residents loaded"
    );

    Ok(LoadedResidents {
        residents,
        columns: columns.into_iter().collect(),
        rejected: errors.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_json_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data = json!([
            { "id": 1, "name": "Ana", "age": 22, "smoking": "no" },
            { "id": 2, "name": "Luis", "age": 30, "smoking": "yes" },
            "not a record"
        ]);
        file.write_all(data.to_string().as_bytes()).unwrap();

        let source = JsonFileSource::new(file.path());
        let loaded = load_residents(&source).unwrap();
        assert_eq!(loaded.residents.len(), 2);
        assert!(loaded.columns.contains(&"smoking".to_string()));
    }

    #[test]
    fn test_wrapped_array_and_rejected_records() {
        let value = json!({ "residents": [ { "id": 1 }, { "id": -4 } ] });
        let records = records_from_value(value).unwrap();
        let loaded = load_residents(&StaticSource::new(records)).unwrap();

        assert_eq!(loaded.residents.len(), 1);
        assert_eq!(loaded.rejected, 1);
    }

    #[test]
    fn test_invalid_format() {
        assert!(matches!(
            records_from_value(json!(42)),
            Err(SourceError::InvalidFormat(_))
        ));
    }
}
