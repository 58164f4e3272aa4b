//! The project metadata record (`.pbixproj.json`).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use pbix_model::{DocumentSlot, IdentifierMap};

use crate::error::{PersistenceError, Result};
use crate::layout::RECORD_FILE;

/// Record format version written by this crate.
pub const CURRENT_RECORD_VERSION: &str = "1.0";

/// Metadata persisted next to an extracted tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    /// Record format version.
    pub version: String,

    /// When the project was first extracted.
    pub created: String,

    /// When the project was last written.
    pub last_modified: String,

    /// Version marker text of the source package.
    pub package_version: String,

    /// SHA-256 of the package the tree was last extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,

    /// Slots present at the last extraction.
    #[serde(default)]
    pub documents: BTreeSet<DocumentSlot>,

    /// Declared content types that differ from the defaults.
    #[serde(default)]
    pub content_types: BTreeMap<String, String>,

    /// Tree path to original part name, for sanitized names.
    #[serde(default)]
    pub part_names: BTreeMap<String, String>,

    /// Structural key to stable identifier.
    #[serde(default)]
    pub identifiers: IdentifierMap,
}

impl ProjectRecord {
    /// Create a record for a first extraction at `now`.
    pub fn new(package_version: impl Into<String>, now: DateTime<Utc>) -> Self {
        let now = format_timestamp(now);
        Self {
            version: CURRENT_RECORD_VERSION.to_string(),
            created: now.clone(),
            last_modified: now,
            package_version: package_version.into(),
            source_hash: None,
            documents: BTreeSet::new(),
            content_types: BTreeMap::new(),
            part_names: BTreeMap::new(),
            identifiers: IdentifierMap::new(),
        }
    }

    /// Update the last modified timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_modified = format_timestamp(now);
    }

    /// Parse the created timestamp.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created)
    }

    /// Parse the last modified timestamp.
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.last_modified)
    }

    /// Parse record text read from `path`.
    pub fn from_json(text: &str, path: &Path) -> Result<Self> {
        let value = pbix_normalization::parse_json(text).map_err(|e| {
            PersistenceError::InvalidRecord {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        // Check the version before the shape so newer records get a clear error.
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| PersistenceError::InvalidRecord {
                path: path.to_path_buf(),
                reason: "missing 'version'".to_string(),
            })?;
        if major(version) != major(CURRENT_RECORD_VERSION) {
            return Err(PersistenceError::UnsupportedVersion {
                found: version.to_string(),
                supported: CURRENT_RECORD_VERSION,
                path: path.to_path_buf(),
            });
        }

        serde_json::from_value(value).map_err(|e| PersistenceError::InvalidRecord {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Canonical JSON text of the record.
    pub fn to_json(&self) -> Result<String> {
        let value = serde_json::to_value(self).map_err(|e| PersistenceError::Serialization {
            source: Box::new(e),
        })?;
        pbix_normalization::render_json(&value).map_err(|e| PersistenceError::Serialization {
            source: Box::new(e),
        })
    }
}

/// Load the record of the tree at `root`, if there is one.
pub fn load_record(root: &Path) -> Result<Option<ProjectRecord>> {
    let path = root.join(RECORD_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistenceError::io("read", path, e)),
    };
    let record = ProjectRecord::from_json(&text, &path)?;
    tracing::debug!(path = %path.display(), "loaded project record");
    Ok(Some(record))
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version).trim()
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn record_round_trips_through_canonical_json() {
        let mut record = ProjectRecord::new("3.0", at(9));
        record.documents.insert(DocumentSlot::Connections);
        record.identifiers.record("Query: Sales", "q1", "q2");
        record.touch(at(10));

        let text = record.to_json().unwrap();
        assert!(text.starts_with("{\n  \"contentTypes\": {},\n  \"created\": \"2024-05-01T09:00:00Z\""));
        let parsed = ProjectRecord::from_json(&text, Path::new(RECORD_FILE)).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.created_at(), Some(at(9)));
        assert_eq!(parsed.last_modified_at(), Some(at(10)));
    }

    #[test]
    fn newer_major_version_is_rejected() {
        let text = r#"{"version": "2.0", "created": "", "lastModified": "", "packageVersion": "3"}"#;
        let err = ProjectRecord::from_json(text, Path::new(RECORD_FILE)).unwrap_err();
        assert!(matches!(err, PersistenceError::UnsupportedVersion { found, .. } if found == "2.0"));
    }

    #[test]
    fn missing_record_loads_as_none() {
        let dir = tempdir().unwrap();
        assert!(load_record(dir.path()).unwrap().is_none());
    }

    #[test]
    fn garbage_record_is_invalid() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(RECORD_FILE), "not json").unwrap();
        assert!(matches!(
            load_record(dir.path()),
            Err(PersistenceError::InvalidRecord { .. })
        ));
    }
}
