//! Structural key to stable identifier bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What was last seen for one entity, and what it is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierRecord {
    /// Identifier written to the project tree for this entity.
    pub stable_id: String,
    /// Identifier the producer emitted at the most recent extraction.
    pub observed_id: String,
}

/// Identifier map keyed by structural key (for example `Query: Sales`).
///
/// Entries are never removed automatically, so an entity that disappears and
/// comes back keeps its old identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierMap(BTreeMap<String, IdentifierRecord>);

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&IdentifierRecord> {
        self.0.get(key)
    }

    pub fn stable_id(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|record| record.stable_id.as_str())
    }

    /// Pins `key` to `stable_id`, remembering `observed_id` as the latest
    /// producer value.
    pub fn record(
        &mut self,
        key: impl Into<String>,
        stable_id: impl Into<String>,
        observed_id: impl Into<String>,
    ) {
        self.0.insert(
            key.into(),
            IdentifierRecord {
                stable_id: stable_id.into(),
                observed_id: observed_id.into(),
            },
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IdentifierRecord)> {
        self.0.iter().map(|(key, record)| (key.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
