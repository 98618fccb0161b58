//! Extension metadata and auto-type rules.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One custom-data item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDataItem {
    pub value: String,
    pub last_modification_time: Option<DateTime<Utc>>,
}

/// Key/value extension metadata.  Order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomData {
    items: BTreeMap<String, CustomDataItem>,
}

impl CustomData {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>, now: DateTime<Utc>) {
        self.items.insert(
            key.into(),
            CustomDataItem {
                value: value.into(),
                last_modification_time: Some(now),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&CustomDataItem> {
        self.items.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<CustomDataItem> {
        self.items.remove(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CustomDataItem)> {
        self.items.iter()
    }
}

/// Window-title to key-sequence association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub window: String,
    pub sequence: String,
}

/// Auto-type rules of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoType {
    pub enabled: bool,
    pub default_sequence: Option<String>,
    #[serde(default)]
    pub associations: Vec<Association>,
}

impl Default for AutoType {
    fn default() -> Self {
        Self {
            enabled: true,
            default_sequence: None,
            associations: Vec::new(),
        }
    }
}

impl AutoType {
    /// The sequence for a window title: first association whose pattern is
    /// contained in the title (case-insensitive), else `None`.
    pub fn sequence_for_window(&self, title: &str) -> Option<&str> {
        let title = title.to_lowercase();
        self.associations
            .iter()
            .find(|a| title.contains(&a.window.to_lowercase()))
            .map(|a| a.sequence.as_str())
            .filter(|s| !s.is_empty())
    }
}
