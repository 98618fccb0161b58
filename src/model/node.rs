//! Entries and groups, the two node kinds of the record tree.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::meta::{AutoType, CustomData};
use super::times::Times;
use super::value::Value;

/// Standard field names.
pub mod fields {
    pub const TITLE: &str = "Title";
    pub const USER_NAME: &str = "UserName";
    pub const PASSWORD: &str = "Password";
    pub const URL: &str = "URL";
    pub const NOTES: &str = "Notes";
}

/// A single credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub uuid: Uuid,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub icon_id: Option<u32>,
    pub auto_type: Option<AutoType>,
    pub times: Times,
    #[serde(default)]
    pub custom_data: CustomData,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
    pub override_url: Option<String>,
    /// Prior states, oldest first.  Snapshots carry no history of their own.
    #[serde(default)]
    history: Vec<Entry>,
}

impl Entry {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4(), now)
    }

    pub fn with_id(uuid: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            uuid,
            fields: BTreeMap::new(),
            tags: Vec::new(),
            icon_id: None,
            auto_type: None,
            times: Times::new(now),
            custom_data: CustomData::default(),
            foreground_color: None,
            background_color: None,
            override_url: None,
            history: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Text of an unprotected field, or `""`.
    pub fn text(&self, name: &str) -> &str {
        self.fields
            .get(name)
            .and_then(Value::as_text)
            .unwrap_or_default()
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn history(&self) -> &[Entry] {
        &self.history
    }

    /// Apply a mutating update with copy-on-write history.
    ///
    /// The pre-update state is appended to the history as a snapshot, then
    /// `apply` runs against the live entry and last-modification is bumped.
    /// If `apply` fails, the entry (history included) is left untouched.
    pub fn update<T, E>(
        &mut self,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut Entry) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut next = self.clone();
        next.history.clear();
        let out = apply(&mut next)?;

        let mut snapshot = std::mem::replace(self, next);
        self.uuid = snapshot.uuid;
        self.history = std::mem::take(&mut snapshot.history);
        self.history.push(snapshot);
        self.times.touch_modified(now);
        Ok(out)
    }
}

/// A folder-like container.  Children are referenced by id; the tree owns
/// the nodes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub uuid: Uuid,
    pub name: String,
    pub notes: Option<String>,
    pub icon_id: Option<u32>,
    #[serde(default)]
    pub children: Vec<Uuid>,
    pub times: Times,
    #[serde(default)]
    pub custom_data: CustomData,
    #[serde(default)]
    pub is_expanded: bool,
    pub default_autotype_sequence: Option<String>,
}

impl Group {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            notes: None,
            icon_id: None,
            children: Vec::new(),
            times: Times::new(now),
            custom_data: CustomData::default(),
            is_expanded: true,
            default_autotype_sequence: None,
        }
    }
}

/// A tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Group(Group),
    Entry(Entry),
}

impl Node {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Group(g) => g.uuid,
            Self::Entry(e) => e.uuid,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(g) => Some(g),
            Self::Entry(_) => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Self::Entry(e) => Some(e),
            Self::Group(_) => None,
        }
    }

    pub fn times_mut(&mut self) -> &mut Times {
        match self {
            Self::Group(g) => &mut g.times,
            Self::Entry(e) => &mut e.times,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn titled(title: &str) -> Entry {
        let mut e = Entry::new(Utc::now());
        e.set_field(fields::TITLE, Value::text(title));
        e
    }

    #[test]
    fn update_pushes_prior_state() {
        let mut entry = titled("v1");
        let t0 = Utc::now() + Duration::seconds(1);
        entry
            .update(t0, |e| {
                e.set_field(fields::TITLE, Value::text("v2"));
                Ok::<_, ()>(())
            })
            .unwrap();

        assert_eq!(entry.text(fields::TITLE), "v2");
        assert_eq!(entry.history().len(), 1);
        assert_eq!(entry.history()[0].text(fields::TITLE), "v1");
        assert!(entry.history()[0].history().is_empty());
        assert_eq!(entry.times.last_modified(), t0);
    }

    #[test]
    fn failed_update_leaves_entry_unchanged() {
        let mut entry = titled("v1");
        let before = entry.clone();
        let result = entry.update(Utc::now(), |e| {
            e.set_field(fields::TITLE, Value::text("broken"));
            Err::<(), _>("nope")
        });
        assert!(result.is_err());
        assert_eq!(entry, before);
    }

    #[test]
    fn uuid_is_stable_across_updates() {
        let mut entry = titled("v1");
        let id = entry.uuid;
        entry
            .update(Utc::now(), |e| {
                e.uuid = Uuid::new_v4();
                Ok::<_, ()>(())
            })
            .unwrap();
        assert_eq!(entry.uuid, id);
    }
}
