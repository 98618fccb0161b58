//! Timestamps attached to groups and entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named timestamp slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeTag {
    Creation,
    LastModification,
    LastAccess,
    Expiry,
    LocationChanged,
}

/// Lifecycle metadata for a node.
///
/// Invariant: last-modification is never earlier than creation.  The
/// expiry timestamp is only meaningful while `expires` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Times {
    pub expires: bool,
    pub usage_count: u64,
    stamps: BTreeMap<TimeTag, DateTime<Utc>>,
}

impl Times {
    /// Fresh times with every bookkeeping stamp set to `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut stamps = BTreeMap::new();
        stamps.insert(TimeTag::Creation, now);
        stamps.insert(TimeTag::LastModification, now);
        stamps.insert(TimeTag::LastAccess, now);
        stamps.insert(TimeTag::LocationChanged, now);
        Self {
            expires: false,
            usage_count: 0,
            stamps,
        }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn get(&self, tag: TimeTag) -> Option<DateTime<Utc>> {
        self.stamps.get(&tag).copied()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.get(TimeTag::Creation).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.get(TimeTag::LastModification)
            .unwrap_or_else(|| self.created())
    }

    /// Record a modification, clamped so it never precedes creation.
    pub fn touch_modified(&mut self, now: DateTime<Utc>) {
        let stamp = now.max(self.created());
        self.stamps.insert(TimeTag::LastModification, stamp);
        self.stamps.insert(TimeTag::LastAccess, stamp);
    }

    /// Record a read access.
    pub fn touch_accessed(&mut self, now: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.stamps.insert(TimeTag::LastAccess, now);
    }

    pub fn touch_location(&mut self, now: DateTime<Utc>) {
        self.stamps.insert(TimeTag::LocationChanged, now);
    }

    /// Set or clear the expiry.
    pub fn set_expiry(&mut self, expiry: Option<DateTime<Utc>>) {
        match expiry {
            Some(at) => {
                self.expires = true;
                self.stamps.insert(TimeTag::Expiry, at);
            }
            None => {
                self.expires = false;
                self.stamps.remove(&TimeTag::Expiry);
            }
        }
    }

    /// The expiry time, if this node expires at all.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        if self.expires {
            self.get(TimeTag::Expiry)
        } else {
            None
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry().is_some_and(|at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn modification_never_precedes_creation() {
        let now = Utc::now();
        let mut times = Times::new(now);
        times.touch_modified(now - Duration::hours(1));
        assert_eq!(times.last_modified(), now);
        times.touch_modified(now + Duration::hours(1));
        assert!(times.last_modified() > times.created());
    }

    #[test]
    fn expiry_ignored_unless_expires_flag() {
        let now = Utc::now();
        let mut times = Times::new(now);
        assert_eq!(times.expiry(), None);
        times.set_expiry(Some(now - Duration::minutes(1)));
        assert!(times.is_expired(now));
        times.expires = false;
        assert!(!times.is_expired(now));
        times.set_expiry(None);
        assert!(times.get(TimeTag::Expiry).is_none());
    }

    #[test]
    fn access_bumps_usage_count() {
        let mut times = Times::now();
        times.touch_accessed(Utc::now());
        times.touch_accessed(Utc::now());
        assert_eq!(times.usage_count, 2);
    }
}
