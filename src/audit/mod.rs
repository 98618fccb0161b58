//! Audit log: SQLite-based operation history.
//!
//! Records vault operations (init, unlock, add, remove, ...) in a local
//! SQLite database at `<data_dir>/audit.db`.  Never stores secrets or
//! codes, only the operation, the account id and a short detail.
//!
//! Logging is best effort: if the database can't be opened or written
//! to, the operation carries on without a record.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{Result, VaultError};

const DB_FILE: &str = "audit.db";

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub account_id: Option<Uuid>,
    pub details: Option<String>,
}

/// SQLite-backed audit log.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database in `data_dir`.
    ///
    /// Returns `None` if the database can't be opened; callers treat
    /// that as "audit logging unavailable".
    pub fn open(data_dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(data_dir);
        let conn = match Connection::open(&db_path) {
            Ok(conn) => conn,
            Err(e) => {
                debug!(error = %e, "audit log unavailable");
                return None;
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                operation   TEXT NOT NULL,
                account_id  TEXT,
                details     TEXT
            );",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Record an operation.  Errors are ignored.
    pub fn log(&self, operation: &str, account_id: Option<Uuid>, details: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        let account = account_id.map(|id| id.to_string());
        let _ = self.conn.execute(
            "INSERT INTO audit_log (timestamp, operation, account_id, details)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![now, operation, account, details],
        );
    }

    /// Most recent entries first, at most `limit`, optionally only those
    /// at or after `since`.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        // RFC 3339 strings in UTC sort chronologically.
        let since = since
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_default();

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, operation, account_id, details
                 FROM audit_log
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| VaultError::Audit(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![since, limit], |row| {
                let ts: String = row.get(1)?;
                let account: Option<String> = row.get(3)?;
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&ts)
                        .map_or(DateTime::<Utc>::UNIX_EPOCH, |dt| dt.with_timezone(&Utc)),
                    operation: row.get(2)?,
                    account_id: account.and_then(|s| Uuid::parse_str(&s).ok()),
                    details: row.get(4)?,
                })
            })
            .map_err(|e| VaultError::Audit(format!("query exec: {e}")))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| VaultError::Audit(format!("row parse: {e}")))
    }

    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join(DB_FILE)
    }
}

/// Open the log in `data_dir`, record one event, close it.
pub fn record(data_dir: &Path, operation: &str, account_id: Option<Uuid>, details: Option<&str>) {
    if let Some(audit) = AuditLog::open(data_dir) {
        audit.log(operation, account_id, details);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_database() {
        let dir = TempDir::new().unwrap();
        assert!(AuditLog::open(dir.path()).is_some());
        assert!(dir.path().join("audit.db").exists());
    }

    #[test]
    fn log_and_query_most_recent_first() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        let id = Uuid::new_v4();

        audit.log("init", None, Some("vault created"));
        audit.log("add", Some(id), None);
        audit.log("remove", Some(id), Some("1 record"));

        let entries = audit.query(10, None).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].operation, "remove");
        assert_eq!(entries[0].account_id, Some(id));
        assert_eq!(entries[2].details.as_deref(), Some("vault created"));
        assert!(entries[2].account_id.is_none());

        assert_eq!(audit.query(2, None).unwrap().len(), 2);
    }

    #[test]
    fn query_with_since_filter() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        audit.log("unlock", None, None);

        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(audit.query(10, Some(past)).unwrap().len(), 1);
        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(audit.query(10, Some(future)).unwrap().is_empty());
    }

    #[test]
    fn open_returns_none_on_bad_path() {
        assert!(AuditLog::open(Path::new("/nonexistent/authvault/dir")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn audit_db_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let _audit = AuditLog::open(dir.path()).unwrap();
        let perms = std::fs::metadata(dir.path().join("audit.db"))
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
