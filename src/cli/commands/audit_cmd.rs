//! `authvault audit`: display the audit log.
//!
//! Usage:
//!   authvault audit               # show last 50 entries
//!   authvault audit --last 20     # show last 20
//!   authvault audit --since 7d    # entries from last 7 days

use chrono::{DateTime, Utc};

use crate::cli::output;
use crate::cli::{data_dir, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `audit` command.
#[cfg(feature = "audit-log")]
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    use crate::audit::AuditLog;

    let audit = AuditLog::open(&data_dir(cli)?)
        .ok_or_else(|| VaultError::Audit("failed to open audit database".into()))?;

    let since = since.map(parse_since).transpose()?;
    let entries = audit.query(last, since)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);
    Ok(())
}

#[cfg(not(feature = "audit-log"))]
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let _ = (data_dir(cli), last, since.map(parse_since));
    output::tip("Rebuild with `--features audit-log` to record operations.");
    Err(VaultError::Audit("audit log support not compiled".into()))
}

/// Parse a human-friendly duration like "7d", "24h", "30m" into the
/// instant that long ago.
fn parse_since(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    let invalid = || {
        VaultError::ValidationError(format!(
            "invalid duration '{input}': use a format like 7d, 24h, or 30m"
        ))
    };

    let (split, _) = input.char_indices().last().ok_or_else(invalid)?;
    let (num, unit) = input.split_at(split);
    let num: i64 = num.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "d" => chrono::Duration::days(num),
        "h" => chrono::Duration::hours(num),
        "m" => chrono::Duration::minutes(num),
        _ => return Err(invalid()),
    };

    Ok(Utc::now() - duration)
}

/// Print audit entries in a formatted table.
#[cfg(feature = "audit-log")]
fn print_audit_table(entries: &[crate::audit::AuditEntry]) {
    use comfy_table::{ContentArrangement, Table};
    use console::style;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Operation", "Account", "Details"]);

    for entry in entries {
        table.add_row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            colorize_operation(&entry.operation),
            entry
                .account_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            entry.details.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

/// Colorize operation names for display.
#[cfg(feature = "audit-log")]
fn colorize_operation(op: &str) -> String {
    use console::style;

    match op {
        "init" | "add" | "import" => style(op).green().to_string(),
        "update" | "commit" => style(op).blue().to_string(),
        "remove" => style(op).red().to_string(),
        "passwd" | "biometric-enable" | "biometric-disable" => style(op).yellow().to_string(),
        "export" => style(op).cyan().to_string(),
        _ => op.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_since_units() {
        let days = Utc::now() - parse_since("7d").unwrap();
        assert!((days.num_days() - 7).abs() <= 1);
        let hours = Utc::now() - parse_since("24h").unwrap();
        assert!((hours.num_hours() - 24).abs() <= 1);
        let minutes = Utc::now() - parse_since("30m").unwrap();
        assert!((minutes.num_minutes() - 30).abs() <= 1);
    }

    #[test]
    fn parse_since_invalid() {
        assert!(parse_since("abc").is_err());
        assert!(parse_since("7x").is_err());
        assert!(parse_since("d").is_err());
        assert!(parse_since("").is_err());
    }

    #[cfg(feature = "audit-log")]
    #[test]
    fn colorize_operation_keeps_text() {
        assert!(colorize_operation("add").contains("add"));
        assert_eq!(colorize_operation("unknown"), "unknown");
    }
}
