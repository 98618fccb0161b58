//! `authvault export`: write a password-protected backup.

use std::path::Path;

use crate::cli::output;
use crate::cli::{audit, prompt_new_password, unlock_vault, Cli, BACKUP_PASSWORD_ENV};
use crate::errors::{Result, VaultError};
use crate::vault::format::write_atomic;

/// Execute the `export` command.
pub fn execute(cli: &Cli, file: &str) -> Result<()> {
    let target = Path::new(file);
    if target.exists() {
        return Err(VaultError::InvalidOperation(format!(
            "{} already exists",
            target.display()
        )));
    }

    let vault = unlock_vault(cli)?;
    let password = prompt_new_password(BACKUP_PASSWORD_ENV, "Choose backup password")?;
    let backup = vault.export_backup(password.as_bytes())?;
    let count = vault.info()?.account_count;

    write_atomic(target, &backup)?;

    audit(cli, "export", None, Some(&format!("{count} account(s)")));
    output::success(&format!("Exported {count} account(s) to {}", target.display()));
    output::warning("Keep the backup password: it is not recoverable.");

    Ok(())
}
