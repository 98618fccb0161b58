//! `authvault import`: restore accounts from a backup.
//!
//! Accounts already in the vault (same id) are left alone.

use std::fs;

use crate::cli::output;
use crate::cli::{audit, prompt_password, unlock_vault, Cli, BACKUP_PASSWORD_ENV};
use crate::errors::Result;

/// Execute the `import` command.
pub fn execute(cli: &Cli, file: &str) -> Result<()> {
    let bytes = fs::read(file)?;

    let vault = unlock_vault(cli)?;
    let password = match std::env::var(BACKUP_PASSWORD_ENV) {
        Ok(pw) if !pw.is_empty() => zeroize::Zeroizing::new(pw),
        _ => prompt_password("Enter backup password")?,
    };
    let imported = vault.import_backup(&bytes, password.as_bytes())?;

    audit(cli, "import", None, Some(&format!("{imported} account(s)")));
    if imported == 0 {
        output::info("Nothing new to import.");
    } else {
        output::success(&format!("Imported {imported} account(s) from {file}"));
    }

    Ok(())
}
