//! `authvault init`: create a new vault.

use std::fs;

use crate::cli::output;
use crate::cli::{audit, data_dir, open_vault, prompt_new_password, Cli, PASSWORD_ENV};
use crate::errors::{Result, VaultError};

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let dir = data_dir(cli)?;

    // 1. Create the data directory if it doesn't exist.
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
        output::info(&format!("Created data directory: {}", dir.display()));
    }

    // 2. Refuse to overwrite an existing vault.
    let vault = open_vault(cli)?;
    let state = vault.app_state()?;
    if state.is_initialized {
        output::tip("Use `authvault add` to add accounts to the existing vault.");
        return Err(VaultError::AlreadyInitialized(state.config.vault_path));
    }

    // 3. Prompt for a new password (with confirmation) and create it.
    let password = prompt_new_password(PASSWORD_ENV, "Choose vault password")?;
    vault.initialize(password.as_bytes())?;
    vault.lock()?;

    output::success(&format!(
        "Vault created at {} ({} layout)",
        state.config.vault_path.display(),
        state.config.settings.storage_mode
    ));
    audit(cli, "init", None, Some("vault created"));

    output::tip("Run `authvault add --uri <otpauth://...>` to add an account.");
    output::tip("Run `authvault list` to see all accounts.");

    Ok(())
}
