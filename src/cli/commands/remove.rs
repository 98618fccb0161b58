//! `authvault remove`: delete an account, entry or group.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{audit, parse_id, unlock_vault, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `remove` command.
pub fn execute(cli: &Cli, id: &str, force: bool) -> Result<()> {
    let id = parse_id(id)?;

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove record {id}? This cannot be undone."))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let vault = unlock_vault(cli)?;
    let removed = vault.remove(id)?;

    audit(cli, "remove", Some(id), Some(&format!("{removed} record(s)")));
    output::success(&format!("Removed {removed} record(s)"));

    Ok(())
}
