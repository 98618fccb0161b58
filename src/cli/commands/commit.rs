//! `authvault commit`: advance a HOTP counter after its code was used.

use crate::cli::output;
use crate::cli::{audit, parse_id, unlock_vault, Cli};
use crate::errors::Result;

/// Execute the `commit` command.
pub fn execute(cli: &Cli, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let vault = unlock_vault(cli)?;

    let account = vault.commit_hotp(id)?;
    let counter = account.counter.unwrap_or_default();

    audit(cli, "commit", Some(id), Some(&format!("counter {counter}")));
    output::success(&format!("Counter for {} is now {counter}", account.issuer));
    output::print_code(&account, &vault.code(id)?);

    Ok(())
}
