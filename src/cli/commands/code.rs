//! `authvault code`: show (and optionally copy) an account's current code.

use crate::cli::output;
use crate::cli::{audit, parse_id, unlock_vault, Cli};
use crate::errors::{Result, VaultError};
use crate::model::OtpType;

/// Execute the `code` command.
pub fn execute(cli: &Cli, id: &str, copy: bool) -> Result<()> {
    let id = parse_id(id)?;
    let vault = unlock_vault(cli)?;

    let account = vault.account(id)?;
    let otp = vault.code(id)?;
    output::print_code(&account, &otp);

    if account.otp_type == OtpType::Hotp {
        output::tip("HOTP counters only move on `authvault commit`.");
    }

    if copy {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| VaultError::CommandFailed(format!("clipboard unavailable: {e}")))?;
        clipboard
            .set_text(otp.code.clone())
            .map_err(|e| VaultError::CommandFailed(format!("clipboard write: {e}")))?;
        output::success("Copied to clipboard.");
    }

    audit(cli, "code", Some(id), None);
    Ok(())
}
