//! `authvault passwd`: change the master password.
//!
//! Only the data key is re-wrapped; account data is not re-encrypted and
//! an enrolled biometric unlock keeps working.

use crate::cli::output;
use crate::cli::{audit, prompt_new_password, unlock_vault, Cli};
use crate::errors::Result;

/// Environment variable for the new password in scripted use.
const NEW_PASSWORD_ENV: &str = "AUTHVAULT_NEW_PASSWORD";

/// Execute the `passwd` command.
pub fn execute(cli: &Cli) -> Result<()> {
    // 1. Unlock with the current password.
    let vault = unlock_vault(cli)?;

    // 2. Ask for the new one and re-wrap.
    let new_password = prompt_new_password(NEW_PASSWORD_ENV, "Choose new vault password")?;
    vault.change_password(new_password.as_bytes())?;

    audit(cli, "passwd", None, None);
    output::success("Master password changed.");

    Ok(())
}
