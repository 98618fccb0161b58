//! `authvault auth biometric`: manage the platform unlock path.
//!
//! Enabling stores a fresh unlock secret in the OS keyring and adds a
//! matching slot to the vault header; later commands unlock through the
//! keyring without a password prompt.  When the keyring feature is not
//! compiled in, the command returns an error.

use crate::cli::Cli;
use crate::errors::Result;

/// Execute `authvault auth biometric [--disable]`.
pub fn execute_biometric(cli: &Cli, disable: bool) -> Result<()> {
    #[cfg(feature = "keyring-store")]
    {
        use crate::cli::{audit, output, unlock_vault};

        let vault = unlock_vault(cli)?;
        let path = vault.app_state()?.config.vault_path;

        if disable {
            vault.disable_biometric()?;
            crate::keyring::delete_unlock_secret(&path)?;
            audit(cli, "biometric-disable", None, None);
            output::success("Keyring unlock disabled.");
        } else {
            let secret = vault.enable_biometric()?;
            if let Err(e) = crate::keyring::store_unlock_secret(&path, &secret) {
                // Without the stored secret the slot is useless.
                vault.disable_biometric()?;
                return Err(e);
            }
            audit(cli, "biometric-enable", None, None);
            output::success("Keyring unlock enabled. Future commands unlock automatically.");
        }

        Ok(())
    }

    #[cfg(not(feature = "keyring-store"))]
    {
        let _ = (cli, disable);
        Err(crate::errors::VaultError::Keyring(
            "keyring support not compiled, rebuild with `cargo build --features keyring-store`"
                .into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn keyring_disabled_returns_error() {
        #[cfg(not(feature = "keyring-store"))]
        {
            use clap::Parser;
            let cli = crate::cli::Cli::parse_from(["authvault", "auth", "biometric"]);
            let msg = super::execute_biometric(&cli, false).unwrap_err().to_string();
            assert!(msg.contains("keyring support not compiled"), "unexpected: {msg}");
        }
    }
}
