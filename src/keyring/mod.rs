//! OS keyring integration for the platform unlock path.
//!
//! Keeps the biometric/PIN unlock secret in the operating system's
//! credential store, where the platform guards it with its own prompt:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring / KDE Wallet)
//!
//! All operations fail gracefully: the error is returned and the caller
//! falls back to the password.

use std::path::Path;

use zeroize::Zeroizing;

use crate::crypto::BiometricAssertion;
use crate::errors::{Result, VaultError};

/// Service name used in the OS keyring.
const SERVICE_NAME: &str = "authvault";

/// Keyring account name for a vault.  Uses the path as given, so callers
/// should pass a canonical path.
fn entry_key(vault_path: &Path) -> String {
    format!("unlock:{}", vault_path.display())
}

fn entry(vault_path: &Path) -> Result<keyring::Entry> {
    keyring::Entry::new(SERVICE_NAME, &entry_key(vault_path))
        .map_err(|e| VaultError::Keyring(format!("failed to create keyring entry: {e}")))
}

/// Store the unlock secret for a vault.
pub fn store_unlock_secret(vault_path: &Path, secret: &[u8]) -> Result<()> {
    entry(vault_path)?
        .set_secret(secret)
        .map_err(|e| VaultError::Keyring(format!("failed to store unlock secret: {e}")))
}

/// Fetch the unlock secret.  `None` if nothing is stored.
pub fn load_unlock_secret(vault_path: &Path) -> Result<Option<Zeroizing<Vec<u8>>>> {
    match entry(vault_path)?.get_secret() {
        Ok(secret) => Ok(Some(Zeroizing::new(secret))),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(VaultError::Keyring(format!(
            "failed to read from keyring: {e}"
        ))),
    }
}

/// Fetch the unlock secret and wrap it in a fresh assertion.
pub fn assertion_for(vault_path: &Path) -> Result<Option<BiometricAssertion>> {
    Ok(load_unlock_secret(vault_path)?.map(|secret| BiometricAssertion::new(secret.to_vec())))
}

/// Remove the stored unlock secret.  Missing entries are not an error.
pub fn delete_unlock_secret(vault_path: &Path) -> Result<()> {
    match entry(vault_path)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(VaultError::Keyring(format!(
            "failed to delete from keyring: {e}"
        ))),
    }
}
