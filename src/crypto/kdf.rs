//! Password-based key derivation using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  Parameters are configurable via `KdfParams`
//! (loaded from `authvault.toml` or sensible defaults) and are stored in
//! the vault header so unlocking always uses the creation settings.
//!
//! Derivation never decides whether a password is right: it always
//! produces a key, and correctness is checked against the stored
//! verifier (see `keys::check_verifier`).

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultError};

use super::keys::{MasterKey, KEY_LEN};

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Ceilings on the work factors.  Params also arrive from unauthenticated
/// files (container headers, backups), so they bound the cost of a
/// single derivation.
pub const MAX_MEMORY_KIB: u32 = 1_048_576;
pub const MAX_ITERATIONS: u32 = 16;
pub const MAX_PARALLELISM: u32 = 16;

/// Argon2id work factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// The weakest parameters accepted; used by tests to keep runs fast.
    pub fn minimum() -> Self {
        Self {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Reject weak or unbounded settings before any work is done.
    pub fn validate(&self) -> Result<()> {
        self.check_range().map_err(VaultError::KeyDerivationFailed)
    }

    /// Validate params read back from a file.  Out-of-range values mean
    /// the file was tampered with or corrupted.
    pub fn validate_stored(&self) -> Result<()> {
        self.check_range()
            .map_err(|e| VaultError::DatabaseError(format!("stored KDF params: {e}")))
    }

    fn check_range(&self) -> std::result::Result<(), String> {
        if !(MIN_MEMORY_KIB..=MAX_MEMORY_KIB).contains(&self.memory_kib) {
            return Err(format!(
                "Argon2 memory_kib must be within {MIN_MEMORY_KIB}..={MAX_MEMORY_KIB} (got {})",
                self.memory_kib
            ));
        }
        if !(1..=MAX_ITERATIONS).contains(&self.iterations) {
            return Err(format!(
                "Argon2 iterations must be within 1..={MAX_ITERATIONS} (got {})",
                self.iterations
            ));
        }
        if !(1..=MAX_PARALLELISM).contains(&self.parallelism) {
            return Err(format!(
                "Argon2 parallelism must be within 1..={MAX_PARALLELISM} (got {})",
                self.parallelism
            ));
        }
        Ok(())
    }
}

/// Derive a 32-byte master key with explicit Argon2id parameters.
///
/// The same password + salt + params will always produce the same key.
pub fn derive_key(password: &[u8], salt: &[u8], kdf_params: &KdfParams) -> Result<MasterKey> {
    kdf_params.validate()?;

    let params = Params::new(
        kdf_params.memory_kib,
        kdf_params.iterations,
        kdf_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| VaultError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = MasterKey::zeroed();
    argon2
        .hash_password_into(password, salt, key.as_mut_bytes())
        .map_err(|e| VaultError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let salt = [1u8; SALT_LEN];
        let a = derive_key(b"pw", &salt, &KdfParams::minimum()).unwrap();
        let b = derive_key(b"pw", &salt, &KdfParams::minimum()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salt_different_key() {
        let a = derive_key(b"pw", &[1u8; SALT_LEN], &KdfParams::minimum()).unwrap();
        let b = derive_key(b"pw", &[2u8; SALT_LEN], &KdfParams::minimum()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn weak_params_are_rejected() {
        let weak = KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        let err = derive_key(b"pw", &[0u8; SALT_LEN], &weak).unwrap_err();
        assert!(matches!(err, VaultError::KeyDerivationFailed(_)));
    }

    #[test]
    fn unbounded_params_are_rejected() {
        let huge = [
            KdfParams {
                memory_kib: u32::MAX,
                ..KdfParams::minimum()
            },
            KdfParams {
                iterations: u32::MAX,
                ..KdfParams::minimum()
            },
            KdfParams {
                parallelism: MAX_PARALLELISM + 1,
                ..KdfParams::minimum()
            },
        ];
        for params in huge {
            assert!(matches!(
                params.validate(),
                Err(VaultError::KeyDerivationFailed(_))
            ));
            assert!(matches!(
                params.validate_stored(),
                Err(VaultError::DatabaseError(_))
            ));
        }
        assert!(KdfParams::default().validate().is_ok());
        assert!(KdfParams::minimum().validate_stored().is_ok());
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
