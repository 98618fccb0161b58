//! Key hierarchy and HKDF-SHA256 sub-key derivation.
//!
//! Two kinds of key live here:
//!
//! - A **master key** is derived from a credential (the password via
//!   Argon2id, or the biometric unlock secret via HKDF).  It never
//!   encrypts vault data directly; it only proves the credential through
//!   a stored verifier and wraps the data key.
//! - The **data key** is random, created once per vault, and stored only
//!   in wrapped form.  Everything else is derived from it with HKDF:
//!   the payload key, the protected-value key, and the container MAC key.
//!
//! Changing the password re-wraps the same data key, so neither the
//! payload nor any protected value needs to be re-encrypted.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{Result, VaultError};

use super::encryption;

/// Length of every key in the hierarchy (256 bits).
pub const KEY_LEN: usize = 32;

/// Fixed message the verifier MAC is computed over.
const VERIFIER_CONTEXT: &[u8] = b"authvault-verifier-v1";

/// A derived sub-key that wipes itself when dropped.
pub type SubKey = Zeroizing<[u8; KEY_LEN]>;

/// Run HKDF-SHA256 expand with the given `info`.
///
/// The input keying material is already uniformly random (Argon2id output
/// or a random data key), so the extract step runs with an empty salt.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<SubKey> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| VaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

// ---------------------------------------------------------------------------
// MasterKey
// ---------------------------------------------------------------------------

/// A credential-derived key-encryption key, zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl MasterKey {
    pub(crate) fn zeroed() -> Self {
        Self {
            bytes: [0u8; KEY_LEN],
        }
    }

    /// Wrap raw key bytes (e.g. from a test vector).
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Derive the master key for the biometric/PIN slot from the platform
    /// unlock secret.
    pub fn from_unlock_secret(unlock_secret: &[u8]) -> Result<Self> {
        let sub = hkdf_derive(unlock_secret, b"authvault-biometric-slot")?;
        Ok(Self { bytes: *sub })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_LEN] {
        &mut self.bytes
    }

    /// Compute the verifier persisted in the vault header.
    ///
    /// `HMAC-SHA256(HKDF(master, "verifier"), VERIFIER_CONTEXT)`.
    pub fn verifier(&self) -> Result<Vec<u8>> {
        let verifier_key = hkdf_derive(&self.bytes, b"authvault-verifier")?;
        let mut mac = Hmac::<Sha256>::new_from_slice(&verifier_key[..])
            .map_err(|e| VaultError::KeyDerivationFailed(format!("HMAC init failed: {e}")))?;
        mac.update(VERIFIER_CONTEXT);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Check this key against a stored verifier in constant time.
    ///
    /// `on_mismatch` is returned when the verifier does not match, so the
    /// password path reports `InvalidPassword` and the biometric path
    /// `BiometricAuthFailed`.
    pub fn check_verifier(&self, expected: &[u8], on_mismatch: VaultError) -> Result<()> {
        let actual = self.verifier()?;
        if actual.ct_eq(expected).into() {
            Ok(())
        } else {
            Err(on_mismatch)
        }
    }

    /// Encrypt the data key under this master key.
    pub fn wrap_data_key(&self, data_key: &DataKey) -> Result<Vec<u8>> {
        encryption::encrypt(&self.bytes, &data_key.bytes)
    }

    /// Decrypt a wrapped data key.  Fails with `DatabaseError` if the
    /// wrapped blob was tampered with.
    pub fn unwrap_data_key(&self, wrapped: &[u8]) -> Result<DataKey> {
        let mut plain = encryption::decrypt(&self.bytes, wrapped)?;
        if plain.len() != KEY_LEN {
            plain.zeroize();
            return Err(VaultError::DatabaseError(
                "wrapped data key has the wrong length".into(),
            ));
        }
        let mut key = DataKey {
            bytes: [0u8; KEY_LEN],
        };
        key.bytes.copy_from_slice(&plain);
        plain.zeroize();
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// DataKey
// ---------------------------------------------------------------------------

/// The random per-vault key all vault data is protected with.
///
/// Held only inside an unlocked session; zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    bytes: [u8; KEY_LEN],
}

impl DataKey {
    /// Generate a fresh random data key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Key for encrypting the serialized payload.
    pub fn payload_key(&self) -> Result<SubKey> {
        hkdf_derive(&self.bytes, b"authvault-payload")
    }

    /// Key for sealing protected values inside the tree.
    pub fn protected_key(&self) -> Result<SubKey> {
        hkdf_derive(&self.bytes, b"authvault-protected-value")
    }

    /// Key for the container MAC.
    pub fn mac_key(&self) -> Result<SubKey> {
        hkdf_derive(&self.bytes, b"authvault-mac")
    }
}

/// Generate a random 32-byte unlock secret for the biometric/PIN slot.
pub fn generate_unlock_secret() -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(vec![0u8; KEY_LEN]);
    rand::rng().fill_bytes(secret.as_mut_slice());
    secret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_accepts_same_key() {
        let key = MasterKey::from_bytes([3u8; KEY_LEN]);
        let verifier = key.verifier().unwrap();
        assert!(key
            .check_verifier(&verifier, VaultError::InvalidPassword)
            .is_ok());
    }

    #[test]
    fn verifier_rejects_other_key_with_requested_error() {
        let key = MasterKey::from_bytes([3u8; KEY_LEN]);
        let other = MasterKey::from_bytes([4u8; KEY_LEN]);
        let verifier = key.verifier().unwrap();
        let err = other
            .check_verifier(&verifier, VaultError::BiometricAuthFailed)
            .unwrap_err();
        assert!(matches!(err, VaultError::BiometricAuthFailed));
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let master = MasterKey::from_bytes([9u8; KEY_LEN]);
        let data = DataKey::generate();
        let wrapped = master.wrap_data_key(&data).unwrap();
        let unwrapped = master.unwrap_data_key(&wrapped).unwrap();
        assert_eq!(
            *data.payload_key().unwrap(),
            *unwrapped.payload_key().unwrap()
        );
    }

    #[test]
    fn unwrap_with_wrong_key_is_database_error() {
        let master = MasterKey::from_bytes([9u8; KEY_LEN]);
        let other = MasterKey::from_bytes([8u8; KEY_LEN]);
        let wrapped = master.wrap_data_key(&DataKey::generate()).unwrap();
        assert!(matches!(
            other.unwrap_data_key(&wrapped),
            Err(VaultError::DatabaseError(_))
        ));
    }

    #[test]
    fn sub_keys_are_independent() {
        let data = DataKey::generate();
        let payload = data.payload_key().unwrap();
        let protected = data.protected_key().unwrap();
        let mac = data.mac_key().unwrap();
        assert_ne!(*payload, *protected);
        assert_ne!(*payload, *mac);
        assert_ne!(*protected, *mac);
    }

    #[test]
    fn unlock_secret_slot_key_is_deterministic() {
        let secret = [5u8; KEY_LEN];
        let a = MasterKey::from_unlock_secret(&secret).unwrap();
        let b = MasterKey::from_unlock_secret(&secret).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }
}
