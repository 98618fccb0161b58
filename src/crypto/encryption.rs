//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext, so a nonce is never reused under the
//! same key.  `decrypt` splits the nonce back out before decrypting.
//!
//! Layout of the returned byte buffer:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` with a 32-byte `key`.
///
/// Returns the nonce prepended to the ciphertext (nonce || ciphertext).
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt data that was produced by `encrypt`.
///
/// Any failure (short input, wrong key, flipped bit) is reported as a
/// `DatabaseError`: the data is treated as tampered or corrupt and no
/// plaintext is returned.
pub fn decrypt(key: &[u8], ciphertext_with_nonce: &[u8]) -> Result<Vec<u8>> {
    if ciphertext_with_nonce.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::DatabaseError(
            "ciphertext too short to be valid".into(),
        ));
    }

    let (nonce_bytes, ciphertext) = ciphertext_with_nonce.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| VaultError::DatabaseError("invalid key length".into()))?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::DatabaseError("authentication tag mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_a_database_error() {
        let err = decrypt(&[0u8; 32], &[0u8; NONCE_LEN + 3]).unwrap_err();
        assert!(matches!(err, VaultError::DatabaseError(_)));
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let key = [7u8; 32];
        let ct = encrypt(&key, b"").unwrap();
        assert_eq!(ct.len(), NONCE_LEN + TAG_LEN);
        assert!(decrypt(&key, &ct).unwrap().is_empty());
    }

    #[test]
    fn rejects_short_key() {
        assert!(encrypt(&[0u8; 16], b"data").is_err());
    }
}
