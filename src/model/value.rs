//! Field values and the protected-value invariant.
//!
//! A [`Value`] is one of three variants.  The `Protected` variant wraps a
//! [`ProtectedValue`], which by construction only ever holds ciphertext:
//! the only way to build one is [`ProtectedValue::seal`], and the only way
//! to read it is [`ProtectedValue::reveal`], which hands back a buffer
//! that is wiped when dropped.  Serializing a tree therefore cannot write
//! protected content in clear, and neither can `Debug` output or logs.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::encryption;
use crate::errors::{Result, VaultError};
use crate::encoding::{base64_decode, base64_encode};

/// Sealed secret content: nonce || ciphertext || tag.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedValue {
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    cipher: Vec<u8>,
}

impl ProtectedValue {
    /// Encrypt `plaintext` under the protected-value key.
    pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Self> {
        Ok(Self {
            cipher: encryption::encrypt(key, plaintext)?,
        })
    }

    /// Decrypt on demand.  The returned buffer is zeroed on drop.
    pub fn reveal(&self, key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        encryption::decrypt(key, &self.cipher).map(Zeroizing::new)
    }

    /// Decrypt and interpret the content as UTF-8 text.
    pub fn reveal_str(&self, key: &[u8]) -> Result<Zeroizing<String>> {
        let bytes = self.reveal(key)?;
        match std::str::from_utf8(&bytes) {
            Ok(s) => Ok(Zeroizing::new(s.to_string())),
            Err(_) => Err(VaultError::ValidationError(
                "protected value is not valid UTF-8".into(),
            )),
        }
    }

    /// The ciphertext bytes, safe to hand out (e.g. `Account::secret_cipher`).
    pub fn ciphertext(&self) -> &[u8] {
        &self.cipher
    }

    /// Rebuild from ciphertext produced by `seal` (e.g. when importing the
    /// flat account list).  No decryption happens here.
    pub fn from_ciphertext(cipher: Vec<u8>) -> Self {
        Self { cipher }
    }
}

impl fmt::Debug for ProtectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtectedValue(<{} bytes sealed>)", self.cipher.len())
    }
}

/// A field value in an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    Bytes {
        #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
        data: Vec<u8>,
    },
    Unprotected {
        text: String,
    },
    Protected(ProtectedValue),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Unprotected { text: text.into() }
    }

    pub fn bytes(data: Vec<u8>) -> Self {
        Self::Bytes { data }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Protected(_))
    }

    /// The plain text of an `Unprotected` value; `None` otherwise.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Unprotected { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes { data } => Some(data),
            _ => None,
        }
    }

    pub fn as_protected(&self) -> Option<&ProtectedValue> {
        match self {
            Self::Protected(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x11; 32];

    #[test]
    fn protected_serializes_only_ciphertext() {
        let value = Value::Protected(ProtectedValue::seal(&KEY, b"hunter2").unwrap());
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.contains("\"kind\":\"protected\""));
        assert!(!json.contains("hunter2"));

        let back: Value = serde_json::from_str(&json).unwrap();
        let revealed = back.as_protected().unwrap().reveal(&KEY).unwrap();
        assert_eq!(revealed.as_slice(), b"hunter2");
    }

    #[test]
    fn debug_never_shows_plaintext() {
        let sealed = ProtectedValue::seal(&KEY, b"hunter2").unwrap();
        let shown = format!("{sealed:?}");
        assert!(shown.contains("sealed"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn reveal_with_wrong_key_fails() {
        let sealed = ProtectedValue::seal(&KEY, b"hunter2").unwrap();
        assert!(matches!(
            sealed.reveal(&[0x22; 32]),
            Err(VaultError::DatabaseError(_))
        ));
    }

    #[test]
    fn unprotected_and_bytes_accessors() {
        assert_eq!(Value::text("alice").as_text(), Some("alice"));
        assert_eq!(Value::bytes(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert!(Value::text("x").as_protected().is_none());
    }
}
