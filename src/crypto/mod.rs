//! Cryptographic primitives for the vault (the Cipher Layer).
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Argon2id password-based key derivation (`kdf`)
//! - The master/data key hierarchy, HKDF sub-keys and verifiers (`keys`)
//! - The biometric/PIN unlock slot (`biometric`)

pub mod biometric;
pub mod encryption;
pub mod kdf;
pub mod keys;

pub use biometric::BiometricAssertion;
pub use encryption::{decrypt, encrypt};
pub use kdf::{derive_key, generate_salt, KdfParams};
pub use keys::{DataKey, MasterKey};
