//! Integration tests for the AuthVault crypto module.

use authvault::crypto::biometric::{open_slot, seal_slot};
use authvault::crypto::{
    decrypt, derive_key, encrypt, generate_salt, BiometricAssertion, DataKey, KdfParams,
};
use authvault::errors::VaultError;
use chrono::{Duration, Utc};

// ---------------------------------------------------------------------------
// AES-256-GCM
// ---------------------------------------------------------------------------

#[test]
fn encrypt_decrypt_roundtrip() {
    let key = [0x11u8; 32];
    let ct = encrypt(&key, b"JBSWY3DPEHPK3PXP").unwrap();
    assert_eq!(decrypt(&key, &ct).unwrap(), b"JBSWY3DPEHPK3PXP");
}

#[test]
fn nonce_is_fresh_per_call() {
    let key = [0x11u8; 32];
    let a = encrypt(&key, b"same").unwrap();
    let b = encrypt(&key, b"same").unwrap();
    assert_ne!(a, b);
}

#[test]
fn tampered_ciphertext_is_a_database_error() {
    let key = [0x11u8; 32];
    let mut ct = encrypt(&key, b"payload").unwrap();
    let last = ct.len() - 1;
    ct[last] ^= 0x01;
    assert!(matches!(decrypt(&key, &ct), Err(VaultError::DatabaseError(_))));
    assert!(matches!(decrypt(&key, &ct[..5]), Err(VaultError::DatabaseError(_))));
}

// ---------------------------------------------------------------------------
// Argon2id and verifiers
// ---------------------------------------------------------------------------

#[test]
fn derivation_is_deterministic_per_salt() {
    let salt = generate_salt();
    let params = KdfParams::minimum();
    let a = derive_key(b"P1", &salt, &params).unwrap();
    let b = derive_key(b"P1", &salt, &params).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());

    let other = derive_key(b"P1", &generate_salt(), &params).unwrap();
    assert_ne!(a.as_bytes(), other.as_bytes());
}

#[test]
fn verifier_rejects_wrong_password() {
    let salt = generate_salt();
    let params = KdfParams::minimum();
    let right = derive_key(b"P1", &salt, &params).unwrap();
    let verifier = right.verifier().unwrap();

    assert!(right
        .check_verifier(&verifier, VaultError::InvalidPassword)
        .is_ok());
    let wrong = derive_key(b"P2", &salt, &params).unwrap();
    assert!(matches!(
        wrong.check_verifier(&verifier, VaultError::InvalidPassword),
        Err(VaultError::InvalidPassword)
    ));
}

#[test]
fn weak_params_are_rejected() {
    let weak = KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };
    assert!(matches!(
        derive_key(b"P1", &generate_salt(), &weak),
        Err(VaultError::KeyDerivationFailed(_))
    ));
}

#[test]
fn data_key_survives_rewrap() {
    let params = KdfParams::minimum();
    let data_key = DataKey::generate();
    let master = derive_key(b"P1", &generate_salt(), &params).unwrap();
    let wrapped = master.wrap_data_key(&data_key).unwrap();
    let unwrapped = master.unwrap_data_key(&wrapped).unwrap();
    assert_eq!(
        *unwrapped.payload_key().unwrap(),
        *data_key.payload_key().unwrap()
    );
}

// ---------------------------------------------------------------------------
// Biometric slot
// ---------------------------------------------------------------------------

#[test]
fn biometric_slot_checks_freshness_then_secret() {
    let data_key = DataKey::generate();
    let secret = vec![7u8; 32];
    let (verifier, wrapped) = seal_slot(&secret, &data_key).unwrap();
    let ttl = Duration::seconds(30);

    let stale = BiometricAssertion::issued_at(secret.clone(), Utc::now() - Duration::minutes(5));
    assert!(matches!(
        open_slot(&verifier, &wrapped, &stale, ttl, Utc::now()),
        Err(VaultError::TokenExpired)
    ));

    let wrong = BiometricAssertion::new(vec![8u8; 32]);
    assert!(matches!(
        open_slot(&verifier, &wrapped, &wrong, ttl, Utc::now()),
        Err(VaultError::BiometricAuthFailed)
    ));

    let fresh = BiometricAssertion::new(secret);
    assert!(open_slot(&verifier, &wrapped, &fresh, ttl, Utc::now()).is_ok());
}
