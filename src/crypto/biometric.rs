//! Platform (biometric/PIN) unlock path.
//!
//! When the platform unlock path is enabled, the vault generates a random
//! 32-byte *unlock secret* and hands it to the platform credential store
//! (OS keyring, secure enclave, ...).  The platform releases the secret
//! only after its own biometric or PIN check and wraps it in a
//! [`BiometricAssertion`] stamped with the time of that check.
//!
//! The vault header keeps a slot for it: a verifier for the slot key
//! `HKDF(unlock_secret, "biometric-slot")` and the data key wrapped under
//! that slot key.  The password is never needed on this path.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use zeroize::Zeroizing;

use crate::errors::{Result, VaultError};

use super::keys::{DataKey, MasterKey};

/// Proof from the platform that the user passed a biometric/PIN check.
pub struct BiometricAssertion {
    unlock_secret: Zeroizing<Vec<u8>>,
    issued_at: DateTime<Utc>,
}

impl BiometricAssertion {
    /// An assertion issued right now.
    pub fn new(unlock_secret: Vec<u8>) -> Self {
        Self::issued_at(unlock_secret, Utc::now())
    }

    /// An assertion issued at a specific time.
    pub fn issued_at(unlock_secret: Vec<u8>, issued_at: DateTime<Utc>) -> Self {
        Self {
            unlock_secret: Zeroizing::new(unlock_secret),
            issued_at,
        }
    }

    pub fn issued(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Fail with `TokenExpired` if the assertion is older than `ttl`.
    pub fn check_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> Result<()> {
        if now - self.issued_at > ttl {
            return Err(VaultError::TokenExpired);
        }
        Ok(())
    }

    fn slot_key(&self) -> Result<MasterKey> {
        MasterKey::from_unlock_secret(&self.unlock_secret)
    }
}

impl fmt::Debug for BiometricAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BiometricAssertion")
            .field("unlock_secret", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Build the slot material for `unlock_secret`: `(verifier, wrapped_data_key)`.
pub fn seal_slot(unlock_secret: &[u8], data_key: &DataKey) -> Result<(Vec<u8>, Vec<u8>)> {
    let slot_key = MasterKey::from_unlock_secret(unlock_secret)?;
    Ok((slot_key.verifier()?, slot_key.wrap_data_key(data_key)?))
}

/// Recover the data key through the biometric slot.
///
/// Checks freshness first (`TokenExpired`), then the slot verifier
/// (`BiometricAuthFailed`), and only then unwraps the data key.
pub fn open_slot(
    verifier: &[u8],
    wrapped_data_key: &[u8],
    assertion: &BiometricAssertion,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<DataKey> {
    assertion.check_fresh(ttl, now)?;
    let slot_key = assertion.slot_key()?;
    slot_key.check_verifier(verifier, VaultError::BiometricAuthFailed)?;
    slot_key.unwrap_data_key(wrapped_data_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_roundtrip_recovers_data_key() {
        let data_key = DataKey::generate();
        let secret = vec![0x42u8; 32];
        let (verifier, wrapped) = seal_slot(&secret, &data_key).unwrap();

        let assertion = BiometricAssertion::new(secret);
        let recovered =
            open_slot(&verifier, &wrapped, &assertion, Duration::seconds(30), Utc::now()).unwrap();
        assert_eq!(
            *recovered.mac_key().unwrap(),
            *data_key.mac_key().unwrap()
        );
    }

    #[test]
    fn wrong_secret_fails_biometric_auth() {
        let data_key = DataKey::generate();
        let (verifier, wrapped) = seal_slot(&[0x42u8; 32], &data_key).unwrap();

        let assertion = BiometricAssertion::new(vec![0x43u8; 32]);
        let err = open_slot(&verifier, &wrapped, &assertion, Duration::seconds(30), Utc::now())
            .err()
            .unwrap();
        assert!(matches!(err, VaultError::BiometricAuthFailed));
    }

    #[test]
    fn stale_assertion_is_expired() {
        let data_key = DataKey::generate();
        let secret = vec![0x42u8; 32];
        let (verifier, wrapped) = seal_slot(&secret, &data_key).unwrap();

        let issued = Utc::now() - Duration::seconds(120);
        let assertion = BiometricAssertion::issued_at(secret, issued);
        let err = open_slot(&verifier, &wrapped, &assertion, Duration::seconds(30), Utc::now())
            .err()
            .unwrap();
        assert!(matches!(err, VaultError::TokenExpired));
    }

    #[test]
    fn debug_redacts_secret() {
        let assertion = BiometricAssertion::new(vec![0x42u8; 32]);
        let shown = format!("{assertion:?}");
        assert!(shown.contains("redacted"));
        assert!(!shown.contains("66, 66"));
    }
}
