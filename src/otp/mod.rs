//! One-time code generation: HOTP (RFC 4226) and TOTP (RFC 6238).
//!
//! Callers pass the decoded secret bytes; this module never sees
//! ciphertext and never stores anything.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::errors::{Result, VaultError};
use crate::model::account::{OtpAlgorithm, MAX_DIGITS, MIN_DIGITS};

const POWERS_OF_TEN: [u32; 9] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
];

fn hmac_digest(algorithm: OtpAlgorithm, key: &[u8], message: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let init_err = |e: hmac::digest::InvalidLength| {
        VaultError::Unexpected(format!("HMAC init failed: {e}"))
    };
    let digest = match algorithm {
        OtpAlgorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(init_err)?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        OtpAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(init_err)?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        OtpAlgorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(init_err)?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(Zeroizing::new(digest))
}

/// HOTP code for `counter`, zero-padded to `digits`.
pub fn hotp(secret: &[u8], counter: u64, digits: u32, algorithm: OtpAlgorithm) -> Result<String> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        return Err(VaultError::ValidationError(format!(
            "digits must be between {MIN_DIGITS} and {MAX_DIGITS} (got {digits})"
        )));
    }
    if secret.is_empty() {
        return Err(VaultError::ValidationError("secret must not be empty".into()));
    }

    let digest = hmac_digest(algorithm, secret, &counter.to_be_bytes())?;

    // Dynamic truncation: the low nibble of the last byte picks a 4-byte window.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    let code = binary % POWERS_OF_TEN[digits as usize];
    Ok(format!("{code:0width$}", width = digits as usize))
}

/// The TOTP time step for `unix_secs`.
pub fn time_step(unix_secs: u64, period: u32) -> Result<u64> {
    if period == 0 {
        return Err(VaultError::ValidationError(
            "period must be greater than zero".into(),
        ));
    }
    Ok(unix_secs / u64::from(period))
}

/// TOTP code at `unix_secs`.
pub fn totp(
    secret: &[u8],
    unix_secs: u64,
    period: u32,
    digits: u32,
    algorithm: OtpAlgorithm,
) -> Result<String> {
    hotp(secret, time_step(unix_secs, period)?, digits, algorithm)
}

/// Seconds until the current window closes (1..=period).
pub fn seconds_remaining(unix_secs: u64, period: u32) -> u32 {
    if period == 0 {
        return 0;
    }
    let elapsed = (unix_secs % u64::from(period)) as u32;
    period - elapsed
}
