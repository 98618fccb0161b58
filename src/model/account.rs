//! OTP accounts: the authenticator view over entries.
//!
//! An [`Account`] is either a projection of an [`Entry`] that carries an
//! `OTP-Secret` field (hierarchical mode), or the record itself (flat
//! mode).  Either way the secret only ever exists here as ciphertext.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::errors::{Result, VaultError};
use crate::otp;
use crate::encoding::{base64_decode, base64_decode_opt, base64_encode, base64_encode_opt};

use super::node::{fields, Entry};
use super::value::{ProtectedValue, Value};

// ---------------------------------------------------------------------------
// Entry field names used by the projection
// ---------------------------------------------------------------------------

pub const FIELD_SECRET: &str = "OTP-Secret";
pub const FIELD_TYPE: &str = "OTP-Type";
pub const FIELD_ALGORITHM: &str = "OTP-Algorithm";
pub const FIELD_DIGITS: &str = "OTP-Digits";
pub const FIELD_PERIOD: &str = "OTP-Period";
pub const FIELD_COUNTER: &str = "OTP-Counter";
pub const FIELD_ICON: &str = "Icon";

pub const DEFAULT_DIGITS: u32 = 6;
pub const DEFAULT_PERIOD: u32 = 30;
pub const MIN_DIGITS: u32 = 6;
pub const MAX_DIGITS: u32 = 8;
pub const MAX_PERIOD: u32 = 300;

// ---------------------------------------------------------------------------
// OTP kind and algorithm
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtpType {
    #[default]
    #[serde(rename = "TOTP")]
    Totp,
    #[serde(rename = "HOTP")]
    Hotp,
}

impl OtpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Totp => "TOTP",
            Self::Hotp => "HOTP",
        }
    }
}

impl fmt::Display for OtpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpType {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TOTP" => Ok(Self::Totp),
            "HOTP" => Ok(Self::Hotp),
            other => Err(VaultError::ValidationError(format!(
                "unsupported OTP type '{other}' (expected TOTP or HOTP)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtpAlgorithm {
    #[default]
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "SHA512")]
    Sha512,
}

impl OtpAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for OtpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpAlgorithm {
    type Err = VaultError;

    /// Case-insensitive; `SHA-256` and `sha256` are both accepted.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(VaultError::ValidationError(format!(
                "unsupported algorithm '{s}' (expected SHA1, SHA256 or SHA512)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Decode a base32 secret.  Whitespace and `=` padding are ignored and
/// the alphabet is case-insensitive.
pub fn decode_secret(secret: &str) -> Result<Zeroizing<Vec<u8>>> {
    let normalized: Zeroizing<String> = Zeroizing::new(
        secret
            .chars()
            .filter(|c| !c.is_ascii_whitespace() && *c != '=' && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect(),
    );
    let decoded = BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|_| VaultError::ValidationError("secret is not valid base32".into()))?;
    let decoded = Zeroizing::new(decoded);
    if decoded.is_empty() {
        return Err(VaultError::ValidationError("secret must not be empty".into()));
    }
    Ok(decoded)
}

/// Encode raw secret bytes as unpadded base32.
pub fn encode_secret(secret: &[u8]) -> Zeroizing<String> {
    Zeroizing::new(BASE32_NOPAD.encode(secret))
}

fn required(name: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(VaultError::ValidationError(format!("{name} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn check_digits(digits: u32) -> Result<u32> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        return Err(VaultError::ValidationError(format!(
            "digits must be between {MIN_DIGITS} and {MAX_DIGITS} (got {digits})"
        )));
    }
    Ok(digits)
}

fn check_period(period: u32) -> Result<u32> {
    if !(1..=MAX_PERIOD).contains(&period) {
        return Err(VaultError::ValidationError(format!(
            "period must be between 1 and {MAX_PERIOD} seconds (got {period})"
        )));
    }
    Ok(period)
}

fn default_digits() -> u32 {
    DEFAULT_DIGITS
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub issuer: String,
    pub label: String,
    #[serde(rename = "type")]
    pub otp_type: OtpType,
    pub algorithm: OtpAlgorithm,
    pub digits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub secret_cipher: Vec<u8>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "base64_encode_opt",
        deserialize_with = "base64_decode_opt"
    )]
    pub icon: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn secret(&self) -> ProtectedValue {
        ProtectedValue::from_ciphertext(self.secret_cipher.clone())
    }

    /// Code for this account at `unix_secs`.  The secret is decrypted
    /// into a wiped buffer for the duration of the call only.
    pub fn code_at(&self, protected_key: &[u8], unix_secs: u64) -> Result<String> {
        let secret = self.secret().reveal(protected_key)?;
        match self.otp_type {
            OtpType::Totp => otp::totp(
                &secret,
                unix_secs,
                self.period.unwrap_or(DEFAULT_PERIOD),
                self.digits,
                self.algorithm,
            ),
            OtpType::Hotp => otp::hotp(
                &secret,
                self.counter.unwrap_or(0),
                self.digits,
                self.algorithm,
            ),
        }
    }

    /// Seconds left in the current TOTP window; `None` for HOTP.
    pub fn remaining_at(&self, unix_secs: u64) -> Option<u32> {
        match self.otp_type {
            OtpType::Totp => Some(otp::seconds_remaining(
                unix_secs,
                self.period.unwrap_or(DEFAULT_PERIOD),
            )),
            OtpType::Hotp => None,
        }
    }

    /// True if `entry` is an OTP entry rather than a plain password entry.
    pub fn is_otp_entry(entry: &Entry) -> bool {
        entry
            .field(FIELD_SECRET)
            .map(Value::is_protected)
            .unwrap_or(false)
    }

    /// Project an entry.  `Ok(None)` for entries without an OTP secret;
    /// `DatabaseError` if the OTP fields are present but malformed.
    pub fn from_entry(entry: &Entry, group_id: Option<Uuid>) -> Result<Option<Self>> {
        let secret = match entry.field(FIELD_SECRET).and_then(Value::as_protected) {
            Some(s) => s,
            None => return Ok(None),
        };
        let corrupt = |what: &str| {
            VaultError::DatabaseError(format!("entry {} has a malformed {what}", entry.uuid))
        };

        let otp_type: OtpType = entry
            .text(FIELD_TYPE)
            .parse()
            .map_err(|_| corrupt(FIELD_TYPE))?;
        let algorithm: OtpAlgorithm = entry
            .text(FIELD_ALGORITHM)
            .parse()
            .map_err(|_| corrupt(FIELD_ALGORITHM))?;
        let digits: u32 = entry
            .text(FIELD_DIGITS)
            .parse()
            .map_err(|_| corrupt(FIELD_DIGITS))?;
        let (period, counter) = match otp_type {
            OtpType::Totp => {
                let period = entry
                    .text(FIELD_PERIOD)
                    .parse()
                    .map_err(|_| corrupt(FIELD_PERIOD))?;
                (Some(period), None)
            }
            OtpType::Hotp => {
                let counter = entry
                    .text(FIELD_COUNTER)
                    .parse()
                    .map_err(|_| corrupt(FIELD_COUNTER))?;
                (None, Some(counter))
            }
        };
        let note = Some(entry.text(fields::NOTES))
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(Some(Self {
            id: entry.uuid,
            issuer: entry.text(fields::TITLE).to_string(),
            label: entry.text(fields::USER_NAME).to_string(),
            otp_type,
            algorithm,
            digits,
            period,
            counter,
            secret_cipher: secret.ciphertext().to_vec(),
            icon: entry
                .field(FIELD_ICON)
                .and_then(Value::as_bytes)
                .map(<[u8]>::to_vec),
            note,
            group_id,
            created_at: entry.times.created(),
            updated_at: entry.times.last_modified(),
        }))
    }

    /// Write the account's fields onto `entry`, replacing its OTP fields.
    pub fn write_to(&self, entry: &mut Entry) {
        entry.set_field(fields::TITLE, Value::text(&self.issuer));
        entry.set_field(fields::USER_NAME, Value::text(&self.label));
        entry.set_field(FIELD_SECRET, Value::Protected(self.secret()));
        entry.set_field(FIELD_TYPE, Value::text(self.otp_type.as_str()));
        entry.set_field(FIELD_ALGORITHM, Value::text(self.algorithm.as_str()));
        entry.set_field(FIELD_DIGITS, Value::text(self.digits.to_string()));

        entry.fields.remove(FIELD_PERIOD);
        entry.fields.remove(FIELD_COUNTER);
        if let Some(period) = self.period {
            entry.set_field(FIELD_PERIOD, Value::text(period.to_string()));
        }
        if let Some(counter) = self.counter {
            entry.set_field(FIELD_COUNTER, Value::text(counter.to_string()));
        }

        match &self.note {
            Some(note) => entry.set_field(fields::NOTES, Value::text(note)),
            None => {
                entry.fields.remove(fields::NOTES);
            }
        }
        match &self.icon {
            Some(icon) => entry.set_field(FIELD_ICON, Value::bytes(icon.clone())),
            None => {
                entry.fields.remove(FIELD_ICON);
            }
        }
    }

    /// A fresh entry carrying this account, with the account's id.
    pub fn to_entry(&self) -> Entry {
        let mut entry = Entry::with_id(self.id, self.created_at);
        self.write_to(&mut entry);
        entry
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Input for creating an account.  The secret is base32 text.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub issuer: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub otp_type: OtpType,
    #[serde(default)]
    pub algorithm: OtpAlgorithm,
    #[serde(default = "default_digits")]
    pub digits: u32,
    #[serde(default)]
    pub period: Option<u32>,
    #[serde(default)]
    pub counter: Option<u64>,
    pub secret: String,
    #[serde(
        default,
        serialize_with = "base64_encode_opt",
        deserialize_with = "base64_decode_opt"
    )]
    pub icon: Option<Vec<u8>>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
}

impl fmt::Debug for CreateAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateAccountRequest")
            .field("issuer", &self.issuer)
            .field("label", &self.label)
            .field("otp_type", &self.otp_type)
            .field("algorithm", &self.algorithm)
            .field("digits", &self.digits)
            .field("period", &self.period)
            .field("counter", &self.counter)
            .field("secret", &"<redacted>")
            .field("group_id", &self.group_id)
            .finish()
    }
}

impl CreateAccountRequest {
    /// A TOTP request with default parameters.
    pub fn totp(issuer: &str, label: &str, secret: &str) -> Self {
        Self {
            issuer: issuer.into(),
            label: label.into(),
            digits: DEFAULT_DIGITS,
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Validate and seal the secret into a new account.
    ///
    /// Everything is checked before anything is encrypted.
    pub fn build(&self, protected_key: &[u8], now: DateTime<Utc>) -> Result<Account> {
        let issuer = required("issuer", &self.issuer)?;
        let label = required("label", &self.label)?;
        let digits = check_digits(self.digits)?;
        let (period, counter) = match self.otp_type {
            OtpType::Totp => {
                if self.counter.is_some() {
                    return Err(VaultError::ValidationError(
                        "counter only applies to HOTP accounts".into(),
                    ));
                }
                (Some(check_period(self.period.unwrap_or(DEFAULT_PERIOD))?), None)
            }
            OtpType::Hotp => {
                if self.period.is_some() {
                    return Err(VaultError::ValidationError(
                        "period only applies to TOTP accounts".into(),
                    ));
                }
                (None, Some(self.counter.unwrap_or(0)))
            }
        };
        let secret = decode_secret(&self.secret)?;
        let note = self
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let sealed = ProtectedValue::seal(protected_key, &secret)?;
        Ok(Account {
            id: Uuid::new_v4(),
            issuer,
            label,
            otp_type: self.otp_type,
            algorithm: self.algorithm,
            digits,
            period,
            counter,
            secret_cipher: sealed.ciphertext().to_vec(),
            icon: self.icon.clone(),
            note,
            group_id: self.group_id,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update: only the fields that are `Some` change.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub id: Uuid,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub algorithm: Option<OtpAlgorithm>,
    #[serde(default)]
    pub digits: Option<u32>,
    #[serde(default)]
    pub period: Option<u32>,
    #[serde(default)]
    pub counter: Option<u64>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(
        default,
        serialize_with = "base64_encode_opt",
        deserialize_with = "base64_decode_opt"
    )]
    pub icon: Option<Vec<u8>>,
    #[serde(default)]
    pub note: Option<String>,
}

impl fmt::Debug for UpdateAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateAccountRequest")
            .field("id", &self.id)
            .field("issuer", &self.issuer)
            .field("label", &self.label)
            .field("algorithm", &self.algorithm)
            .field("digits", &self.digits)
            .field("period", &self.period)
            .field("counter", &self.counter)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl UpdateAccountRequest {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Apply to `current`, producing the updated account.  The secret is
    /// re-sealed only when a new one is supplied.  An empty note clears it.
    pub fn apply(
        &self,
        current: &Account,
        protected_key: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let mut next = current.clone();

        if let Some(issuer) = &self.issuer {
            next.issuer = required("issuer", issuer)?;
        }
        if let Some(label) = &self.label {
            next.label = required("label", label)?;
        }
        if let Some(algorithm) = self.algorithm {
            next.algorithm = algorithm;
        }
        if let Some(digits) = self.digits {
            next.digits = check_digits(digits)?;
        }
        if let Some(period) = self.period {
            if current.otp_type != OtpType::Totp {
                return Err(VaultError::ValidationError(
                    "period only applies to TOTP accounts".into(),
                ));
            }
            next.period = Some(check_period(period)?);
        }
        if let Some(counter) = self.counter {
            if current.otp_type != OtpType::Hotp {
                return Err(VaultError::ValidationError(
                    "counter only applies to HOTP accounts".into(),
                ));
            }
            next.counter = Some(counter);
        }
        if let Some(note) = &self.note {
            let note = note.trim();
            next.note = (!note.is_empty()).then(|| note.to_string());
        }
        if let Some(icon) = &self.icon {
            next.icon = (!icon.is_empty()).then(|| icon.clone());
        }

        if let Some(secret) = &self.secret {
            let decoded = decode_secret(secret)?;
            next.secret_cipher = ProtectedValue::seal(protected_key, &decoded)?
                .ciphertext()
                .to_vec();
        }

        next.updated_at = now.max(current.created_at);
        Ok(next)
    }
}
