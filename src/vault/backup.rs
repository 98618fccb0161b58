//! Password-protected account backups.
//!
//! A backup is a small JSON envelope, independent of the vault password:
//!
//! ```json
//! { "format": "authvault-backup", "version": 1, "salt": "...", "kdf": {...},
//!   "verifier": "...", "data": "<base64 AES-GCM of the account list>" }
//! ```
//!
//! Inside `data`, secrets are base32 so a backup can be re-imported into
//! any vault, whatever its data key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::kdf::SALT_LEN;
use crate::crypto::{decrypt, derive_key, encrypt, generate_salt, KdfParams, MasterKey};
use crate::encoding::{base64_decode, base64_decode_opt, base64_encode, base64_encode_opt};
use crate::errors::{Result, VaultError};
use crate::model::account::{encode_secret, CreateAccountRequest, OtpAlgorithm, OtpType};

use super::store::VaultStore;

const BACKUP_FORMAT: &str = "authvault-backup";
const BACKUP_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct BackupEnvelope {
    format: String,
    version: u8,
    created_at: DateTime<Utc>,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    salt: Vec<u8>,
    kdf: KdfParams,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    verifier: Vec<u8>,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    data: Vec<u8>,
}

/// One account inside the encrypted section.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupAccount {
    id: Uuid,
    issuer: String,
    label: String,
    #[serde(rename = "type")]
    otp_type: OtpType,
    algorithm: OtpAlgorithm,
    digits: u32,
    #[serde(default)]
    period: Option<u32>,
    #[serde(default)]
    counter: Option<u64>,
    /// Base32.
    secret: String,
    #[serde(
        default,
        serialize_with = "base64_encode_opt",
        deserialize_with = "base64_decode_opt"
    )]
    icon: Option<Vec<u8>>,
    #[serde(default)]
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl Drop for BackupAccount {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

fn check_password(password: &[u8]) -> Result<()> {
    if password.is_empty() {
        return Err(VaultError::ValidationError(
            "backup password must not be empty".into(),
        ));
    }
    Ok(())
}

/// A backup password stretched into a sealing key.  Deriving it does not
/// touch the vault, so callers can do the slow part before taking a lock.
pub struct SealingKey {
    salt: [u8; SALT_LEN],
    params: KdfParams,
    key: MasterKey,
}

impl SealingKey {
    pub fn derive(password: &[u8], params: &KdfParams) -> Result<Self> {
        check_password(password)?;
        let salt = generate_salt();
        let key = derive_key(password, &salt, params)?;
        Ok(Self {
            salt,
            params: *params,
            key,
        })
    }
}

/// Decrypted records of a backup whose password has been checked.
pub struct OpenedBackup {
    records: Vec<BackupAccount>,
}

impl OpenedBackup {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Export every account into a backup sealed with `key`.
pub fn export_backup(store: &VaultStore, key: &SealingKey) -> Result<Vec<u8>> {
    // 1. Collect accounts with their secrets as base32.
    let mut records = Vec::new();
    for account in store.accounts()? {
        let raw = store.reveal_secret(&account)?;
        records.push(BackupAccount {
            id: account.id,
            issuer: account.issuer.clone(),
            label: account.label.clone(),
            otp_type: account.otp_type,
            algorithm: account.algorithm,
            digits: account.digits,
            period: account.period,
            counter: account.counter,
            secret: encode_secret(&raw).to_string(),
            icon: account.icon.clone(),
            note: account.note.clone(),
            created_at: account.created_at,
        });
    }
    let plaintext = Zeroizing::new(
        serde_json::to_vec(&records)
            .map_err(|e| VaultError::Serialization(format!("backup records: {e}")))?,
    );

    // 2. Seal under the backup key.
    let envelope = BackupEnvelope {
        format: BACKUP_FORMAT.to_string(),
        version: BACKUP_VERSION,
        created_at: Utc::now(),
        salt: key.salt.to_vec(),
        kdf: key.params,
        verifier: key.key.verifier()?,
        data: encrypt(key.key.as_bytes(), &plaintext)?,
    };

    info!(count = records.len(), "backup exported");
    serde_json::to_vec_pretty(&envelope)
        .map_err(|e| VaultError::Serialization(format!("backup envelope: {e}")))
}

/// Parse, authenticate and decrypt a backup file.
///
/// The envelope's KDF params are range-checked before any derivation, so
/// a crafted file cannot stall the caller.
pub fn open_backup(bytes: &[u8], password: &[u8]) -> Result<OpenedBackup> {
    check_password(password)?;

    // 1. Parse the envelope.
    let envelope: BackupEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| VaultError::DatabaseError(format!("not a backup file: {e}")))?;
    if envelope.format != BACKUP_FORMAT || envelope.version != BACKUP_VERSION {
        return Err(VaultError::DatabaseError(format!(
            "unsupported backup format '{}' v{}",
            envelope.format, envelope.version
        )));
    }
    envelope.kdf.validate_stored()?;

    // 2. Check the password, then decrypt the records.
    let key = derive_key(password, &envelope.salt, &envelope.kdf)?;
    key.check_verifier(&envelope.verifier, VaultError::InvalidPassword)?;
    let plaintext = Zeroizing::new(decrypt(key.as_bytes(), &envelope.data)?);
    let records: Vec<BackupAccount> = serde_json::from_slice(&plaintext)
        .map_err(|e| VaultError::DatabaseError(format!("backup records: {e}")))?;

    Ok(OpenedBackup { records })
}

/// Import the accounts of an opened backup.  Accounts whose id already
/// exists are skipped; returns the number actually imported.
pub fn import_backup(store: &mut VaultStore, backup: &OpenedBackup) -> Result<usize> {
    // Re-seal each secret under this vault's key.
    let protected_key = store.protected_key()?;
    let mut accounts = Vec::with_capacity(backup.records.len());
    for record in &backup.records {
        let request = CreateAccountRequest {
            issuer: record.issuer.clone(),
            label: record.label.clone(),
            otp_type: record.otp_type,
            algorithm: record.algorithm,
            digits: record.digits,
            period: record.period,
            counter: record.counter,
            secret: record.secret.clone(),
            icon: record.icon.clone(),
            note: record.note.clone(),
            group_id: None,
        };
        let mut account = request.build(&protected_key[..], record.created_at)?;
        account.id = record.id;
        accounts.push(account);
    }

    store.insert_accounts(accounts)
}
