//! The unlocked vault session.
//!
//! `VaultStore` owns everything that only exists while the vault is
//! unlocked: the data key and the decrypted payload.  Dropping it wipes
//! the key.  Every mutating method is write-through: it works on a copy
//! of the payload, persists the re-encrypted container, and only then
//! swaps the copy in, so a failed write leaves memory and disk agreeing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::StorageMode;
use crate::crypto::biometric::{self, BiometricAssertion};
use crate::crypto::kdf::SALT_LEN;
use crate::crypto::keys::{generate_unlock_secret, SubKey};
use crate::crypto::{decrypt, derive_key, encrypt, generate_salt, DataKey, KdfParams, MasterKey};
use crate::errors::{Result, VaultError};
use crate::model::account::{
    Account, CreateAccountRequest, OtpType, UpdateAccountRequest, FIELD_ALGORITHM, FIELD_COUNTER,
    FIELD_DIGITS, FIELD_PERIOD, FIELD_SECRET, FIELD_TYPE,
};
use crate::model::{Entry, Group, Node, ProtectedValue, Tree, Value};

use super::format::{self, BiometricSlot, VaultHeader, CURRENT_VERSION};
use super::payload::Payload;

/// One page of results plus the size of the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub data: Vec<T>,
    pub total: usize,
}

/// How the caller proves it may open the vault.
pub enum Credential<'a> {
    Password(&'a [u8]),
    Biometric(&'a BiometricAssertion),
}

/// A freshly generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpCode {
    pub code: String,
    /// Seconds left in the TOTP window; `None` for HOTP.
    pub remaining: Option<u32>,
}

/// Input for a free-form entry field.
pub enum FieldInput {
    Text(String),
    /// Sealed under the protected-value key before it is stored.
    Protected(Zeroizing<String>),
    Bytes(Vec<u8>),
}

const RESERVED_FIELDS: [&str; 6] = [
    FIELD_SECRET,
    FIELD_TYPE,
    FIELD_ALGORITHM,
    FIELD_DIGITS,
    FIELD_PERIOD,
    FIELD_COUNTER,
];

/// A new master password, stretched ahead of time so the slow Argon2
/// step can run before the caller takes any lock.
pub struct NewPassword {
    salt: [u8; SALT_LEN],
    params: KdfParams,
    master_key: MasterKey,
}

impl NewPassword {
    pub fn derive(password: &[u8], params: &KdfParams) -> Result<Self> {
        if password.is_empty() {
            return Err(VaultError::ValidationError("password must not be empty".into()));
        }
        let salt = generate_salt();
        let master_key = derive_key(password, &salt, params)?;
        Ok(Self {
            salt,
            params: *params,
            master_key,
        })
    }
}

pub struct VaultStore {
    /// Path to the `.avlt` container on disk.
    path: PathBuf,

    /// Header metadata (salt, KDF params, verifier, wrapped data key).
    header: VaultHeader,

    /// The data key (zeroized on drop).
    data_key: DataKey,

    /// The decrypted records.  Protected values inside stay sealed.
    payload: Payload,
}

impl VaultStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a brand-new vault at `path` and return it unlocked.
    ///
    /// Generates a salt and a random data key, derives the master key
    /// from the password, stores the verifier and the wrapped data key,
    /// and writes an empty payload.
    pub fn initialize(
        path: &Path,
        password: &[u8],
        params: &KdfParams,
        mode: StorageMode,
    ) -> Result<Self> {
        if path.exists() {
            return Err(VaultError::AlreadyInitialized(path.to_path_buf()));
        }
        if password.is_empty() {
            return Err(VaultError::ValidationError("password must not be empty".into()));
        }

        // 1. Derive the master key from a fresh salt.
        let salt = generate_salt();
        let master_key = derive_key(password, &salt, params)?;

        // 2. Generate the data key and wrap it.
        let data_key = DataKey::generate();
        let now = Utc::now();
        let header = VaultHeader {
            version: CURRENT_VERSION,
            salt: salt.to_vec(),
            kdf: *params,
            verifier: master_key.verifier()?,
            wrapped_data_key: master_key.wrap_data_key(&data_key)?,
            storage_mode: mode,
            created_at: now,
            biometric: None,
        };

        // 3. Persist the empty payload.
        let store = Self {
            path: path.to_path_buf(),
            header,
            data_key,
            payload: Payload::empty(mode, now)?,
        };
        store.persist(&store.header, &store.payload)?;

        info!(path = %path.display(), mode = %mode, "vault initialized");
        Ok(store)
    }

    /// Open an existing vault.
    ///
    /// Checks run in a fixed order: the container exists, the header's
    /// KDF params are in range, the credential matches its verifier, the
    /// data key unwraps, the MAC verifies, the payload decrypts and
    /// deserializes.
    pub fn open(path: &Path, credential: Credential<'_>, biometric_ttl: chrono::Duration) -> Result<Self> {
        // 1. Read the container (raw bytes preserved for the MAC).  The
        //    header is not authenticated yet, so bound the KDF cost first.
        let raw = format::read_vault(path)?;
        raw.header.kdf.validate_stored()?;

        // 2. Recover the data key through the credential's slot.
        let data_key = match credential {
            Credential::Password(password) => {
                let master_key = derive_key(password, &raw.header.salt, &raw.header.kdf)?;
                master_key.check_verifier(&raw.header.verifier, VaultError::InvalidPassword)?;
                master_key.unwrap_data_key(&raw.header.wrapped_data_key)?
            }
            Credential::Biometric(assertion) => {
                let slot = raw
                    .header
                    .biometric
                    .as_ref()
                    .ok_or(VaultError::BiometricAuthFailed)?;
                biometric::open_slot(
                    &slot.verifier,
                    &slot.wrapped_data_key,
                    assertion,
                    biometric_ttl,
                    Utc::now(),
                )?
            }
        };

        // 3. Verify the MAC over the original bytes from disk.
        let mac_key = data_key.mac_key()?;
        format::verify_hmac(&mac_key[..], &raw.header_bytes, &raw.payload, &raw.stored_hmac)?;

        // 4. Decrypt and deserialize.
        let payload_key = data_key.payload_key()?;
        let plaintext = Zeroizing::new(decrypt(&payload_key[..], &raw.payload)?);
        let payload: Payload = serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::DatabaseError(format!("payload: {e}")))?;
        if payload.mode() != raw.header.storage_mode {
            return Err(VaultError::DatabaseError(
                "payload layout does not match the header".into(),
            ));
        }

        debug!(path = %path.display(), "vault opened");
        Ok(Self {
            path: path.to_path_buf(),
            header: raw.header,
            data_key,
            payload,
        })
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Encrypt `payload` and write it with `header`.
    fn persist(&self, header: &VaultHeader, payload: &Payload) -> Result<()> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(payload)
                .map_err(|e| VaultError::Serialization(format!("payload: {e}")))?,
        );
        let payload_key = self.data_key.payload_key()?;
        let ciphertext = encrypt(&payload_key[..], &plaintext)?;
        let mac_key = self.data_key.mac_key()?;
        format::write_vault(&self.path, header, &ciphertext, &mac_key[..])?;
        debug!(path = %self.path.display(), bytes = ciphertext.len(), "vault persisted");
        Ok(())
    }

    /// Run `f` against a copy of the payload, persist, then swap it in.
    fn mutate<T>(&mut self, f: impl FnOnce(&mut Payload) -> Result<T>) -> Result<T> {
        let mut next = self.payload.clone();
        let out = f(&mut next)?;
        self.persist(&self.header, &next)?;
        self.payload = next;
        Ok(out)
    }

    /// Persist a new header with the current payload.
    fn replace_header(&mut self, header: VaultHeader) -> Result<()> {
        self.persist(&header, &self.payload)?;
        self.header = header;
        Ok(())
    }

    pub(crate) fn protected_key(&self) -> Result<SubKey> {
        self.data_key.protected_key()
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// All accounts in listing order: creation time, then id.
    pub fn accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = self.payload.store().accounts()?;
        accounts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(accounts)
    }

    /// One page of accounts.  `page` is 0-based; `size` must be positive.
    pub fn list_accounts(&self, page: usize, size: usize) -> Result<PagedResult<Account>> {
        if size == 0 {
            return Err(VaultError::ValidationError("page size must be at least 1".into()));
        }
        let accounts = self.accounts()?;
        let total = accounts.len();
        let data = accounts
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .collect();
        Ok(PagedResult { data, total })
    }

    pub fn account(&self, id: Uuid) -> Result<Account> {
        self.payload.store().find_account(id)
    }

    pub fn create_account(&mut self, request: &CreateAccountRequest) -> Result<Account> {
        let key = self.protected_key()?;
        let account = request.build(&key[..], Utc::now())?;
        self.mutate(|payload| payload.store_mut().insert_account(&account))?;
        info!(account = %account.id, "account created");
        self.account(account.id)
    }

    pub fn update_account(&mut self, request: &UpdateAccountRequest) -> Result<Account> {
        let current = self.account(request.id)?;
        let key = self.protected_key()?;
        let now = Utc::now();
        let next = request.apply(&current, &key[..], now)?;
        self.mutate(|payload| payload.store_mut().replace_account(&next, now))?;
        info!(account = %next.id, "account updated");
        self.account(next.id)
    }

    /// Remove an account or entry, or a group with everything under it.
    /// Returns the number of records removed.
    pub fn remove(&mut self, id: Uuid) -> Result<usize> {
        if !self.payload.store().contains(id) {
            return Err(VaultError::NotFound(format!("record {id}")));
        }
        let removed = self.mutate(|payload| payload.store_mut().remove_record(id))?;
        info!(record = %id, removed, "record removed");
        Ok(removed)
    }

    /// Code for an account at `unix_secs`.  HOTP counters are not advanced.
    pub fn code(&self, id: Uuid, unix_secs: u64) -> Result<OtpCode> {
        let account = self.account(id)?;
        let key = self.protected_key()?;
        Ok(OtpCode {
            code: account.code_at(&key[..], unix_secs)?,
            remaining: account.remaining_at(unix_secs),
        })
    }

    /// Advance a HOTP account's counter by one and persist it.
    pub fn commit_hotp(&mut self, id: Uuid) -> Result<Account> {
        let mut account = self.account(id)?;
        if account.otp_type != OtpType::Hotp {
            return Err(VaultError::ValidationError(format!(
                "account {id} is not a HOTP account"
            )));
        }
        let next = account.counter.unwrap_or(0).checked_add(1).ok_or_else(|| {
            VaultError::InvalidOperation("HOTP counter is exhausted".into())
        })?;
        account.counter = Some(next);
        let now = Utc::now();
        account.updated_at = now;
        self.mutate(|payload| payload.store_mut().replace_account(&account, now))?;
        debug!(account = %id, counter = next, "HOTP counter committed");
        self.account(id)
    }

    /// Decrypt an account's raw secret bytes.
    pub fn reveal_secret(&self, account: &Account) -> Result<Zeroizing<Vec<u8>>> {
        let key = self.protected_key()?;
        account.secret().reveal(&key[..])
    }

    /// Insert fully built accounts (e.g. from a backup), skipping ids that
    /// already exist.  Returns how many were added.
    pub(crate) fn insert_accounts(&mut self, accounts: Vec<Account>) -> Result<usize> {
        let fresh: Vec<Account> = accounts
            .into_iter()
            .filter(|a| !self.payload.store().contains(a.id))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }
        let count = fresh.len();
        self.mutate(|payload| {
            for account in &fresh {
                payload.store_mut().insert_account(account)?;
            }
            Ok(())
        })?;
        info!(count, "accounts imported");
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Groups and entries (hierarchical mode only)
    // ------------------------------------------------------------------

    pub fn tree(&self) -> Result<&Tree> {
        self.payload.tree()
    }

    /// All groups, root first, depth-first.
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self.tree()?.groups().into_iter().cloned().collect())
    }

    /// Every distinct entry tag, sorted.
    pub fn list_tags(&self) -> Result<Vec<String>> {
        let tags: BTreeSet<String> = self.tree()?.tags();
        Ok(tags.into_iter().collect())
    }

    /// Create a group under `parent` (root when `None`).
    pub fn create_group(&mut self, parent: Option<Uuid>, name: &str) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::ValidationError("group name must not be empty".into()));
        }
        let group = Group::new(name, Utc::now());
        let id = group.uuid;
        self.mutate(|payload| {
            let tree = payload.tree_mut()?;
            let parent = parent.unwrap_or_else(|| tree.root());
            tree.insert(parent, Node::Group(group), None)
        })?;
        info!(group = %id, "group created");
        Ok(self.tree()?.group(id)?.clone())
    }

    pub fn rename_group(&mut self, id: Uuid, name: &str) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::ValidationError("group name must not be empty".into()));
        }
        let now = Utc::now();
        self.mutate(|payload| {
            let group = payload.tree_mut()?.group_mut(id)?;
            group.name = name.to_string();
            group.times.touch_modified(now);
            Ok(())
        })?;
        Ok(self.tree()?.group(id)?.clone())
    }

    /// Move a node under another group.  Groups cannot move into their
    /// own subtree and the root cannot move at all.
    pub fn move_node(&mut self, id: Uuid, new_parent: Uuid, index: Option<usize>) -> Result<()> {
        let now = Utc::now();
        self.mutate(|payload| payload.tree_mut()?.move_node(id, new_parent, index, now))?;
        debug!(node = %id, parent = %new_parent, "node moved");
        Ok(())
    }

    /// Add a plain entry under `parent` (default group when `None`).
    pub fn create_entry(&mut self, parent: Option<Uuid>, title: &str) -> Result<Entry> {
        let mut entry = Entry::new(Utc::now());
        entry.set_field(crate::model::fields::TITLE, Value::text(title.trim()));
        let id = entry.uuid;
        self.mutate(|payload| {
            let tree = payload.tree_mut()?;
            let parent = match parent {
                Some(p) => p,
                None => tree
                    .child_group_named(tree.root(), super::payload::DEFAULT_GROUP)
                    .unwrap_or_else(|| tree.root()),
            };
            tree.insert(parent, Node::Entry(entry), None)
        })?;
        self.entry(id)
    }

    pub fn entry(&self, id: Uuid) -> Result<Entry> {
        Ok(self.tree()?.entry(id)?.clone())
    }

    pub fn entry_history(&self, id: Uuid) -> Result<Vec<Entry>> {
        Ok(self.tree()?.entry(id)?.history().to_vec())
    }

    /// Text of a field; protected fields are decrypted into a wiped buffer.
    pub fn reveal_field(&self, id: Uuid, name: &str) -> Result<Zeroizing<String>> {
        let entry = self.tree()?.entry(id)?;
        match entry.field(name) {
            Some(Value::Unprotected { text }) => Ok(Zeroizing::new(text.clone())),
            Some(Value::Protected(sealed)) => {
                let key = self.protected_key()?;
                sealed.reveal_str(&key[..])
            }
            Some(Value::Bytes { .. }) => Err(VaultError::InvalidOperation(format!(
                "field '{name}' holds binary data"
            ))),
            None => Err(VaultError::NotFound(format!("field '{name}' on entry {id}"))),
        }
    }

    /// Set a free-form field.  OTP fields are managed through accounts.
    pub fn set_field(&mut self, id: Uuid, name: &str, input: FieldInput) -> Result<Entry> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::ValidationError("field name must not be empty".into()));
        }
        if RESERVED_FIELDS.contains(&name) {
            return Err(VaultError::InvalidOperation(format!(
                "field '{name}' is managed by the account API"
            )));
        }
        self.tree()?.entry(id)?;

        let value = match input {
            FieldInput::Text(text) => Value::text(text),
            FieldInput::Bytes(data) => Value::bytes(data),
            FieldInput::Protected(secret) => {
                let key = self.protected_key()?;
                Value::Protected(ProtectedValue::seal(&key[..], secret.as_bytes())?)
            }
        };
        let now = Utc::now();
        self.mutate(|payload| {
            payload.tree_mut()?.entry_mut(id)?.update(now, |entry| {
                entry.set_field(name, value);
                Ok(())
            })
        })?;
        self.entry(id)
    }

    pub fn effective_autotype_sequence(&self, id: Uuid, global_default: &str) -> Result<String> {
        self.tree()?.effective_autotype_sequence(id, global_default)
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    /// Re-wrap the data key under a new password.  The payload and any
    /// biometric slot stay valid.
    pub fn change_password(&mut self, new_password: &[u8], params: &KdfParams) -> Result<()> {
        let derived = NewPassword::derive(new_password, params)?;
        self.set_password(&derived)
    }

    /// [`change_password`](Self::change_password) with the key derived ahead of time.
    pub fn set_password(&mut self, derived: &NewPassword) -> Result<()> {
        let mut header = self.header.clone();
        header.salt = derived.salt.to_vec();
        header.kdf = derived.params;
        header.verifier = derived.master_key.verifier()?;
        header.wrapped_data_key = derived.master_key.wrap_data_key(&self.data_key)?;
        self.replace_header(header)?;

        info!("master password changed");
        Ok(())
    }

    /// Enable the platform unlock path.  Returns the unlock secret, which
    /// the caller hands to the platform credential store; it is not kept.
    pub fn enable_biometric(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let secret = generate_unlock_secret();
        let (verifier, wrapped_data_key) = biometric::seal_slot(&secret, &self.data_key)?;

        let mut header = self.header.clone();
        header.biometric = Some(BiometricSlot {
            verifier,
            wrapped_data_key,
            enrolled_at: Utc::now(),
        });
        self.replace_header(header)?;

        info!("biometric unlock enabled");
        Ok(secret)
    }

    pub fn disable_biometric(&mut self) -> Result<()> {
        if self.header.biometric.is_none() {
            return Ok(());
        }
        let mut header = self.header.clone();
        header.biometric = None;
        self.replace_header(header)?;
        info!("biometric unlock disabled");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the path to the container.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &VaultHeader {
        &self.header
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.header.storage_mode
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.header.created_at
    }

    pub fn has_biometric(&self) -> bool {
        self.header.biometric.is_some()
    }

    pub fn account_count(&self) -> Result<usize> {
        Ok(self.payload.store().accounts()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(mode: StorageMode) -> (TempDir, VaultStore) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vault.avlt");
        let store = VaultStore::initialize(&path, b"P1", &KdfParams::minimum(), mode).unwrap();
        (tmp, store)
    }

    fn github() -> CreateAccountRequest {
        CreateAccountRequest::totp("GitHub", "me", "JBSWY3DPEHPK3PXP")
    }

    #[test]
    fn initialize_twice_fails() {
        let (tmp, _store) = open_store(StorageMode::Hierarchical);
        let err = VaultStore::initialize(
            &tmp.path().join("vault.avlt"),
            b"P1",
            &KdfParams::minimum(),
            StorageMode::Hierarchical,
        )
        .err()
        .unwrap();
        assert!(matches!(err, VaultError::AlreadyInitialized(_)));
    }

    #[test]
    fn reopen_sees_persisted_account() {
        let (tmp, mut store) = open_store(StorageMode::Hierarchical);
        let created = store.create_account(&github()).unwrap();
        drop(store);

        let reopened = VaultStore::open(
            &tmp.path().join("vault.avlt"),
            Credential::Password(b"P1"),
            chrono::Duration::seconds(30),
        )
        .unwrap();
        assert_eq!(reopened.account(created.id).unwrap(), created);
    }

    #[test]
    fn wrong_password_is_invalid_password() {
        let (tmp, store) = open_store(StorageMode::Flat);
        drop(store);
        let err = VaultStore::open(
            &tmp.path().join("vault.avlt"),
            Credential::Password(b"nope"),
            chrono::Duration::seconds(30),
        )
        .err()
        .unwrap();
        assert!(matches!(err, VaultError::InvalidPassword));
    }

    #[test]
    fn hotp_preview_does_not_advance() {
        let (_tmp, mut store) = open_store(StorageMode::Hierarchical);
        let request = CreateAccountRequest {
            otp_type: OtpType::Hotp,
            ..github()
        };
        let account = store.create_account(&request).unwrap();

        let first = store.code(account.id, 0).unwrap();
        let again = store.code(account.id, 1_000).unwrap();
        assert_eq!(first, again);
        assert_eq!(first.remaining, None);

        let committed = store.commit_hotp(account.id).unwrap();
        assert_eq!(committed.counter, Some(1));
        assert_ne!(store.code(account.id, 0).unwrap().code, first.code);
    }

    #[test]
    fn commit_on_totp_is_validation_error() {
        let (_tmp, mut store) = open_store(StorageMode::Flat);
        let account = store.create_account(&github()).unwrap();
        assert!(matches!(
            store.commit_hotp(account.id),
            Err(VaultError::ValidationError(_))
        ));
    }

    #[test]
    fn protected_field_roundtrip() {
        let (_tmp, mut store) = open_store(StorageMode::Hierarchical);
        let entry = store.create_entry(None, "mail").unwrap();
        store
            .set_field(
                entry.uuid,
                "Password",
                FieldInput::Protected(Zeroizing::new("hunter2".into())),
            )
            .unwrap();
        assert_eq!(
            store.reveal_field(entry.uuid, "Password").unwrap().as_str(),
            "hunter2"
        );
        assert!(matches!(
            store.set_field(entry.uuid, FIELD_SECRET, FieldInput::Text("x".into())),
            Err(VaultError::InvalidOperation(_))
        ));
    }

    #[test]
    fn failed_validation_leaves_vault_untouched() {
        let (tmp, mut store) = open_store(StorageMode::Hierarchical);
        let path = tmp.path().join("vault.avlt");
        let before = std::fs::read(&path).unwrap();
        let bad = CreateAccountRequest {
            digits: 4,
            ..github()
        };
        assert!(store.create_account(&bad).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(store.account_count().unwrap(), 0);
    }

    #[test]
    fn tampered_kdf_params_fail_fast() {
        let (tmp, store) = open_store(StorageMode::Hierarchical);
        drop(store);
        let path = tmp.path().join("vault.avlt");
        let raw = format::parse_vault(&std::fs::read(&path).unwrap()).unwrap();

        let mut header = raw.header.clone();
        header.kdf.iterations = u32::MAX;
        let header_bytes = serde_json::to_vec(&header).unwrap();
        let mut tampered = b"AVLT".to_vec();
        tampered.push(CURRENT_VERSION);
        tampered.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        tampered.extend_from_slice(&header_bytes);
        tampered.extend_from_slice(&raw.payload);
        tampered.extend_from_slice(&raw.stored_hmac);
        std::fs::write(&path, tampered).unwrap();

        let started = std::time::Instant::now();
        let err = VaultStore::open(
            &path,
            Credential::Password(b"P1"),
            chrono::Duration::seconds(30),
        )
        .err()
        .unwrap();
        assert!(matches!(err, VaultError::DatabaseError(_)));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn change_password_rewraps_same_data() {
        let (tmp, mut store) = open_store(StorageMode::Flat);
        let created = store.create_account(&github()).unwrap();
        store.change_password(b"P2", &KdfParams::minimum()).unwrap();
        assert!(matches!(
            store.change_password(b"", &KdfParams::minimum()),
            Err(VaultError::ValidationError(_))
        ));
        drop(store);

        let path = tmp.path().join("vault.avlt");
        let ttl = chrono::Duration::seconds(30);
        assert!(matches!(
            VaultStore::open(&path, Credential::Password(b"P1"), ttl),
            Err(VaultError::InvalidPassword)
        ));
        let reopened = VaultStore::open(&path, Credential::Password(b"P2"), ttl).unwrap();
        assert_eq!(reopened.account(created.id).unwrap(), created);
    }
}
