//! The `Vault` handle: the thread-safe engine callers talk to.
//!
//! A `Vault` is a cheap, cloneable handle around shared state guarded by
//! an `RwLock`.  Listing, code generation and `app_state` take the read
//! lock; mutations and lock transitions take the write lock, so a `lock()`
//! racing a mutation waits for its write-through persist to finish.
//!
//! Argon2 never runs under that lock.  `initialize` and `unlock` derive
//! keys while holding only a separate transition mutex, then take the
//! write lock just long enough to swap the session in; password changes
//! and backups derive first and lock after.  A polling `app_state` stays
//! responsive throughout.
//!
//! When auto-lock is enabled, a background thread holding only a `Weak`
//! reference polls the activity clock and locks the vault on expiry.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::{Settings, StorageMode};
use crate::crypto::BiometricAssertion;
use crate::errors::{Result, VaultError};
use crate::model::{
    parse_otpauth, Account, CreateAccountRequest, Entry, Group, UpdateAccountRequest,
};

use super::backup::{self, SealingKey};
use super::state::{
    ActivityClock, AutoLockTimer, LockReason, LockState, StateChange, Subscribers,
    TIMER_CHECK_INTERVAL,
};
use super::store::{Credential, FieldInput, NewPassword, OtpCode, PagedResult, VaultStore};

/// Where the engine keeps its files, and the settings in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub vault_path: PathBuf,
    pub settings: Settings,
}

/// Snapshot returned by [`Vault::app_state`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub is_initialized: bool,
    pub is_locked: bool,
    pub runtime_timestamp: DateTime<Utc>,
    pub locked_timestamp: Option<DateTime<Utc>>,
    pub config: AppConfig,
}

/// Summary of an unlocked vault, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultInfo {
    pub path: PathBuf,
    pub storage_mode: StorageMode,
    pub created_at: DateTime<Utc>,
    pub account_count: usize,
    pub biometric_enabled: bool,
}

struct Inner {
    state: LockState,
    settings: Settings,
    data_dir: PathBuf,
    vault_path: PathBuf,
    locked_timestamp: Option<DateTime<Utc>>,
    timer: Option<AutoLockTimer>,
}

struct Shared {
    inner: RwLock<Inner>,
    /// Serializes `initialize` and `unlock` while they derive keys.
    transition: Mutex<()>,
    activity: ActivityClock,
    subscribers: Subscribers,
    runtime_timestamp: DateTime<Utc>,
}

/// Thread-safe handle to one vault.  Clones share the same state.
#[derive(Clone)]
pub struct Vault {
    shared: Arc<Shared>,
}

fn poisoned() -> VaultError {
    VaultError::Unexpected("vault state lock poisoned".into())
}

/// Drop the session and notify, unless already locked.
fn lock_state(inner: &mut Inner, subscribers: &Subscribers, reason: LockReason) {
    inner.timer = None;
    if matches!(inner.state, LockState::Unlocked(_)) {
        inner.state = LockState::Locked;
        inner.locked_timestamp = Some(Utc::now());
        info!(?reason, "vault locked");
        subscribers.notify(StateChange::Locked { reason });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poison) => poison.into_inner(),
        };
        lock_state(inner, &self.subscribers, LockReason::Shutdown);
    }
}

impl Vault {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create the engine for `data_dir`.  Starts `Locked` when the
    /// container already exists, `Uninitialized` otherwise.
    pub fn open(settings: Settings, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let vault_path = settings.vault_path(&data_dir);
        let state = if vault_path.exists() {
            LockState::Locked
        } else {
            LockState::Uninitialized
        };
        debug!(path = %vault_path.display(), ?state, "vault engine opened");

        Self {
            shared: Arc::new(Shared {
                inner: RwLock::new(Inner {
                    state,
                    settings,
                    data_dir,
                    vault_path,
                    locked_timestamp: None,
                    timer: None,
                }),
                transition: Mutex::new(()),
                activity: ActivityClock::default(),
                subscribers: Subscribers::default(),
                runtime_timestamp: Utc::now(),
            }),
        }
    }

    /// Load `authvault.toml` from `data_dir` and open the engine.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let settings = Settings::load(&data_dir)?;
        Ok(Self::open(settings, data_dir))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.shared.inner.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.shared.inner.write().map_err(|_| poisoned())
    }

    fn transition(&self) -> Result<MutexGuard<'_, ()>> {
        self.shared.transition.lock().map_err(|_| poisoned())
    }

    /// Run `f` against the unlocked session under the read lock.
    fn with_session<T>(&self, f: impl FnOnce(&VaultStore, &Settings) -> Result<T>) -> Result<T> {
        let inner = self.read()?;
        let store = inner.state.session()?;
        self.shared.activity.touch();
        f(store, &inner.settings)
    }

    /// Run `f` against the unlocked session under the write lock.
    fn with_session_mut<T>(
        &self,
        f: impl FnOnce(&mut VaultStore, &Settings) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.write()?;
        let Inner {
            state, settings, ..
        } = &mut *inner;
        let store = state.session_mut()?;
        self.shared.activity.touch();
        f(store, settings)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create the container at the configured path and leave it unlocked.
    pub fn initialize(&self, password: &[u8]) -> Result<()> {
        self.initialize_at(None, password)
    }

    /// Like [`initialize`](Self::initialize), with an explicit container
    /// path.  A relative path is taken from the data directory.  The path
    /// is saved to `authvault.toml` so the vault is found again on reload.
    pub fn initialize_at(&self, path: Option<&Path>, password: &[u8]) -> Result<()> {
        let _transition = self.transition()?;
        let (mut settings, data_dir, configured_path) = {
            let inner = self.read()?;
            if inner.state.is_initialized() {
                return Err(VaultError::AlreadyInitialized(inner.vault_path.clone()));
            }
            (
                inner.settings.clone(),
                inner.data_dir.clone(),
                inner.vault_path.clone(),
            )
        };

        let path = match path {
            Some(custom) => {
                let vault_file = custom.to_str().ok_or_else(|| {
                    VaultError::ValidationError(format!(
                        "vault path {} is not valid UTF-8",
                        custom.display()
                    ))
                })?;
                settings.vault_file = vault_file.to_string();
                settings.vault_path(&data_dir)
            }
            None => configured_path.clone(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = VaultStore::initialize(
            &path,
            password,
            &settings.kdf_params(),
            settings.storage_mode,
        )?;

        let custom_path = settings.vault_path(&data_dir) != configured_path;
        if custom_path {
            if let Err(e) = settings.save(&data_dir) {
                drop(store);
                let _ = std::fs::remove_file(&path);
                return Err(e);
            }
            debug!(path = %path.display(), "custom vault path saved");
        }

        let mut inner = self.write()?;
        if custom_path {
            inner.settings.vault_file = settings.vault_file;
        }
        inner.vault_path = path;
        inner.state = LockState::Unlocked(Box::new(store));
        inner.locked_timestamp = None;
        self.start_timer(&mut inner);

        self.shared.subscribers.notify(StateChange::Initialized);
        self.shared.subscribers.notify(StateChange::Unlocked);
        Ok(())
    }

    pub fn unlock_with_password(&self, password: &[u8]) -> Result<()> {
        self.unlock(Credential::Password(password))
    }

    pub fn unlock_with_biometric(&self, assertion: &BiometricAssertion) -> Result<()> {
        self.unlock(Credential::Biometric(assertion))
    }

    /// Open the container with `credential`.  When already unlocked the
    /// credential is still checked and the session reloaded from disk.
    fn unlock(&self, credential: Credential<'_>) -> Result<()> {
        let _transition = self.transition()?;
        let (path, biometric_ttl) = {
            let inner = self.read()?;
            inner.state.check_unlockable()?;
            (inner.vault_path.clone(), inner.settings.biometric_ttl())
        };

        let store = match VaultStore::open(&path, credential, biometric_ttl) {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e.code(), "unlock failed");
                return Err(e);
            }
        };

        let mut inner = self.write()?;
        inner.state = LockState::Unlocked(Box::new(store));
        self.start_timer(&mut inner);
        info!("vault unlocked");
        self.shared.subscribers.notify(StateChange::Unlocked);
        Ok(())
    }

    /// Discard the decrypted session.  Idempotent.
    pub fn lock(&self) -> Result<()> {
        let mut inner = self.write()?;
        lock_state(&mut inner, &self.shared.subscribers, LockReason::Explicit);
        Ok(())
    }

    /// Lock for process exit.
    pub fn shutdown(&self) -> Result<()> {
        let mut inner = self.write()?;
        lock_state(&mut inner, &self.shared.subscribers, LockReason::Shutdown);
        Ok(())
    }

    /// Cheap, side-effect-free snapshot for polling callers.
    pub fn app_state(&self) -> Result<AppState> {
        let inner = self.read()?;
        Ok(AppState {
            is_initialized: inner.state.is_initialized(),
            is_locked: inner.state.is_locked(),
            runtime_timestamp: self.shared.runtime_timestamp,
            locked_timestamp: inner.locked_timestamp,
            config: AppConfig {
                data_dir: inner.data_dir.clone(),
                vault_path: inner.vault_path.clone(),
                settings: inner.settings.clone(),
            },
        })
    }

    /// Receive a message on every state transition.
    pub fn subscribe(&self) -> Receiver<StateChange> {
        self.shared.subscribers.subscribe()
    }

    pub fn settings(&self) -> Result<Settings> {
        Ok(self.read()?.settings.clone())
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        Ok(self.read()?.data_dir.clone())
    }

    /// Replace the settings in force.  The container path only follows
    /// the new settings while no vault exists; the auto-lock timer is
    /// restarted with the new policy.
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.state.is_initialized() {
            inner.vault_path = settings.vault_path(&inner.data_dir);
        }
        inner.settings = settings;
        if matches!(inner.state, LockState::Unlocked(_)) {
            self.start_timer(&mut inner);
        } else {
            inner.timer = None;
        }
        debug!("settings updated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Auto-lock
    // ------------------------------------------------------------------

    /// (Re)start the inactivity timer if the settings ask for one.
    fn start_timer(&self, inner: &mut Inner) {
        inner.timer = None;
        let Some(timeout) = inner.settings.auto_lock_timeout() else {
            return;
        };

        let timer = AutoLockTimer::new(timeout);
        let cancel = timer.cancel_flag();
        let weak = Arc::downgrade(&self.shared);
        self.shared.activity.touch();

        let spawned = thread::Builder::new()
            .name("authvault-autolock".into())
            .spawn(move || auto_lock_loop(weak, cancel, timeout));
        match spawned {
            Ok(_) => {
                debug!(timeout_secs = timeout.as_secs(), "auto-lock timer started");
                inner.timer = Some(timer);
            }
            Err(e) => warn!(error = %e, "could not start auto-lock timer"),
        }
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// One page of accounts (`page` is 0-based).
    pub fn list_accounts(&self, page: usize, size: usize) -> Result<PagedResult<Account>> {
        self.with_session(|store, _| store.list_accounts(page, size))
    }

    pub fn account(&self, id: Uuid) -> Result<Account> {
        self.with_session(|store, _| store.account(id))
    }

    pub fn create_account(&self, request: &CreateAccountRequest) -> Result<Account> {
        self.with_session_mut(|store, _| store.create_account(request))
    }

    /// Create an account from an `otpauth://` URI.
    pub fn add_account(&self, auth_url: &str) -> Result<Account> {
        let request = parse_otpauth(auth_url)?;
        self.create_account(&request)
    }

    pub fn update_account(&self, request: &UpdateAccountRequest) -> Result<Account> {
        self.with_session_mut(|store, _| store.update_account(request))
    }

    /// Remove an account, entry, or group (cascading).
    pub fn remove(&self, id: Uuid) -> Result<usize> {
        self.with_session_mut(|store, _| store.remove(id))
    }

    /// Current code for an account.
    pub fn code(&self, id: Uuid) -> Result<OtpCode> {
        self.code_at(id, unix_now())
    }

    pub fn code_at(&self, id: Uuid, unix_secs: u64) -> Result<OtpCode> {
        self.with_session(|store, _| store.code(id, unix_secs))
    }

    pub fn commit_hotp(&self, id: Uuid) -> Result<Account> {
        self.with_session_mut(|store, _| store.commit_hotp(id))
    }

    /// Decrypted secret of an account, as base32.
    pub fn reveal_secret(&self, id: Uuid) -> Result<Zeroizing<String>> {
        self.with_session(|store, _| {
            let account = store.account(id)?;
            let raw = store.reveal_secret(&account)?;
            Ok(crate::model::account::encode_secret(&raw))
        })
    }

    // ------------------------------------------------------------------
    // Groups and entries
    // ------------------------------------------------------------------

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        self.with_session(|store, _| store.list_groups())
    }

    pub fn list_tags(&self) -> Result<Vec<String>> {
        self.with_session(|store, _| store.list_tags())
    }

    pub fn create_group(&self, parent: Option<Uuid>, name: &str) -> Result<Group> {
        self.with_session_mut(|store, _| store.create_group(parent, name))
    }

    pub fn rename_group(&self, id: Uuid, name: &str) -> Result<Group> {
        self.with_session_mut(|store, _| store.rename_group(id, name))
    }

    pub fn move_node(&self, id: Uuid, new_parent: Uuid, index: Option<usize>) -> Result<()> {
        self.with_session_mut(|store, _| store.move_node(id, new_parent, index))
    }

    pub fn create_entry(&self, parent: Option<Uuid>, title: &str) -> Result<Entry> {
        self.with_session_mut(|store, _| store.create_entry(parent, title))
    }

    pub fn entry(&self, id: Uuid) -> Result<Entry> {
        self.with_session(|store, _| store.entry(id))
    }

    pub fn entry_history(&self, id: Uuid) -> Result<Vec<Entry>> {
        self.with_session(|store, _| store.entry_history(id))
    }

    pub fn reveal_field(&self, id: Uuid, name: &str) -> Result<Zeroizing<String>> {
        self.with_session(|store, _| store.reveal_field(id, name))
    }

    pub fn set_field(&self, id: Uuid, name: &str, input: FieldInput) -> Result<Entry> {
        self.with_session_mut(|store, _| store.set_field(id, name, input))
    }

    /// Auto-type sequence for an entry, falling back to the configured default.
    pub fn effective_autotype_sequence(&self, id: Uuid) -> Result<String> {
        self.with_session(|store, settings| {
            store.effective_autotype_sequence(id, &settings.default_autotype_sequence)
        })
    }

    // ------------------------------------------------------------------
    // Credentials and backups
    // ------------------------------------------------------------------

    pub fn change_password(&self, new_password: &[u8]) -> Result<()> {
        let params = self.with_session(|_, settings| Ok(settings.kdf_params()))?;
        let derived = NewPassword::derive(new_password, &params)?;
        self.with_session_mut(|store, _| store.set_password(&derived))
    }

    /// Enable the platform unlock path; returns the unlock secret once.
    pub fn enable_biometric(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.with_session_mut(|store, _| store.enable_biometric())
    }

    pub fn disable_biometric(&self) -> Result<()> {
        self.with_session_mut(|store, _| store.disable_biometric())
    }

    pub fn export_backup(&self, password: &[u8]) -> Result<Vec<u8>> {
        let params = self.with_session(|_, settings| Ok(settings.kdf_params()))?;
        let key = SealingKey::derive(password, &params)?;
        self.with_session(|store, _| backup::export_backup(store, &key))
    }

    pub fn import_backup(&self, bytes: &[u8], password: &[u8]) -> Result<usize> {
        self.with_session(|_, _| Ok(()))?;
        let opened = backup::open_backup(bytes, password)?;
        self.with_session_mut(|store, _| backup::import_backup(store, &opened))
    }

    pub fn info(&self) -> Result<VaultInfo> {
        self.with_session(|store, _| {
            Ok(VaultInfo {
                path: store.path().to_path_buf(),
                storage_mode: store.storage_mode(),
                created_at: store.created_at(),
                account_count: store.account_count()?,
                biometric_enabled: store.has_biometric(),
            })
        })
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// Body of the auto-lock thread.  Exits once cancelled, once the vault
/// is gone, or after locking it.
fn auto_lock_loop(weak: Weak<Shared>, cancel: Arc<AtomicBool>, timeout: Duration) {
    loop {
        thread::sleep(TIMER_CHECK_INTERVAL);
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let Some(shared) = weak.upgrade() else {
            return;
        };
        if !shared.activity.is_expired(timeout) {
            continue;
        }

        // Re-check under the write lock: an operation may have touched
        // the clock while we waited.
        let Ok(mut inner) = shared.inner.write() else {
            return;
        };
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        if shared.activity.is_expired(timeout) {
            lock_state(&mut inner, &shared.subscribers, LockReason::Timeout);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn light_settings() -> Settings {
        Settings {
            argon2_memory_kib: 8192,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            ..Settings::default()
        }
    }

    fn github() -> CreateAccountRequest {
        CreateAccountRequest::totp("GitHub", "me", "JBSWY3DPEHPK3PXP")
    }

    #[test]
    fn starts_uninitialized_then_locked_on_reopen() {
        let tmp = TempDir::new().unwrap();
        let vault = Vault::open(light_settings(), tmp.path());
        let state = vault.app_state().unwrap();
        assert!(!state.is_initialized);
        assert!(matches!(
            vault.list_accounts(0, 10),
            Err(VaultError::AppNotInitialized)
        ));
        assert!(matches!(
            vault.unlock_with_password(b"P1"),
            Err(VaultError::MasterKeyNotInitialized)
        ));

        vault.initialize(b"P1").unwrap();
        assert!(!vault.app_state().unwrap().is_locked);
        drop(vault);

        let reopened = Vault::open(light_settings(), tmp.path());
        let state = reopened.app_state().unwrap();
        assert!(state.is_initialized);
        assert!(state.is_locked);
    }

    #[test]
    fn initialize_twice_fails() {
        let tmp = TempDir::new().unwrap();
        let vault = Vault::open(light_settings(), tmp.path());
        vault.initialize(b"P1").unwrap();
        assert!(matches!(
            vault.initialize(b"P1"),
            Err(VaultError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn lock_is_idempotent_and_records_timestamp() {
        let tmp = TempDir::new().unwrap();
        let vault = Vault::open(light_settings(), tmp.path());
        vault.initialize(b"P1").unwrap();
        vault.lock().unwrap();
        let first = vault.app_state().unwrap().locked_timestamp;
        assert!(first.is_some());
        vault.lock().unwrap();
        assert_eq!(vault.app_state().unwrap().locked_timestamp, first);
    }

    #[test]
    fn subscribers_see_transitions() {
        let tmp = TempDir::new().unwrap();
        let vault = Vault::open(light_settings(), tmp.path());
        let events = vault.subscribe();
        vault.initialize(b"P1").unwrap();
        vault.lock().unwrap();

        let seen: Vec<StateChange> = events.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                StateChange::Initialized,
                StateChange::Unlocked,
                StateChange::Locked {
                    reason: LockReason::Explicit
                },
            ]
        );
    }

    #[test]
    fn clones_share_state() {
        let tmp = TempDir::new().unwrap();
        let vault = Vault::open(light_settings(), tmp.path());
        let other = vault.clone();
        vault.initialize(b"P1").unwrap();
        other.create_account(&github()).unwrap();
        assert_eq!(vault.list_accounts(0, 10).unwrap().total, 1);
        other.lock().unwrap();
        assert!(matches!(
            vault.list_accounts(0, 10),
            Err(VaultError::AppIsLocked)
        ));
    }

    #[test]
    fn auto_lock_fires_after_inactivity() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings {
            auto_lock: true,
            auto_lock_timeout_secs: 1,
            ..light_settings()
        };
        let vault = Vault::open(settings, tmp.path());
        let events = vault.subscribe();
        vault.initialize(b"P1").unwrap();

        let locked = events
            .iter()
            .find(|e| matches!(e, StateChange::Locked { .. }));
        assert_eq!(
            locked,
            Some(StateChange::Locked {
                reason: LockReason::Timeout
            })
        );
        assert!(vault.app_state().unwrap().is_locked);
    }

    #[test]
    fn wrong_password_keeps_vault_locked() {
        let tmp = TempDir::new().unwrap();
        let vault = Vault::open(light_settings(), tmp.path());
        vault.initialize(b"P1").unwrap();
        vault.lock().unwrap();
        assert!(matches!(
            vault.unlock_with_password(b"nope"),
            Err(VaultError::InvalidPassword)
        ));
        assert!(vault.app_state().unwrap().is_locked);
    }
}
