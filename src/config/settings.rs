use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::KdfParams;
use crate::errors::{Result, VaultError};

/// How the payload is organized inside the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Full group/entry tree; accounts are entries with an OTP secret.
    #[default]
    Hierarchical,
    /// A plain list of accounts.
    Flat,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hierarchical => f.write_str("hierarchical"),
            Self::Flat => f.write_str("flat"),
        }
    }
}

/// Engine configuration, loaded from `authvault.toml` in the data directory.
///
/// Every field has a default so the vault works without any config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Container file name (relative to the data directory) or absolute path.
    #[serde(default = "default_vault_file")]
    pub vault_file: String,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Lock automatically after a period of inactivity.
    #[serde(default)]
    pub auto_lock: bool,

    /// Inactivity before auto-lock, in seconds.
    #[serde(default = "default_auto_lock_timeout_secs")]
    pub auto_lock_timeout_secs: u64,

    /// Default page size for account listings.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Payload layout used when a new vault is initialized.
    #[serde(default)]
    pub storage_mode: StorageMode,

    /// How long a platform unlock assertion stays valid.
    #[serde(default = "default_biometric_assertion_ttl_secs")]
    pub biometric_assertion_ttl_secs: u64,

    /// Fallback auto-type sequence when neither entry nor group sets one.
    #[serde(default = "default_autotype_sequence")]
    pub default_autotype_sequence: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_file() -> String {
    "vault.avlt".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_auto_lock_timeout_secs() -> u64 {
    600
}

fn default_page_size() -> usize {
    20
}

fn default_biometric_assertion_ttl_secs() -> u64 {
    30
}

fn default_autotype_sequence() -> String {
    "{USERNAME}{TAB}{PASSWORD}{ENTER}".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_file: default_vault_file(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            auto_lock: false,
            auto_lock_timeout_secs: default_auto_lock_timeout_secs(),
            page_size: default_page_size(),
            storage_mode: StorageMode::default(),
            biometric_assertion_ttl_secs: default_biometric_assertion_ttl_secs(),
            default_autotype_sequence: default_autotype_sequence(),
        }
    }
}

impl Settings {
    /// Name of the config file inside the data directory.
    pub const FILE_NAME: &'static str = "authvault.toml";

    /// Load settings from `<data_dir>/authvault.toml`.
    ///
    /// A missing file yields defaults; an unparsable one is an error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Write the settings back to `<data_dir>/authvault.toml`.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| VaultError::Config(format!("Failed to serialize settings: {e}")))?;
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(data_dir.join(Self::FILE_NAME), contents)?;
        Ok(())
    }

    /// Full path of the vault container.
    pub fn vault_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.vault_file)
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// The inactivity window, or `None` when auto-lock is off.
    pub fn auto_lock_timeout(&self) -> Option<Duration> {
        self.auto_lock
            .then(|| Duration::from_secs(self.auto_lock_timeout_secs.max(1)))
    }

    pub fn biometric_ttl(&self) -> chrono::Duration {
        // Clamped to one day.
        chrono::Duration::seconds(self.biometric_assertion_ttl_secs.min(86_400) as i64)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
