//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::errors::{Result, VaultError};
use crate::vault::Vault;

/// Minimum length for a new master or backup password.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable read before prompting for the vault password.
pub const PASSWORD_ENV: &str = "AUTHVAULT_PASSWORD";

/// Environment variable read before prompting for a backup password.
pub const BACKUP_PASSWORD_ENV: &str = "AUTHVAULT_BACKUP_PASSWORD";

/// AuthVault CLI: encrypted TOTP/HOTP authenticator.
#[derive(Parser)]
#[command(
    name = "authvault",
    about = "Encrypted authenticator vault with TOTP/HOTP codes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory holding the vault, config and audit log
    #[arg(long, env = "AUTHVAULT_DIR", default_value = ".authvault", global = true)]
    pub data_dir: String,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new vault
    Init,

    /// Add an account from fields or an otpauth:// URI
    Add(AddArgs),

    /// List accounts
    List {
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
        /// Accounts per page (default: page_size from config)
        #[arg(long)]
        size: Option<usize>,
    },

    /// Show the current code for an account
    Code {
        /// Account id
        id: String,
        /// Copy the code to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Advance a HOTP account's counter
    Commit {
        /// Account id
        id: String,
    },

    /// Change fields of an account
    Update(UpdateArgs),

    /// Remove an account, entry or group
    Remove {
        /// Record id
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// List groups
    Groups,

    /// List entry tags
    Tags,

    /// Show vault status without unlocking it
    Status,

    /// Change the master password
    Passwd,

    /// Export accounts into a password-protected backup
    Export {
        /// Output file
        file: String,
    },

    /// Import accounts from a backup
    Import {
        /// Backup file
        file: String,
    },

    /// Show or change settings
    Config(ConfigArgs),

    /// View the audit log of vault operations
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum, ignore_case = true)]
        shell: clap_complete::Shell,
    },

    /// Manage the platform unlock path
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(clap::Args)]
pub struct AddArgs {
    /// otpauth:// URI (other fields are ignored when given)
    #[arg(long)]
    pub uri: Option<String>,
    /// Service name (e.g. GitHub)
    #[arg(long, required_unless_present = "uri")]
    pub issuer: Option<String>,
    /// Account label (e.g. user@example.com)
    #[arg(long, required_unless_present = "uri")]
    pub label: Option<String>,
    /// Base32 secret (omit for a hidden prompt)
    #[arg(long)]
    pub secret: Option<String>,
    /// Counter-based (HOTP) instead of time-based
    #[arg(long)]
    pub hotp: bool,
    /// SHA1, SHA256 or SHA512
    #[arg(long, default_value = "SHA1")]
    pub algorithm: String,
    #[arg(long, default_value = "6")]
    pub digits: u32,
    /// TOTP period in seconds
    #[arg(long)]
    pub period: Option<u32>,
    /// Initial HOTP counter
    #[arg(long)]
    pub counter: Option<u64>,
    /// Group id to place the account in
    #[arg(long)]
    pub group: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(clap::Args)]
pub struct UpdateArgs {
    /// Account id
    pub id: String,
    #[arg(long)]
    pub issuer: Option<String>,
    #[arg(long)]
    pub label: Option<String>,
    #[arg(long)]
    pub algorithm: Option<String>,
    #[arg(long)]
    pub digits: Option<u32>,
    #[arg(long)]
    pub period: Option<u32>,
    #[arg(long)]
    pub counter: Option<u64>,
    /// Replace the secret (prompts when given without a value)
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub secret: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    /// Enable or disable auto-lock
    #[arg(long)]
    pub auto_lock: Option<bool>,
    /// Inactivity before auto-lock, in seconds
    #[arg(long)]
    pub auto_lock_timeout: Option<u64>,
    /// Default page size for `list`
    #[arg(long)]
    pub page_size: Option<usize>,
    /// Layout for new vaults: hierarchical or flat
    #[arg(long)]
    pub storage_mode: Option<String>,
}

/// Auth subcommands.
#[derive(clap::Subcommand)]
pub enum AuthAction {
    /// Store an unlock secret in the OS keyring (unlock without password)
    Biometric {
        /// Remove the unlock path instead of enabling it
        #[arg(long)]
        disable: bool,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve the data directory against the current directory.
pub fn data_dir(cli: &Cli) -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(&cli.data_dir))
}

/// Build the engine for the data directory (still locked).
pub fn open_vault(cli: &Cli) -> Result<Vault> {
    Vault::load(data_dir(cli)?)
}

/// Open the engine and unlock it, trying in order:
/// 1. `AUTHVAULT_PASSWORD` env var (scripts/CI)
/// 2. OS keyring unlock secret (if compiled with `keyring-store`)
/// 3. Interactive prompt
pub fn unlock_vault(cli: &Cli) -> Result<Vault> {
    let vault = open_vault(cli)?;
    if !vault.app_state()?.is_initialized {
        output::tip("Run `authvault init` to create a vault.");
        return Err(VaultError::AppNotInitialized);
    }

    if let Some(pw) = password_from_env(PASSWORD_ENV) {
        vault.unlock_with_password(pw.as_bytes())?;
        return Ok(vault);
    }

    #[cfg(feature = "keyring-store")]
    {
        let path = vault.app_state()?.config.vault_path;
        if let Ok(Some(assertion)) = crate::keyring::assertion_for(&path) {
            match vault.unlock_with_biometric(&assertion) {
                Ok(()) => return Ok(vault),
                Err(e) => output::warning(&format!("Keyring unlock failed: {e}")),
            }
        }
    }

    let pw = prompt_password("Enter vault password")?;
    vault.unlock_with_password(pw.as_bytes())?;
    Ok(vault)
}

fn password_from_env(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// Hidden single-entry prompt.
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let pw = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation, honouring `env_var`
/// first.  Enforces a minimum length.
pub fn prompt_new_password(env_var: &str, prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(env_var) {
        if pw.len() < MIN_PASSWORD_LEN {
            return Err(VaultError::ValidationError(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt(prompt)
            .with_confirmation("Confirm password", "Passwords do not match, try again")
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;

        if password.len() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

/// Parse a record id given on the command line.
pub fn parse_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim())
        .map_err(|_| VaultError::ValidationError(format!("'{input}' is not a valid id")))
}

/// Record an audit event; a no-op without the `audit-log` feature.
pub fn audit(cli: &Cli, operation: &str, account_id: Option<Uuid>, details: Option<&str>) {
    #[cfg(feature = "audit-log")]
    if let Ok(dir) = data_dir(cli) {
        crate::audit::record(&dir, operation, account_id, details);
    }

    #[cfg(not(feature = "audit-log"))]
    let _ = (cli, operation, account_id, details);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_uuid_and_rejects_junk() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&format!(" {id} ")).unwrap(), id);
        assert!(matches!(
            parse_id("not-an-id"),
            Err(VaultError::ValidationError(_))
        ));
    }

    #[test]
    fn add_requires_fields_or_uri() {
        assert!(Cli::try_parse_from(["authvault", "add"]).is_err());
        assert!(Cli::try_parse_from([
            "authvault",
            "add",
            "--uri",
            "otpauth://totp/A:b?secret=JBSWY3DPEHPK3PXP"
        ])
        .is_ok());
        assert!(
            Cli::try_parse_from(["authvault", "add", "--issuer", "A", "--label", "b"]).is_ok()
        );
    }

    #[test]
    fn data_dir_flag_is_global() {
        let cli = Cli::try_parse_from(["authvault", "list", "--data-dir", "/tmp/av"]).unwrap();
        assert_eq!(cli.data_dir, "/tmp/av");
    }
}
