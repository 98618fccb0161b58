//! `authvault config`: show or change `authvault.toml`.

use crate::cli::output;
use crate::cli::{data_dir, Cli, ConfigArgs};
use crate::config::{Settings, StorageMode};
use crate::errors::{Result, VaultError};

/// Execute the `config` command.  Without flags it prints the settings.
pub fn execute(cli: &Cli, args: &ConfigArgs) -> Result<()> {
    let dir = data_dir(cli)?;
    let mut settings = Settings::load(&dir)?;

    if !apply(&mut settings, args)? {
        let text = toml::to_string_pretty(&settings)
            .map_err(|e| VaultError::Config(format!("Failed to serialize settings: {e}")))?;
        print!("{text}");
        return Ok(());
    }

    settings.save(&dir)?;
    output::success(&format!(
        "Saved {}",
        dir.join(Settings::FILE_NAME).display()
    ));
    Ok(())
}

/// Apply the given flags; returns whether anything changed.
fn apply(settings: &mut Settings, args: &ConfigArgs) -> Result<bool> {
    let mut changed = false;
    if let Some(on) = args.auto_lock {
        settings.auto_lock = on;
        changed = true;
    }
    if let Some(secs) = args.auto_lock_timeout {
        if secs == 0 {
            return Err(VaultError::ValidationError(
                "auto-lock timeout must be at least 1 second".into(),
            ));
        }
        settings.auto_lock_timeout_secs = secs;
        changed = true;
    }
    if let Some(size) = args.page_size {
        if size == 0 {
            return Err(VaultError::ValidationError("page size must be at least 1".into()));
        }
        settings.page_size = size;
        changed = true;
    }
    if let Some(mode) = args.storage_mode.as_deref() {
        settings.storage_mode = match mode.to_ascii_lowercase().as_str() {
            "hierarchical" => StorageMode::Hierarchical,
            "flat" => StorageMode::Flat,
            other => {
                return Err(VaultError::ValidationError(format!(
                    "unknown storage mode '{other}': use hierarchical or flat"
                )))
            }
        };
        changed = true;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConfigArgs {
        ConfigArgs {
            auto_lock: None,
            auto_lock_timeout: None,
            page_size: None,
            storage_mode: None,
        }
    }

    #[test]
    fn no_flags_changes_nothing() {
        let mut s = Settings::default();
        assert!(!apply(&mut s, &args()).unwrap());
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn flags_are_applied_and_validated() {
        let mut s = Settings::default();
        let a = ConfigArgs {
            auto_lock: Some(true),
            auto_lock_timeout: Some(60),
            storage_mode: Some("FLAT".into()),
            ..args()
        };
        assert!(apply(&mut s, &a).unwrap());
        assert!(s.auto_lock);
        assert_eq!(s.auto_lock_timeout_secs, 60);
        assert_eq!(s.storage_mode, StorageMode::Flat);

        let bad = ConfigArgs {
            page_size: Some(0),
            ..args()
        };
        assert!(apply(&mut s, &bad).is_err());
    }
}
