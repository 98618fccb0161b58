//! `authvault status`: show what is on disk without unlocking.

use console::style;

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::Result;
use crate::vault::format::read_vault;

/// Execute the `status` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let vault = open_vault(cli)?;
    let state = vault.app_state()?;
    let path = &state.config.vault_path;

    if !state.is_initialized {
        output::info(&format!("No vault at {}", path.display()));
        output::tip("Run `authvault init` to create one.");
        return Ok(());
    }

    // The header is readable without any key.
    let raw = read_vault(path)?;
    let header = &raw.header;
    let settings = &state.config.settings;

    println!("{} {}", style("Vault:").bold(), path.display());
    println!("  layout        {}", header.storage_mode);
    println!("  created       {}", header.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "  argon2id      {} KiB, {} pass(es), {} lane(s)",
        header.kdf.memory_kib, header.kdf.iterations, header.kdf.parallelism
    );
    println!(
        "  biometric     {}",
        if header.biometric.is_some() { "enabled" } else { "disabled" }
    );
    match settings.auto_lock_timeout() {
        Some(timeout) => println!("  auto-lock     after {}s idle", timeout.as_secs()),
        None => println!("  auto-lock     off"),
    }

    Ok(())
}
