//! `authvault groups` and `authvault tags`.

use crate::cli::output;
use crate::cli::{unlock_vault, Cli};
use crate::errors::Result;

/// Execute the `groups` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let vault = unlock_vault(cli)?;
    output::print_groups_table(&vault.list_groups()?);
    Ok(())
}

/// Execute the `tags` command.
pub fn execute_tags(cli: &Cli) -> Result<()> {
    let vault = unlock_vault(cli)?;
    let tags = vault.list_tags()?;
    if tags.is_empty() {
        output::info("No tags.");
    }
    for tag in tags {
        println!("{tag}");
    }
    Ok(())
}
