//! `authvault list`: display one page of accounts in a table.

use crate::cli::output;
use crate::cli::{unlock_vault, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `list` command.  `page` is 1-based.
pub fn execute(cli: &Cli, page: usize, size: Option<usize>) -> Result<()> {
    if page == 0 {
        return Err(VaultError::ValidationError("pages start at 1".into()));
    }
    let vault = unlock_vault(cli)?;
    let size = size.unwrap_or(vault.settings()?.page_size);

    let result = vault.list_accounts(page - 1, size)?;
    output::print_accounts_table(&result, page, size);

    Ok(())
}
