//! `authvault update`: change fields of an account.

use crate::cli::output;
use crate::cli::{audit, parse_id, prompt_password, unlock_vault, Cli, UpdateArgs};
use crate::errors::{Result, VaultError};
use crate::model::UpdateAccountRequest;

/// Execute the `update` command.
pub fn execute(cli: &Cli, args: &UpdateArgs) -> Result<()> {
    let mut request = UpdateAccountRequest::new(parse_id(&args.id)?);
    request.issuer = args.issuer.clone();
    request.label = args.label.clone();
    request.algorithm = args.algorithm.as_deref().map(str::parse).transpose()?;
    request.digits = args.digits;
    request.period = args.period;
    request.counter = args.counter;
    request.note = args.note.clone();
    request.secret = match args.secret.as_deref() {
        Some("") => Some(prompt_password("Enter new base32 secret")?.to_string()),
        other => other.map(str::to_string),
    };

    if request.issuer.is_none()
        && request.label.is_none()
        && request.algorithm.is_none()
        && request.digits.is_none()
        && request.period.is_none()
        && request.counter.is_none()
        && request.note.is_none()
        && request.secret.is_none()
    {
        return Err(VaultError::ValidationError("nothing to update".into()));
    }

    let vault = unlock_vault(cli)?;
    let account = vault.update_account(&request)?;

    audit(cli, "update", Some(account.id), None);
    output::success(&format!("Updated {} ({})", account.issuer, account.label));

    Ok(())
}
