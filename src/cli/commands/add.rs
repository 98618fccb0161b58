//! `authvault add`: add an account from fields or an otpauth:// URI.

use crate::cli::output;
use crate::cli::{audit, parse_id, prompt_password, unlock_vault, AddArgs, Cli};
use crate::errors::Result;
use crate::model::{parse_otpauth, CreateAccountRequest, OtpType};

/// Execute the `add` command.
pub fn execute(cli: &Cli, args: &AddArgs) -> Result<()> {
    // Build and validate the request before asking for the password.
    let request = match &args.uri {
        Some(uri) => parse_otpauth(uri)?,
        None => request_from_args(args)?,
    };

    let vault = unlock_vault(cli)?;
    let account = vault.create_account(&request)?;

    audit(cli, "add", Some(account.id), Some(&account.issuer));
    output::success(&format!(
        "Added {} ({}) as {}",
        account.issuer, account.label, account.id
    ));
    output::tip(&format!("Run `authvault code {}` to see its code.", account.id));

    Ok(())
}

fn request_from_args(args: &AddArgs) -> Result<CreateAccountRequest> {
    let secret = match &args.secret {
        Some(secret) => secret.clone(),
        None => prompt_password("Enter base32 secret")?.to_string(),
    };

    Ok(CreateAccountRequest {
        issuer: args.issuer.clone().unwrap_or_default(),
        label: args.label.clone().unwrap_or_default(),
        otp_type: if args.hotp { OtpType::Hotp } else { OtpType::Totp },
        algorithm: args.algorithm.parse()?,
        digits: args.digits,
        period: args.period,
        counter: args.counter,
        secret,
        icon: None,
        note: args.note.clone(),
        group_id: args.group.as_deref().map(parse_id).transpose()?,
    })
}
