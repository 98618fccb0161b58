//! `otpauth://` provisioning URIs, as encoded in authenticator QR codes.
//!
//! ```text
//! otpauth://totp/ACME%20Co:john@example.com?secret=JBSWY3DPEHPK3PXP&issuer=ACME%20Co&period=30
//! ```

use percent_encoding::percent_decode_str;
use url::Url;

use crate::errors::{Result, VaultError};

use super::account::{CreateAccountRequest, OtpType, DEFAULT_DIGITS, DEFAULT_PERIOD};

fn invalid(msg: impl Into<String>) -> VaultError {
    VaultError::ValidationError(msg.into())
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(format!("otpauth parameter '{name}' is not a number: {raw}")))
}

/// Parse a provisioning URI into a create request.
///
/// The label may carry an `Issuer:` prefix; an explicit non-empty
/// `issuer` parameter takes precedence over it.  The result is not yet
/// validated beyond what parsing needs; `CreateAccountRequest::build`
/// does that.
pub fn parse_otpauth(uri: &str) -> Result<CreateAccountRequest> {
    let url = Url::parse(uri.trim()).map_err(|e| invalid(format!("invalid otpauth URI: {e}")))?;
    if !url.scheme().eq_ignore_ascii_case("otpauth") {
        return Err(invalid(format!(
            "expected an otpauth:// URI, got scheme '{}'",
            url.scheme()
        )));
    }

    let otp_type: OtpType = url
        .host_str()
        .ok_or_else(|| invalid("otpauth URI is missing the type (totp or hotp)"))?
        .parse()?;

    let raw_label = url.path().trim_start_matches('/');
    let label = percent_decode_str(raw_label)
        .decode_utf8()
        .map_err(|_| invalid("otpauth label is not valid UTF-8"))?;
    let (label_issuer, label) = match label.split_once(':') {
        Some((issuer, account)) => (Some(issuer.trim().to_string()), account.trim().to_string()),
        None => (None, label.trim().to_string()),
    };

    let mut request = CreateAccountRequest {
        label,
        otp_type,
        digits: DEFAULT_DIGITS,
        ..CreateAccountRequest::default()
    };
    let mut issuer_param = None;
    let mut secret = None;

    for (key, value) in url.query_pairs() {
        match key.to_ascii_lowercase().as_str() {
            "secret" => secret = Some(value.into_owned()),
            "issuer" => issuer_param = Some(value.trim().to_string()),
            "algorithm" => request.algorithm = value.parse()?,
            "digits" => request.digits = parse_number("digits", &value)?,
            "period" => request.period = Some(parse_number("period", &value)?),
            "counter" => request.counter = Some(parse_number("counter", &value)?),
            _ => {}
        }
    }

    request.secret = secret.ok_or_else(|| invalid("otpauth URI has no secret"))?;
    request.issuer = issuer_param
        .filter(|i| !i.is_empty())
        .or(label_issuer)
        .unwrap_or_default();

    match otp_type {
        OtpType::Totp => {
            request.counter = None;
            request.period = Some(request.period.unwrap_or(DEFAULT_PERIOD));
        }
        OtpType::Hotp => {
            request.period = None;
            request.counter = Some(request.counter.unwrap_or(0));
        }
    }

    Ok(request)
}
