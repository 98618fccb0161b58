//! Request/response contracts for a presentation layer.
//!
//! Every function takes a [`Vault`] handle and returns `ApiResult`, whose
//! error side is the serializable `{ code, reason }` shape.  Inputs are
//! validated before they reach the engine.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::crypto::BiometricAssertion;
use crate::errors::{ApiError, VaultError};
use crate::model::{Account, CreateAccountRequest, Group, UpdateAccountRequest};
use crate::vault::{AppState, OtpCode, PagedResult, Vault};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// First-run request.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub password: String,
    #[serde(default)]
    pub vault_path: Option<PathBuf>,
}

impl fmt::Debug for InitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitRequest")
            .field("password", &"<redacted>")
            .field("vault_path", &self.vault_path)
            .finish()
    }
}

impl Drop for InitRequest {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// Page selector; `current` is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParam {
    pub current: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeResponse {
    pub code: String,
    /// Seconds until the code rotates; absent for HOTP.
    pub remaining: Option<u32>,
}

impl From<OtpCode> for CodeResponse {
    fn from(otp: OtpCode) -> Self {
        Self {
            code: otp.code,
            remaining: otp.remaining,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub ok: bool,
    pub version: &'static str,
    pub state: AppState,
}

fn api<T>(result: crate::errors::Result<T>) -> ApiResult<T> {
    result.map_err(ApiError::from)
}

pub fn init_app(vault: &Vault, request: &InitRequest) -> ApiResult<()> {
    if request.password.is_empty() {
        return Err(VaultError::ValidationError("password must not be empty".into()).into());
    }
    api(vault.initialize_at(request.vault_path.as_deref(), request.password.as_bytes()))
}

pub fn unlock_with_password(vault: &Vault, password: &str) -> ApiResult<()> {
    api(vault.unlock_with_password(password.as_bytes()))
}

pub fn unlock_with_biometric(vault: &Vault, assertion: &BiometricAssertion) -> ApiResult<()> {
    api(vault.unlock_with_biometric(assertion))
}

pub fn lock(vault: &Vault) -> ApiResult<()> {
    api(vault.lock())
}

pub fn app_state(vault: &Vault) -> ApiResult<AppState> {
    api(vault.app_state())
}

pub fn list_accounts(vault: &Vault, page: PageParam) -> ApiResult<PagedResult<Account>> {
    api(vault.list_accounts(page.current as usize, page.size as usize))
}

/// Add an account from an `otpauth://` URI.
pub fn add_account(vault: &Vault, auth_url: &str) -> ApiResult<Account> {
    api(vault.add_account(auth_url))
}

pub fn create_account(vault: &Vault, request: &CreateAccountRequest) -> ApiResult<Account> {
    api(vault.create_account(request))
}

pub fn update_account(vault: &Vault, request: &UpdateAccountRequest) -> ApiResult<Account> {
    api(vault.update_account(request))
}

pub fn remove_account(vault: &Vault, account_id: Uuid) -> ApiResult<()> {
    api(vault.remove(account_id).map(|_| ()))
}

/// Same as [`remove_account`].
pub fn delete_account(vault: &Vault, account_id: Uuid) -> ApiResult<()> {
    remove_account(vault, account_id)
}

pub fn get_code(vault: &Vault, account_id: Uuid) -> ApiResult<CodeResponse> {
    api(vault.code(account_id).map(CodeResponse::from))
}

pub fn commit_hotp(vault: &Vault, account_id: Uuid) -> ApiResult<Account> {
    api(vault.commit_hotp(account_id))
}

pub fn list_groups(vault: &Vault) -> ApiResult<Vec<Group>> {
    api(vault.list_groups())
}

pub fn list_tags(vault: &Vault) -> ApiResult<Vec<String>> {
    api(vault.list_tags())
}

pub fn export_backup(vault: &Vault, password: &str) -> ApiResult<Vec<u8>> {
    api(vault.export_backup(password.as_bytes()))
}

pub fn import_backup(vault: &Vault, backup: &[u8], password: &str) -> ApiResult<usize> {
    api(vault.import_backup(backup, password.as_bytes()))
}

/// Liveness check.  Never touches the session.
pub fn health_check(vault: &Vault) -> ApiResult<HealthStatus> {
    Ok(HealthStatus {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        state: app_state(vault)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::errors::ErrorCode;
    use tempfile::TempDir;

    fn vault(tmp: &TempDir) -> Vault {
        let settings = Settings {
            argon2_memory_kib: 8192,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            ..Settings::default()
        };
        Vault::open(settings, tmp.path())
    }

    fn init(vault: &Vault) {
        let request = InitRequest {
            password: "P1".into(),
            vault_path: None,
        };
        init_app(vault, &request).unwrap();
    }

    #[test]
    fn errors_carry_codes() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        let err = list_accounts(&vault, PageParam { current: 0, size: 10 }).unwrap_err();
        assert_eq!(err.code, ErrorCode::AppNotInitialized);

        init(&vault);
        lock(&vault).unwrap();
        let err = get_code(&vault, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code, ErrorCode::AppIsLocked);
    }

    #[test]
    fn add_account_from_uri_and_get_code() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        init(&vault);

        let account = add_account(
            &vault,
            "otpauth://totp/GitHub:me?secret=JBSWY3DPEHPK3PXP&issuer=GitHub",
        )
        .unwrap();
        let code = get_code(&vault, account.id).unwrap();
        assert_eq!(code.code.len(), 6);
        assert!(code.remaining.is_some());

        let err = add_account(&vault, "https://example.com").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn init_rejects_empty_password() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        let request = InitRequest {
            password: String::new(),
            vault_path: None,
        };
        assert_eq!(
            init_app(&vault, &request).unwrap_err().code,
            ErrorCode::ValidationError
        );
        assert!(format!("{request:?}").contains("redacted"));
    }

    #[test]
    fn health_check_works_while_locked() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        let health = health_check(&vault).unwrap();
        assert!(health.ok);
        assert!(health.state.is_locked);
    }

    #[test]
    fn custom_vault_path_survives_reload() {
        let tmp = TempDir::new().unwrap();
        let custom = tmp.path().join("elsewhere").join("my.avlt");
        let vault = vault(&tmp);
        let request = InitRequest {
            password: "P1".into(),
            vault_path: Some(custom.clone()),
        };
        init_app(&vault, &request).unwrap();
        let account = add_account(
            &vault,
            "otpauth://totp/GitHub:me?secret=JBSWY3DPEHPK3PXP&issuer=GitHub",
        )
        .unwrap();
        assert!(custom.exists());
        assert!(!tmp.path().join("vault.avlt").exists());
        drop(vault);

        let reloaded = Vault::load(tmp.path()).unwrap();
        let state = app_state(&reloaded).unwrap();
        assert!(state.is_initialized);
        assert_eq!(state.config.vault_path, custom);
        unlock_with_password(&reloaded, "P1").unwrap();
        let page = list_accounts(&reloaded, PageParam { current: 0, size: 10 }).unwrap();
        assert_eq!(page.data[0].id, account.id);

        // A second init must not create another vault.
        assert!(init_app(&reloaded, &request).is_err());
    }
}
