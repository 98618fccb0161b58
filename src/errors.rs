use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors that can occur in the vault engine.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Lifecycle errors ---
    #[error("App is not initialized, run `authvault init` first")]
    AppNotInitialized,

    #[error("Master key is not initialized: no vault exists yet")]
    MasterKeyNotInitialized,

    #[error("Vault already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("App is locked, unlock the vault first")]
    AppIsLocked,

    // --- Credential errors ---
    #[error("Invalid password")]
    InvalidPassword,

    #[error("Biometric authentication failed")]
    BiometricAuthFailed,

    #[error("Token expired")]
    TokenExpired,

    // --- Storage errors ---
    #[error("Database error: {0}")]
    DatabaseError(String),

    // --- Request errors ---
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- Auxiliary subsystems ---
    #[error("Audit error: {0}")]
    Audit(String),

    #[error("Keyring error: {0}")]
    Keyring(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Convenience type alias for vault results.
pub type Result<T> = std::result::Result<T, VaultError>;

/// The enumerated error kinds callers branch on.
///
/// Every `VaultError` folds onto exactly one code; the human-readable
/// reason travels separately in [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    AppNotInitialized,
    MasterKeyNotInitialized,
    AlreadyInitialized,
    AppIsLocked,
    InvalidPassword,
    BiometricAuthFailed,
    TokenExpired,
    DatabaseError,
    #[serde(alias = "RequestError")]
    ValidationError,
    NotFound,
    InvalidOperation,
    UnexpectedError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppNotInitialized => "AppNotInitialized",
            Self::MasterKeyNotInitialized => "MasterKeyNotInitialized",
            Self::AlreadyInitialized => "AlreadyInitialized",
            Self::AppIsLocked => "AppIsLocked",
            Self::InvalidPassword => "InvalidPassword",
            Self::BiometricAuthFailed => "BiometricAuthFailed",
            Self::TokenExpired => "TokenExpired",
            Self::DatabaseError => "DatabaseError",
            Self::ValidationError => "ValidationError",
            Self::NotFound => "NotFound",
            Self::InvalidOperation => "InvalidOperation",
            Self::UnexpectedError => "UnexpectedError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VaultError {
    /// Map this error onto the enumerated code set.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AppNotInitialized => ErrorCode::AppNotInitialized,
            Self::MasterKeyNotInitialized => ErrorCode::MasterKeyNotInitialized,
            Self::AlreadyInitialized(_) => ErrorCode::AlreadyInitialized,
            Self::AppIsLocked => ErrorCode::AppIsLocked,
            Self::InvalidPassword => ErrorCode::InvalidPassword,
            Self::BiometricAuthFailed => ErrorCode::BiometricAuthFailed,
            Self::TokenExpired => ErrorCode::TokenExpired,
            Self::DatabaseError(_) => ErrorCode::DatabaseError,
            Self::ValidationError(_) | Self::Config(_) => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidOperation(_) => ErrorCode::InvalidOperation,
            Self::EncryptionFailed(_)
            | Self::KeyDerivationFailed(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Audit(_)
            | Self::Keyring(_)
            | Self::CommandFailed(_)
            | Self::UserCancelled
            | Self::Unexpected(_) => ErrorCode::UnexpectedError,
        }
    }
}

/// Serializable error shape handed to the presentation layer:
/// `{ "code": "<kind>", "reason": "<human string>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub reason: String,
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        Self {
            code: err.code(),
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.reason)
    }
}

impl std::error::Error for ApiError {}
