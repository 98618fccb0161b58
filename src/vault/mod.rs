//! Vault module: the encrypted container and the engine around it.
//!
//! This module provides:
//! - Binary container format with HMAC integrity (`format`)
//! - The decrypted payload in either storage layout (`payload`)
//! - `VaultStore`, the unlocked session with CRUD and persistence (`store`)
//! - Lock states, auto-lock timer and notifications (`state`)
//! - Password-protected backups (`backup`)
//! - `Vault`, the thread-safe handle callers use (`engine`)

pub mod backup;
pub mod engine;
pub mod format;
pub mod payload;
pub mod state;
pub mod store;

// Re-export the most commonly used items.
pub use engine::{AppConfig, AppState, Vault, VaultInfo};
pub use format::VaultHeader;
pub use payload::{AccountList, AccountStore, Payload};
pub use state::{LockReason, LockState, StateChange};
pub use store::{Credential, FieldInput, OtpCode, PagedResult, VaultStore};
