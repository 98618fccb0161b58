pub mod api;
pub mod cli;
pub mod config;
pub mod crypto;
mod encoding;
pub mod errors;
pub mod model;
pub mod otp;
pub mod vault;

#[cfg(feature = "audit-log")]
pub mod audit;

#[cfg(feature = "keyring-store")]
pub mod keyring;
