//! One module per subcommand.  Each exposes an `execute` function.

pub mod add;
pub mod audit_cmd;
pub mod auth;
pub mod code;
pub mod commit;
pub mod completions;
pub mod config_cmd;
pub mod export;
pub mod groups;
pub mod import_cmd;
pub mod init;
pub mod list;
pub mod passwd;
pub mod remove;
pub mod status;
pub mod update;
