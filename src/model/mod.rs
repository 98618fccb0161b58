//! Record model: the group/entry tree and the OTP account view over it.

pub mod account;
pub mod meta;
pub mod node;
pub mod otpauth;
pub mod times;
pub mod tree;
pub mod value;

pub use account::{Account, CreateAccountRequest, OtpAlgorithm, OtpType, UpdateAccountRequest};
pub use meta::{Association, AutoType, CustomData, CustomDataItem};
pub use node::{fields, Entry, Group, Node};
pub use otpauth::parse_otpauth;
pub use times::{TimeTag, Times};
pub use tree::Tree;
pub use value::{ProtectedValue, Value};
