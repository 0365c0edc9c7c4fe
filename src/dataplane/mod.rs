//! Vault data-plane module
//!
//! Keys and secrets inside an already provisioned vault.

pub mod models;
pub mod operations;

pub use models::*;
pub use operations::*;
