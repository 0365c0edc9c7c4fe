//! kv-provision - Azure Key Vault provisioning workflow
//!
//! Authenticates a service principal, provisions a resource group and a
//! Key Vault, exercises the vault's key and secret operations, extends its
//! access policy to a second principal and finally tears everything down.

pub mod arm;
pub mod auth;
pub mod cli;
pub mod config;
pub mod dataplane;
pub mod error;
pub mod group;
pub mod utils;
pub mod vault;
pub mod workflow;

// Re-export commonly used types
pub use error::{ProvisionError, Result};
