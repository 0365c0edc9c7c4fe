//! Vault management module
//!
//! This module provides management-plane operations on Azure Key Vaults,
//! including creation, access-policy updates and deletion.

pub mod models;
pub mod operations;

pub use models::*;
pub use operations::*;
