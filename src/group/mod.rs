//! Resource group module
//!
//! Create and delete the resource group that contains the vault.

pub mod models;
pub mod operations;

pub use models::*;
pub use operations::*;
