//! Authentication module for Azure services
//!
//! This module provides the identity provider used for both the management
//! plane and the vault data plane, the management-plane session, and the
//! challenge/response adapter used by vault data-plane requests.

pub mod challenge;
pub mod provider;
pub mod session;

pub use challenge::*;
pub use provider::*;
pub use session::*;
