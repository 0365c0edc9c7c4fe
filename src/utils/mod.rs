//! Utility functions module
//!
//! HTTP client construction, error classification, resource naming and
//! console output helpers.

pub mod format;
pub mod helpers;
pub mod interactive;
pub mod network;

pub use format::*;
pub use helpers::*;
pub use interactive::*;
pub use network::*;
