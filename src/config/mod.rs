//! Configuration management module
//!
//! Workflow identifiers read from the environment, their validation, and
//! the optional tuning of a run.

pub mod settings;

pub use settings::*;
