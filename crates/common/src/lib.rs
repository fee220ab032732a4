//! Shared error taxonomy and constants used across all crosstalk crates.

pub mod error;

pub use error::{Error, Result};

/// Program identity used for webhook names and remote-file external ids.
pub const PROGRAM_NAME: &str = "crosstalk";
