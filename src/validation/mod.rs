//! Validation helpers
//!
//! - Path validation (normalization, case-insensitive matching, protected roots)

pub mod path;

pub use path::*;

// vim: ts=4
