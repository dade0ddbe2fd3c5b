//! AMC diagnostics and error handling
//!
//! This crate provides the error handling infrastructure shared by the AMC
//! crates: structured error codes, the [`AmcError`] taxonomy and diagnostic
//! reporting.

mod error;
mod error_code;

pub use error::*;
pub use error_code::*;

/// Result type for AMC operations
pub type AmcResult<T> = std::result::Result<T, AmcError>;
