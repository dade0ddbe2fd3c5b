//! AMC error codes following a structured numbering system
//!
//! Error code ranges:
//! - AMC0100-AMC0199: Configuration errors (fatal, raised before or at run start)
//! - AMC0200-AMC0299: Data access errors (population, objects, itemization)
//! - AMC0300-AMC0399: Computation errors (reserved)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Check if this is a configuration error (0100-0199)
    pub const fn is_configuration_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is a data access error (0200-0299)
    pub const fn is_data_access_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Check if this is a computation error (0300-0399)
    pub const fn is_computation_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AMC{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Configuration errors (0100-0199)
    map.insert(100, ErrorInfo::new("Configuration error"));
    map.insert(101, ErrorInfo::new("Unknown object type")
        .with_help("Object types are: patients, transitions-in, transitions-out, encounters, \
                    encounters_office_visit, cpoe_medications, prescriptions, labs, image_orders, \
                    lab_radiology, cpoe_lab_orders, med_orders, lab_orders"));
    map.insert(102, ErrorInfo::new("Object type has no collection query")
        .with_help("Subjects are counted directly; only attached object types are collected"));
    map.insert(103, ErrorInfo::new("Unknown rule")
        .with_help("Register the rule with the report registry before evaluating it"));
    map.insert(104, ErrorInfo::new("Invalid report definition"));
    map.insert(105, ErrorInfo::new("Invalid measurement period"));

    // Data access errors (0200-0299)
    map.insert(200, ErrorInfo::new("Data access failed"));
    map.insert(201, ErrorInfo::new("Query failed"));
    map.insert(202, ErrorInfo::new("Subject not found"));
    map.insert(203, ErrorInfo::new("Missing birth date")
        .with_help("Provide a measurement period start or record the subject's date of birth"));
    map.insert(204, ErrorInfo::new("Malformed record"));
    map.insert(205, ErrorInfo::new("Itemization write failed"));

    // Computation errors (0300-0399)
    map.insert(300, ErrorInfo::new("Computation failed"));

    map
});

// Configuration errors
pub const AMC0100: ErrorCode = ErrorCode::new(100);
pub const AMC0101: ErrorCode = ErrorCode::new(101);
pub const AMC0102: ErrorCode = ErrorCode::new(102);
pub const AMC0103: ErrorCode = ErrorCode::new(103);
pub const AMC0104: ErrorCode = ErrorCode::new(104);
pub const AMC0105: ErrorCode = ErrorCode::new(105);

// Data access errors
pub const AMC0200: ErrorCode = ErrorCode::new(200);
pub const AMC0201: ErrorCode = ErrorCode::new(201);
pub const AMC0202: ErrorCode = ErrorCode::new(202);
pub const AMC0203: ErrorCode = ErrorCode::new(203);
pub const AMC0204: ErrorCode = ErrorCode::new(204);
pub const AMC0205: ErrorCode = ErrorCode::new(205);

// Computation errors
pub const AMC0300: ErrorCode = ErrorCode::new(300);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(AMC0101.to_string(), "AMC0101");
        assert_eq!(AMC0203.to_string(), "AMC0203");
    }

    #[test]
    fn test_error_categories() {
        assert!(AMC0101.is_configuration_error());
        assert!(!AMC0101.is_data_access_error());

        assert!(AMC0201.is_data_access_error());
        assert!(!AMC0201.is_configuration_error());

        assert!(AMC0300.is_computation_error());
    }

    #[test]
    fn test_error_info() {
        assert_eq!(AMC0102.info().description, "Object type has no collection query");
        assert!(AMC0203.info().help.is_some());
        assert_eq!(ErrorCode::new(999).info().description, "Unknown error");
    }
}
