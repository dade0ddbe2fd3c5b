//! AMC error types

use crate::{
    AMC0100, AMC0101, AMC0102, AMC0103, AMC0104, AMC0105, AMC0200, AMC0201, AMC0202, AMC0203,
    AMC0204, AMC0205, ErrorCode,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Error - the evaluation cannot proceed
    Error,
    /// Warning - potential issue but can continue
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional help text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context or help
    pub help: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            help: None,
        }
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            help: None,
        }
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render with terminal colors
    #[cfg(feature = "colored")]
    pub fn render_colored(&self) -> String {
        use colored::Colorize;

        let head = match self.severity {
            Severity::Error => format!("{}[{}]", self.severity, self.code).red().bold(),
            Severity::Warning => format!("{}[{}]", self.severity, self.code).yellow().bold(),
        };
        let mut out = format!("{}: {}", head, self.message);
        if let Some(help) = &self.help {
            out.push_str(&format!("\n  {} {}", "help:".cyan().bold(), help));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(help) = &self.help {
            write!(f, " ({})", help)?;
        }
        Ok(())
    }
}

/// Main AMC error type
///
/// Every variant is fatal for the evaluation run that raised it: no result
/// aggregate is emitted once one of these has been returned.
#[derive(Debug, Clone, Error)]
pub enum AmcError {
    /// The run is misconfigured (unknown object type, unknown rule, bad period)
    #[error("{code}: {message}")]
    Configuration {
        code: ErrorCode,
        message: String,
        context: Option<String>,
    },

    /// The population, a candidate object or an itemization write failed
    #[error("{code}: {message}")]
    DataAccess {
        code: ErrorCode,
        message: String,
        subject_id: Option<String>,
        context: Option<String>,
    },

    /// Reserved for computations that cannot produce a defined value
    #[error("{code}: {message}")]
    Computation {
        code: ErrorCode,
        message: String,
        context: Option<String>,
    },
}

impl AmcError {
    /// Create a configuration error
    pub fn configuration(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Configuration {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Create a data access error
    pub fn data_access(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::DataAccess {
            code,
            message: message.into(),
            subject_id: None,
            context: None,
        }
    }

    /// Create a computation error
    pub fn computation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Computation {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Unrecognized object type name
    pub fn unknown_object_type(name: impl fmt::Display) -> Self {
        Self::configuration(AMC0101, format!("Unknown object type '{}'", name))
    }

    /// Object type that cannot be collected from the store
    pub fn no_collection_query(tag: impl fmt::Display) -> Self {
        Self::configuration(
            AMC0102,
            format!("Object type '{}' has no collection query", tag),
        )
    }

    /// Rule id with no registered report
    pub fn unknown_rule(rule_id: impl fmt::Display) -> Self {
        Self::configuration(AMC0103, format!("No report registered for rule '{}'", rule_id))
    }

    /// Report definition that cannot be built
    pub fn invalid_definition(rule_id: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::configuration(
            AMC0104,
            format!("Invalid definition for rule '{}': {}", rule_id, message),
        )
    }

    /// Measurement period that cannot be parsed
    pub fn invalid_period(message: impl Into<String>) -> Self {
        Self::configuration(AMC0105, message)
    }

    /// Generic configuration failure
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::configuration(AMC0100, message)
    }

    /// Generic data access failure
    pub fn data_access_failed(message: impl Into<String>) -> Self {
        Self::data_access(AMC0200, message)
    }

    /// Query executor failure
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::data_access(AMC0201, message)
    }

    /// Subject id missing from the store
    pub fn subject_not_found(subject_id: impl Into<String>) -> Self {
        let subject_id = subject_id.into();
        Self::DataAccess {
            code: AMC0202,
            message: format!("Subject '{}' not found", subject_id),
            subject_id: Some(subject_id),
            context: None,
        }
    }

    /// Subject without birth date where the period start defaults to it
    pub fn missing_birth_date(subject_id: impl Into<String>) -> Self {
        let subject_id = subject_id.into();
        Self::DataAccess {
            code: AMC0203,
            message: format!(
                "Subject '{}' has no date of birth and the period has no start",
                subject_id
            ),
            subject_id: Some(subject_id),
            context: None,
        }
    }

    /// Store row that does not have the expected shape
    pub fn malformed_row(message: impl Into<String>) -> Self {
        Self::data_access(AMC0204, message)
    }

    /// Durable itemization write failure
    pub fn itemization_failed(message: impl Into<String>) -> Self {
        Self::data_access(AMC0205, message)
    }

    /// Attach the subject being processed (data access errors only)
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        if let Self::DataAccess { subject_id, .. } = &mut self {
            if subject_id.is_none() {
                *subject_id = Some(subject.into());
            }
        }
        self
    }

    /// Attach free-form context
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        match &mut self {
            Self::Configuration { context, .. }
            | Self::DataAccess { context, .. }
            | Self::Computation { context, .. } => *context = Some(ctx.into()),
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration { code, .. } => *code,
            Self::DataAccess { code, .. } => *code,
            Self::Computation { code, .. } => *code,
        }
    }

    /// Subject the error relates to, if any
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Self::DataAccess { subject_id, .. } => subject_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_data_access(&self) -> bool {
        matches!(self, Self::DataAccess { .. })
    }

    pub fn is_computation(&self) -> bool {
        matches!(self, Self::Computation { .. })
    }

    /// Convert to a diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        let (code, message, context) = match self {
            Self::Configuration { code, message, context }
            | Self::Computation { code, message, context } => (*code, message.clone(), context),
            Self::DataAccess { code, message, subject_id, context } => {
                let message = match subject_id {
                    Some(id) if !message.contains(id.as_str()) => {
                        format!("{} (subject {})", message, id)
                    }
                    _ => message.clone(),
                };
                (*code, message, context)
            }
        };

        let mut diag = Diagnostic::error(code, message);
        if let Some(ctx) = context {
            diag = diag.with_help(ctx.clone());
        } else if let Some(help) = code.info().help {
            diag = diag.with_help(help);
        }
        diag
    }
}

/// Builder for creating AMC errors with fluent API
pub struct ErrorBuilder {
    code: ErrorCode,
    message: String,
    subject_id: Option<String>,
    context: Option<String>,
}

impl ErrorBuilder {
    /// Create a new error builder
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            subject_id: None,
            context: None,
        }
    }

    /// Set the subject being processed
    pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Add context information
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Build a configuration error
    pub fn configuration(self) -> AmcError {
        AmcError::Configuration {
            code: self.code,
            message: self.message,
            context: self.context,
        }
    }

    /// Build a data access error
    pub fn data_access(self) -> AmcError {
        AmcError::DataAccess {
            code: self.code,
            message: self.message,
            subject_id: self.subject_id,
            context: self.context,
        }
    }

    /// Build a computation error
    pub fn computation(self) -> AmcError {
        AmcError::Computation {
            code: self.code,
            message: self.message,
            context: self.context,
        }
    }
}
