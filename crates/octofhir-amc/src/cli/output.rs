//! Output formatting utilities

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_amc_diagnostics::AmcError;
use serde::Serialize;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use tabled::{Table, Tabled, settings::Style};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    Table,
}

impl OutputFormat {
    /// Parse a format name; unknown names fall back to `default`
    pub fn parse_or(name: Option<&str>, default: Self) -> Self {
        match name.map(str::to_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("pretty") | Some("json-pretty") => Self::JsonPretty,
            Some("table") => Self::Table,
            _ => default,
        }
    }
}

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(io::stdout().is_terminal()),
    }
}

/// Format an error for display
///
/// Engine errors are shown with their code and help text.
pub fn format_error(error: &anyhow::Error) -> String {
    let Some(amc) = error.chain().find_map(|cause| cause.downcast_ref::<AmcError>()) else {
        return format!("{} {:#}", "Error:".red().bold(), error);
    };

    let diagnostic = amc.to_diagnostic().render_colored();
    if error.to_string() == amc.to_string() {
        diagnostic
    } else {
        format!("{} {}\n{}", "Error:".red().bold(), error, diagnostic)
    }
}

/// Format a success message for display
pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        println!("{}", content);
    }
    Ok(())
}

/// Serialize a value as JSON
pub fn format_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")
    } else {
        serde_json::to_string(value).context("Failed to serialize JSON")
    }
}

/// Render rows as a table
pub fn format_table<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return "(empty)".to_string();
    }
    Table::new(rows).with(Style::modern()).to_string()
}
