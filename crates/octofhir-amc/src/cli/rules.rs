//! Rules command implementation

use super::output::{self, OutputFormat};
use anyhow::Result;
use octofhir_amc_eval::Criterion;
use octofhir_amc_types::ObjectTypeTag;
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

/// Configuration for rules command
pub struct RulesArgs {
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct ObjectTypeRow {
    #[tabled(rename = "Object type")]
    pub name: &'static str,
    #[tabled(rename = "Counted as")]
    pub counted_as: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct Listing {
    object_types: Vec<ObjectTypeRow>,
    criteria: Vec<&'static str>,
}

pub fn object_types() -> Vec<ObjectTypeRow> {
    ObjectTypeTag::ALL
        .iter()
        .map(|tag| ObjectTypeRow {
            name: tag.as_str(),
            counted_as: if tag.is_patients() {
                "subjects"
            } else {
                "collected objects"
            },
        })
        .collect()
}

/// List what rule definitions may use
pub fn list(args: RulesArgs) -> Result<()> {
    let listing = Listing {
        object_types: object_types(),
        criteria: Criterion::KINDS.to_vec(),
    };

    let content = match OutputFormat::parse_or(args.output_format.as_deref(), OutputFormat::Table) {
        OutputFormat::Json => output::format_json(&listing, false)?,
        OutputFormat::JsonPretty => output::format_json(&listing, true)?,
        OutputFormat::Table => format!(
            "{}\n\nCriteria: {}",
            output::format_table(&listing.object_types),
            listing.criteria.join(", ")
        ),
    };
    output::write_output(&content, args.output_file.as_deref())
}
