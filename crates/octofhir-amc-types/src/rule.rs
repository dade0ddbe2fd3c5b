//! Rule identity

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A measure rule as stored in the rule table
///
/// Only the id is interpreted by the evaluator. The raw definition is kept
/// for report factories that build their filters from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default, rename = "definition")]
    pub raw_definition: Value,
}

impl Rule {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_definition: Value::Null,
        }
    }

    pub fn with_definition(mut self, definition: Value) -> Self {
        self.raw_definition = definition;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}
