// ABOUTME: Stored execution results as a tagged union plus a legacy untagged shape
// ABOUTME: Created once by the executor on completion, immutable afterward

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The structured result a completed task leaves behind.
///
/// Current rows carry a `kind`-tagged union; rows written before the tag
/// existed are a bare `{ "content": ... }` object. Deserialization tries the
/// tagged shape first so a legacy object with an unrelated `kind` key cannot
/// shadow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionResult {
    Tagged(TaggedResult),
    Legacy { content: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaggedResult {
    Text {
        text: String,
    },
    Table {
        columns: Vec<String>,
        rows: Vec<HashMap<String, String>>,
    },
    Document {
        content: String,
        #[serde(
            rename = "subType",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        sub_type: Option<String>,
    },
    Data {
        content: String,
        #[serde(
            rename = "subType",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        sub_type: Option<String>,
    },
}

impl ExecutionResult {
    pub fn text(text: impl Into<String>) -> Self {
        ExecutionResult::Tagged(TaggedResult::Text { text: text.into() })
    }

    pub fn table(columns: Vec<String>, rows: Vec<HashMap<String, String>>) -> Self {
        ExecutionResult::Tagged(TaggedResult::Table { columns, rows })
    }

    pub fn document(content: impl Into<String>, sub_type: Option<String>) -> Self {
        ExecutionResult::Tagged(TaggedResult::Document {
            content: content.into(),
            sub_type,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionResult::Tagged(TaggedResult::Text { .. }) => "text",
            ExecutionResult::Tagged(TaggedResult::Table { .. }) => "table",
            ExecutionResult::Tagged(TaggedResult::Document { .. }) => "document",
            ExecutionResult::Tagged(TaggedResult::Data { .. }) => "data",
            ExecutionResult::Legacy { .. } => "legacy",
        }
    }
}
