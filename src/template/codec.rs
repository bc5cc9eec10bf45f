// ABOUTME: Converts stored execution results into canonical content and escaped literals
// ABOUTME: Table results flatten to CSV; substituted values escape for re-interpreted text

use super::error::{Result, TemplateError};
use crate::model::{ExecutionResult, TaggedResult};

/// Maximum characters a `.summary` form keeps before truncation.
const SUMMARY_MAX_CHARS: usize = 200;

pub struct ResultCodec;

impl ResultCodec {
    /// Canonical content of a result.
    ///
    /// Text yields its `text` field; tables flatten to CSV as
    /// `header\nrow1\nrow2…` with empty strings for missing cells;
    /// document/data and the legacy shape yield their `content` directly.
    pub fn content(result: &ExecutionResult) -> String {
        match result {
            ExecutionResult::Tagged(TaggedResult::Text { text }) => text.clone(),
            ExecutionResult::Tagged(TaggedResult::Table { columns, rows }) => {
                let mut lines = Vec::with_capacity(rows.len() + 1);
                lines.push(columns.join(","));
                for row in rows {
                    let cells: Vec<&str> = columns
                        .iter()
                        .map(|col| row.get(col).map(String::as_str).unwrap_or(""))
                        .collect();
                    lines.push(cells.join(","));
                }
                lines.join("\n")
            }
            ExecutionResult::Tagged(TaggedResult::Document { content, .. })
            | ExecutionResult::Tagged(TaggedResult::Data { content, .. }) => content.clone(),
            ExecutionResult::Legacy { content } => content.clone(),
        }
    }

    /// Truncated form of the canonical content.
    pub fn summary(result: &ExecutionResult) -> String {
        summarize(&Self::content(result))
    }

    /// The full structured result serialized as JSON, for `.output` macros.
    pub fn serialized(result: &ExecutionResult) -> Result<String> {
        serde_json::to_string(result).map_err(TemplateError::Json)
    }

    /// Escape a value for splicing into text that will itself be interpreted:
    /// backslashes, double quotes, and newlines become two-character escapes.
    pub fn escape(value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                other => out.push(other),
            }
        }
        out
    }

    /// Escaped value wrapped in double quotes, for string-literal positions.
    pub fn quoted_literal(value: &str) -> String {
        format!("\"{}\"", Self::escape(value))
    }
}

fn summarize(content: &str) -> String {
    if content.chars().count() <= SUMMARY_MAX_CHARS {
        return content.to_string();
    }
    let truncated: String = content.chars().take(SUMMARY_MAX_CHARS).collect();
    format!("{}…", truncated)
}
