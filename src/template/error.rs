// ABOUTME: Error types for result encoding and macro resolution
// ABOUTME: Unresolved macro tokens are not errors; they surface as structured data instead

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("failed to serialize execution result: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
