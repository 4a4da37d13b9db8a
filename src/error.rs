//! Structured error types for the formprint renderer.
//!
//! Only invalid options and dependency failures abort a render. Content anomalies (bad branching
//! expressions, missing images, unmappable characters) are logged and
//! replaced with safe defaults by the layout engine and never show up here.

use thiserror::Error;

/// The unified error type returned by all public formprint API functions.
#[derive(Debug, Error)]
pub enum RenderError {
    /// JSON input failed to parse as a valid export document.
    #[error("Failed to parse export: {source}{}", hint_suffix(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },
    /// Render options describe a page nothing can be laid out on.
    #[error("Invalid geometry: {0}")]
    Geometry(String),
    /// The schema provider could not supply the field list.
    #[error("Schema provider failed: {0}")]
    Schema(String),
    /// The data provider could not supply record values.
    #[error("Data provider failed for record '{record}': {reason}")]
    Data { record: String, reason: String },
    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// PDF serialization failed.
    #[error("PDF error: {0}")]
    Pdf(String),
}

/// Errors reported by an [`ImageStore`](crate::services::ImageStore).
/// Always recoverable: the engine skips the image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image '{0}' not found")]
    NotFound(String),
    #[error("image '{id}' could not be materialised: {reason}")]
    Fetch { id: String, reason: String },
    #[error("unsupported image format: {0}")]
    Unsupported(String),
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the export schema. Check field names and element types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        RenderError::Parse { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_hint() {
        let err: RenderError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to parse export"));
        assert!(msg.contains("Hint: Check for trailing commas"));
    }

    #[test]
    fn data_error_names_record() {
        let err = RenderError::Data {
            record: "101".to_string(),
            reason: "connection reset".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Data provider failed for record '101': connection reset"
        );
    }
}
