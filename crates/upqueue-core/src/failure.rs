//! Failure message extraction.
//!
//! Transports report failures in several shapes: a bare message, a
//! structured error object, or a parsed server response that carries either
//! a batch-wide error or one entry per file. [`extract_failure_message`]
//! reduces all of them to the single string a user sees, in a fixed order:
//!
//! 1. plain transport message
//! 2. `message` of a structured error
//! 3. server batch error
//! 4. server per-file error at the file's position in the batch
//! 5. fallback
//!
//! Empty strings never match a step.

use serde::{Deserialize, Serialize};

/// Fallback when neither the transport nor the server said anything
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Fallback when the server answered without a usable error
pub const UNKNOWN_REMOTE_ERROR: &str = "Unknown remote error";

/// Error value handed over by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTransportError {
    /// Bare message, e.g. an HTTP status text
    Plain(String),
    /// Error object with an optional `message` field
    Structured {
        /// Human-readable message
        #[serde(default)]
        message: Option<String>,
    },
}

impl RawTransportError {
    /// Structured error carrying `message`
    #[must_use]
    pub fn structured(message: impl Into<String>) -> Self {
        RawTransportError::Structured {
            message: Some(message.into()),
        }
    }
}

impl From<&str> for RawTransportError {
    fn from(message: &str) -> Self {
        RawTransportError::Plain(message.to_string())
    }
}

impl From<String> for RawTransportError {
    fn from(message: String) -> Self {
        RawTransportError::Plain(message)
    }
}

/// Server response body for a failed batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Error that applies to the whole batch
    #[serde(default)]
    pub error: Option<String>,
    /// Per-file outcomes, in batch order
    #[serde(default)]
    pub files: Vec<FileOutcome>,
}

impl BatchResult {
    /// Result carrying a batch-wide error
    #[must_use]
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            files: Vec::new(),
        }
    }

    /// Result carrying one outcome per file
    #[must_use]
    pub fn with_files(files: Vec<FileOutcome>) -> Self {
        Self { error: None, files }
    }
}

/// Server outcome for one file of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// Error reported for this file
    #[serde(default)]
    pub error: Option<String>,
}

impl FileOutcome {
    /// Outcome carrying an error
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// Pick the message to show for the file at `index` of a failed batch
#[must_use]
pub fn extract_failure_message(
    error: Option<&RawTransportError>,
    result: Option<&BatchResult>,
    index: usize,
) -> String {
    let transport_message = match error {
        Some(RawTransportError::Plain(message)) => non_empty(Some(message)),
        Some(RawTransportError::Structured { message }) => non_empty(message.as_ref()),
        None => None,
    };
    if let Some(message) = transport_message {
        return message.to_string();
    }

    let Some(result) = result else {
        return UNKNOWN_ERROR.to_string();
    };

    non_empty(result.error.as_ref())
        .or_else(|| {
            result
                .files
                .get(index)
                .and_then(|outcome| non_empty(outcome.error.as_ref()))
        })
        .unwrap_or(UNKNOWN_REMOTE_ERROR)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message_wins() {
        let error = RawTransportError::from("Y");
        let result = BatchResult::with_error("batch");
        assert_eq!(extract_failure_message(Some(&error), Some(&result), 0), "Y");
    }

    #[test]
    fn test_structured_message() {
        let error = RawTransportError::structured("X");
        let result = BatchResult::with_error("batch");
        assert_eq!(extract_failure_message(Some(&error), Some(&result), 0), "X");
    }

    #[test]
    fn test_structured_without_message_falls_through() {
        let error = RawTransportError::Structured { message: None };
        let result = BatchResult::with_error("quota exceeded");
        assert_eq!(
            extract_failure_message(Some(&error), Some(&result), 0),
            "quota exceeded"
        );
    }

    #[test]
    fn test_empty_plain_message_falls_through() {
        let error = RawTransportError::from("");
        assert_eq!(extract_failure_message(Some(&error), None, 0), UNKNOWN_ERROR);
    }

    #[test]
    fn test_batch_error_before_per_file_error() {
        let result = BatchResult {
            error: Some("batch rejected".to_string()),
            files: vec![FileOutcome::failed("too large")],
        };
        assert_eq!(extract_failure_message(None, Some(&result), 0), "batch rejected");
    }

    #[test]
    fn test_per_file_error_by_index() {
        let result = BatchResult::with_files(vec![
            FileOutcome::default(),
            FileOutcome::failed("bad type"),
        ]);
        assert_eq!(extract_failure_message(None, Some(&result), 1), "bad type");
        assert_eq!(
            extract_failure_message(None, Some(&result), 0),
            UNKNOWN_REMOTE_ERROR
        );
        assert_eq!(
            extract_failure_message(None, Some(&result), 5),
            UNKNOWN_REMOTE_ERROR
        );
    }

    #[test]
    fn test_fallback() {
        assert_eq!(extract_failure_message(None, None, 0), UNKNOWN_ERROR);
    }

    #[test]
    fn test_deserialize_shapes() {
        let plain: RawTransportError = serde_json::from_str(r#""timeout""#).unwrap();
        assert_eq!(plain, RawTransportError::Plain("timeout".to_string()));

        let structured: RawTransportError =
            serde_json::from_str(r#"{"message":"X","code":7}"#).unwrap();
        assert_eq!(structured, RawTransportError::structured("X"));

        let result: BatchResult =
            serde_json::from_str(r#"{"files":[{"name":"a.txt","error":"too big"}]}"#).unwrap();
        assert_eq!(extract_failure_message(None, Some(&result), 0), "too big");
    }
}
