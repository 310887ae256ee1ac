use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::executor::{ErrorDescriptor, RawResponse};

/// The service rejected a command but answered with a well-formed envelope.
///
/// Both the command and the raw response are kept, so callers can inspect
/// partial effects (e.g. `status.insertedIds` of a partially applied batch).
#[derive(Debug, Clone, PartialEq)]
pub struct DataApiResponseError {
    command: Value,
    raw_response: RawResponse,
}

/// Structured error information, intended to be serialized to JSON and
/// consumed by other components (e.g. logging, APIs).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub(crate) codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl DataApiResponseError {
    pub fn new(command: Value, raw_response: RawResponse) -> Self {
        Self {
            command,
            raw_response,
        }
    }

    /// The command as it was sent
    pub fn command(&self) -> &Value {
        &self.command
    }

    /// Name of the command as it was sent, e.g. `insertMany`
    pub fn command_name(&self) -> Option<&str> {
        self.command
            .as_object()
            .and_then(|obj| obj.keys().next())
            .map(String::as_str)
    }

    /// The full response the service returned
    pub fn raw_response(&self) -> &RawResponse {
        &self.raw_response
    }

    /// Individual errors reported by the service
    pub fn error_descriptors(&self) -> &[ErrorDescriptor] {
        self.raw_response.error_descriptors()
    }

    /// Reported error codes, in order
    pub fn error_codes(&self) -> Vec<String> {
        self.error_descriptors()
            .iter()
            .filter_map(|d| d.error_code.clone())
            .collect()
    }

    /// Message of the first reported error
    pub fn message(&self) -> &str {
        self.error_descriptors()
            .iter()
            .find_map(|d| d.message.as_deref())
            .unwrap_or("Command failed")
    }

    /// Structured summary of this error
    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo {
            error_type: Some("dataapi.response_error".to_string()),
            command: self.command_name().map(str::to_string),
            codes: self.error_codes(),
            message: Some(self.message().to_string()),
        }
    }
}

impl ErrorInfo {
    /// Convert error info to pretty-printed JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for DataApiResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.command_name().unwrap_or("command");
        let count = self.error_descriptors().len();
        match self.error_codes().first() {
            Some(code) => write!(f, "{name} failed: {code}: {}", self.message())?,
            None => write!(f, "{name} failed: {}", self.message())?,
        }
        if count > 1 {
            write!(f, " (+{} more error(s))", count - 1)?;
        }
        Ok(())
    }
}
