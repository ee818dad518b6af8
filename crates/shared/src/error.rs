use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the inventory backend. Both fields are optional on
/// the wire; older deployments send `{}` for some failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: Some(message.into()),
        }
    }

    /// Parses an error body. Anything that is not a JSON object with the
    /// expected field types is rejected.
    pub fn parse(body: &str) -> Result<Self, ApiErrorParseError> {
        serde_json::from_str(body).map_err(|err| ApiErrorParseError(err.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("malformed error payload: {0}")]
pub struct ApiErrorParseError(pub String);
