use shared::{error::ApiError, protocol::InventoryEntry};

use crate::gateway::GatewayError;

/// Result of one completed scan dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    EntryUpdated(InventoryEntry),
    /// The last unit was removed and the server deleted the entry.
    EntryDeleted(String),
    Failed(String),
}

impl OperationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Turns a gateway failure into the message shown to the operator.
pub fn failure_message(err: &GatewayError) -> String {
    match err {
        GatewayError::Rejected { status, body } => match ApiError::parse(body) {
            Ok(ApiError {
                message: Some(message),
                ..
            }) => message,
            Ok(_) | Err(_) => server_error_message(*status),
        },
        GatewayError::MalformedBody { status, .. } => server_error_message(*status),
        GatewayError::Transport(description) => format!("Network error: {description}"),
    }
}

fn server_error_message(status: u16) -> String {
    format!("Server error {status}")
}
