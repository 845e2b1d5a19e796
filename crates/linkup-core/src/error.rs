use crate::constants::alerts;
use crate::events::Alert;

/// Errors surfaced by the client core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// A fetch or mutation request did not complete
    #[error("Network error: {message}")]
    Network { message: String },
    #[error("Not found: {id}")]
    NotFound { id: String },
    /// A secondary lookup (author info) failed. Never fatal.
    #[error("Enrichment failed: {message}")]
    Enrichment { message: String },
    /// Required local fields missing before submission
    #[error("Invalid input: {message}")]
    Validation { message: String },
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
    #[error("Realtime channel on {table} closed")]
    SubscriptionClosed { table: String },
    #[error("Screen was unmounted")]
    Unmounted,
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn network(message: impl Into<String>) -> Self {
        CoreError::Network {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        CoreError::NotFound { id: id.into() }
    }

    /// Whether the UI should show this error to the user
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, CoreError::Enrichment { .. } | CoreError::Unmounted)
    }

    /// Message shown in an alert body
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Network { message } => message.clone(),
            CoreError::Validation { message } => message.clone(),
            CoreError::NotFound { .. } => "This item no longer exists".to_string(),
            CoreError::Timeout { .. } => "The request timed out, please try again".to_string(),
            CoreError::SubscriptionClosed { .. } => alerts::LIVE_UPDATES_LOST.to_string(),
            other => other.to_string(),
        }
    }

    /// Build the alert for this error, or None when it stays silent
    pub fn alert(&self, title: &str) -> Option<Alert> {
        self.is_user_visible()
            .then(|| Alert::new(title, self.user_message()))
    }
}
