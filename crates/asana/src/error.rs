//! Error types for the Asana adapter.

use serde_json::Value;
use thiserror::Error;

/// Message used when no credential record is available.
pub const NO_CREDENTIALS: &str = "No credentials got returned!";

/// Message used for every 401 response.
pub const INVALID_CREDENTIALS: &str = "The Asana credentials are not valid!";

/// Failure reported by a transport.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    /// HTTP status, when a response was received.
    pub status_code: Option<u16>,
    /// Response body, decoded as JSON when possible.
    pub body: Option<Value>,
    pub message: String,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl TransportError {
    /// A failure without any response.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            body: None,
            message: message.into(),
            source: None,
        }
    }

    /// A non-success HTTP response.
    #[must_use]
    pub fn status(status_code: u16, body: Option<Value>) -> Self {
        let rendered = match &body {
            Some(Value::String(text)) => text.clone(),
            Some(value) => value.to_string(),
            None => String::new(),
        };
        Self {
            status_code: Some(status_code),
            body,
            message: format!("{status_code} - {rendered}"),
            source: None,
        }
    }

    /// Service error messages from a `{"errors": [{"message": ...}]}` body.
    ///
    /// Entries without a string `message` are skipped rather than joined as
    /// empty segments. `None` when the body has no `errors` array.
    #[must_use]
    pub fn error_messages(&self) -> Option<Vec<String>> {
        let errors = self.body.as_ref()?.get("errors")?.as_array()?;
        Some(
            errors
                .iter()
                .filter_map(|entry| entry.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status_code: err.status().map(|s| s.as_u16()),
            body: None,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Errors returned by [`crate::AsanaClient`].
#[derive(Debug, Error)]
pub enum AsanaError {
    /// Missing credentials or a 401 from the service.
    #[error("{0}")]
    Authentication(String),

    /// Structured error entries returned by Asana.
    #[error("Asana error response [{status_code}]: {}", .messages.join(" | "))]
    Api {
        status_code: u16,
        messages: Vec<String>,
    },

    /// Any other transport failure, unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response did not match the requested type.
    #[error("Failed to decode Asana response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Malformed URL or header; nothing was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AsanaError {
    /// Map a transport failure onto the adapter's error kinds.
    ///
    /// 401 always reads as bad credentials, even when the body carries more
    /// detail.
    #[must_use]
    pub fn from_transport(err: TransportError) -> Self {
        match (err.status_code, err.error_messages()) {
            (Some(401), _) => Self::Authentication(INVALID_CREDENTIALS.to_string()),
            (Some(status_code), Some(messages)) => Self::Api {
                status_code,
                messages,
            },
            _ => Self::Transport(err),
        }
    }

    /// HTTP status behind this error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            Self::Transport(err) => err.status_code,
            _ => None,
        }
    }
}
