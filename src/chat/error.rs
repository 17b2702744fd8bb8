use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use thiserror::Error;

use super::wire::Event;

/// Error taxonomy for the chat core. `NotFound` and `Validation` are local,
/// recoverable failures reported back to the client; `Collaborator` means
/// the store or the broadcast bus is misbehaving.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("chat backend unavailable: {0}")]
    Collaborator(#[from] sqlx::Error),
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;

impl ChatError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ChatError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ChatError::Validation(msg.into())
    }

    /// Event sent over an open socket instead of tearing the connection
    /// down. Collaborator details stay in the logs, not on the wire.
    pub fn to_event(&self) -> Event {
        let message = match self {
            ChatError::Collaborator(_) => "message delivery failed".to_owned(),
            other => other.to_string(),
        };
        Event::Error { message }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Collaborator(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = match &self {
            ChatError::Collaborator(e) => {
                tracing::error!(error = %e, "chat collaborator failure");
                "message delivery failed".to_owned()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": body }))).into_response()
    }
}
