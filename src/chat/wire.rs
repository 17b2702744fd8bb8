use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Guest,
    Student,
    Admin,
}

impl SenderRole {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderRole::Guest => "guest",
            SenderRole::Student => "student",
            SenderRole::Admin => "admin",
        }
    }
}

/// Client -> server message envelope.
///
/// `sender` is the guest id for guest messages and the username for student
/// messages; for admin messages it is ignored, the identity comes from the
/// authenticated connection. `client_msg_id`, when present, lets the store
/// drop redelivered payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct Inbound {
    pub message: String,
    pub sender_type: SenderRole,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub client_msg_id: Option<String>,
}

/// Server -> client events. Also the payload fanned out through the hub, so
/// sessions forward what they receive verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ChatMessage { message: String, sender: String },
    AdminStatus { online: bool },
    Error { message: String },
}
