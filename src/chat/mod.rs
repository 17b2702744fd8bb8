mod error;
mod http;
mod hub;
mod presence;
mod room_name;
mod router;
pub mod store;
mod wire;
mod ws;

pub use error::{ChatError, ChatResult};
pub use hub::Hub;
pub use presence::Presence;
pub use room_name::GUEST_GROUP;
pub use wire::{Event, Inbound, SenderRole};
pub use ws::ChatSession;

pub use router::route;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(http::status))
        .route("/guest/send", post(http::guest_send))
        .route("/student/send", post(http::student_send))
        .route("/admin/reply/{room}", post(http::admin_reply))
        .route("/history/{room}", get(http::history))
        .route("/rooms", get(http::rooms))
        .route("/ws/{room}", get(ws::chat_ws))
}
