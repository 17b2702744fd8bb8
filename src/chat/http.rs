//! Synchronous fallbacks for clients without a live socket. Each send
//! endpoint goes through the same router as the realtime path, so the
//! persist+broadcast contract is identical.

use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    session::{self, GUEST_ID, Identity},
};

use super::error::ChatError;
use super::presence::Presence;
use super::room_name;
use super::router;
use super::store;
use super::wire::{Inbound, SenderRole};

#[derive(Deserialize)]
pub(crate) struct SendBody {
    message: String,
    #[serde(default)]
    client_msg_id: Option<String>,
}

/// Pull-style presence for pages loaded before the socket opens.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn status(State(presence): State<Presence>) -> Response {
    Json(json!({ "online": presence.is_online() })).into_response()
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn guest_send(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SendBody>,
) -> AppResult<Response> {
    // Guests are identified only by a session-scoped id, minted lazily so a
    // visitor who lost their session just starts a fresh thread.
    let guest_id = match session.get::<String>(GUEST_ID).await? {
        Some(id) => id,
        None => {
            let mut id = Uuid::new_v4().simple().to_string();
            id.truncate(8);
            session.insert(GUEST_ID, &id).await?;
            id
        }
    };

    let inbound = Inbound {
        message: body.message,
        sender_type: SenderRole::Guest,
        sender: Some(guest_id),
        client_msg_id: body.client_msg_id,
    };
    match router::route(&state.db_pool, &state.hub, None, inbound).await {
        Ok(()) => Ok(Json(json!({ "status": "ok" })).into_response()),
        Err(e) => Ok(e.into_response()),
    }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn student_send(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SendBody>,
) -> AppResult<Response> {
    let Identity::Student { username } = session::resolve(&session, &state.db_pool).await? else {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "login required" })),
        )
            .into_response());
    };

    let inbound = Inbound {
        message: body.message,
        sender_type: SenderRole::Student,
        sender: Some(username),
        client_msg_id: body.client_msg_id,
    };
    match router::route(&state.db_pool, &state.hub, None, inbound).await {
        Ok(()) => Ok(Json(json!({ "success": true })).into_response()),
        Err(e) => Ok(e.into_response()),
    }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn admin_reply(
    Path(raw_room): Path<String>,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SendBody>,
) -> AppResult<Response> {
    if !session::resolve(&session, &state.db_pool).await?.is_admin() {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "admin only" })),
        )
            .into_response());
    }

    let inbound = Inbound {
        message: body.message,
        sender_type: SenderRole::Admin,
        sender: None,
        client_msg_id: body.client_msg_id,
    };
    match router::route(&state.db_pool, &state.hub, Some(&raw_room), inbound).await {
        Ok(()) => Ok(Json(json!({ "success": true })).into_response()),
        Err(e) => Ok(e.into_response()),
    }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn history(
    Path(raw_room): Path<String>,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    let room = room_name::normalize(&raw_room);
    let Some(room_id) = store::find_room(&state.db_pool, &room).await? else {
        return Ok(ChatError::not_found("room").into_response());
    };

    // Opening a thread from the admin side counts as reading it.
    if session::resolve(&session, &state.db_pool).await?.is_admin() {
        store::mark_room_read(&state.db_pool, room_id).await?;
    }

    let messages = store::room_history(&state.db_pool, room_id).await?;
    Ok(Json(json!({ "messages": messages })).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn rooms(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    if !session::resolve(&session, &state.db_pool).await?.is_admin() {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "admin only" })),
        )
            .into_response());
    }

    let rooms = store::list_rooms(&state.db_pool).await?;
    Ok(Json(json!({ "rooms": rooms })).into_response())
}
