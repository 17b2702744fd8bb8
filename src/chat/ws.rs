//! The realtime connection session: `Connecting -> Joined -> Closed`. The
//! lifecycle lives on `ChatSession` so tests can drive it without a socket;
//! the axum handler below is only transport.

use axum::{
    debug_handler,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppResult, AppState, session::{self, Identity}};

use super::error::{ChatError, ChatResult};
use super::room_name::{self, GUEST_GROUP};
use super::router;
use super::store;
use super::wire::Event;

#[derive(Debug)]
pub struct ChatSession {
    pub conn_id: Uuid,
    pub identity: Identity,
    pub room: String,
    pub room_rx: broadcast::Receiver<Event>,
    pub guest_rx: Option<broadcast::Receiver<Event>>,
}

impl ChatSession {
    /// `Connecting -> Joined`. Binds the room, joins its group (guests also
    /// the guest group), registers students as room participants, updates
    /// presence for admins, and returns the presence snapshot the caller
    /// must receive before any other event.
    pub async fn connect(
        state: &AppState,
        identity: Identity,
        raw_room: &str,
    ) -> ChatResult<(Self, Event)> {
        let room = room_name::for_connection(&identity, raw_room);
        if room.is_empty() {
            return Err(ChatError::validation("empty room name"));
        }

        let room_rx = state.hub.subscribe(&room_name::group(&room));
        let guest_rx = identity
            .is_anonymous()
            .then(|| state.hub.subscribe(GUEST_GROUP));

        if let Identity::Student { username } = &identity {
            let room_id = store::get_or_create_room(&state.db_pool, &room).await?;
            if let Some(user) = store::find_user(&state.db_pool, username).await? {
                store::add_participant(&state.db_pool, room_id, user.id).await?;
            }
        }

        let conn_id = Uuid::new_v4();
        if identity.is_admin() {
            state.presence.mark_connected(conn_id);
        }
        tracing::info!(%conn_id, room = %room, "chat session joined");

        let snapshot = Event::AdminStatus {
            online: state.presence.is_online(),
        };
        Ok((
            Self {
                conn_id,
                identity,
                room,
                room_rx,
                guest_rx,
            },
            snapshot,
        ))
    }

    /// Handles one inbound text frame while `Joined`. Routing failures come
    /// back as an event for this client only; the session stays up.
    pub async fn handle_inbound(&self, state: &AppState, text: &str) -> Option<Event> {
        let inbound = match serde_json::from_str(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable chat payload");
                return Some(Event::Error {
                    message: "invalid message payload".to_owned(),
                });
            }
        };

        match router::route(&state.db_pool, &state.hub, Some(&self.room), inbound).await {
            Ok(()) => None,
            Err(e) => {
                if matches!(e, ChatError::Collaborator(_)) {
                    tracing::error!(error = %e, room = %self.room, "message delivery failed");
                }
                Some(e.to_event())
            }
        }
    }

    /// `Joined -> Closed`. Group subscriptions die with the receivers; only
    /// presence needs an explicit unwind.
    pub fn disconnect(self, state: &AppState) {
        if self.identity.is_admin() {
            state.presence.mark_disconnected(self.conn_id);
        }
        tracing::info!(conn_id = %self.conn_id, room = %self.room, "chat session closed");
    }
}

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(
    Path(raw_room): Path<String>,
    State(state): State<AppState>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let identity = session::resolve(&session, &state.db_pool).await?;
    Ok(ws
        .on_upgrade(move |socket| run(socket, state, identity, raw_room))
        .into_response())
}

enum Step {
    Broadcast(Result<Event, broadcast::error::RecvError>),
    Client(Option<Result<Message, axum::Error>>),
}

async fn run(socket: WebSocket, state: AppState, identity: Identity, raw_room: String) {
    let (mut chat, snapshot) = match ChatSession::connect(&state, identity, &raw_room).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::warn!(error = %e, room = %raw_room, "chat connect rejected");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    if send_event(&mut sink, &snapshot).await.is_err() {
        chat.disconnect(&state);
        return;
    }

    loop {
        let step = tokio::select! {
            ev = chat.room_rx.recv() => Step::Broadcast(ev),
            ev = recv_opt(&mut chat.guest_rx) => Step::Broadcast(ev),
            msg = stream.next() => Step::Client(msg),
        };

        match step {
            Step::Broadcast(Ok(event)) => {
                if send_event(&mut sink, &event).await.is_err() {
                    break;
                }
            }
            Step::Broadcast(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                tracing::warn!(conn_id = %chat.conn_id, skipped, "chat session lagged behind broadcasts");
            }
            Step::Broadcast(Err(broadcast::error::RecvError::Closed)) => break,
            Step::Client(Some(Ok(Message::Text(text)))) => {
                if let Some(error_event) = chat.handle_inbound(&state, text.as_str()).await {
                    if send_event(&mut sink, &error_event).await.is_err() {
                        break;
                    }
                }
            }
            Step::Client(Some(Ok(Message::Close(_)))) | Step::Client(None) => break,
            Step::Client(Some(Ok(_))) => {}
            Step::Client(Some(Err(e))) => {
                tracing::debug!(conn_id = %chat.conn_id, error = %e, "websocket receive error");
                break;
            }
        }
    }

    chat.disconnect(&state);
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &Event,
) -> Result<(), axum::Error> {
    let Ok(json) = serde_json::to_string(event) else {
        return Ok(());
    };
    sink.send(Message::Text(json.into())).await
}

async fn recv_opt(
    rx: &mut Option<broadcast::Receiver<Event>>,
) -> Result<Event, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
