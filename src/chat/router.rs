//! Single routing implementation behind both the realtime session and the
//! HTTP fallback endpoints: classify by declared sender role, persist once,
//! broadcast once.

use sqlx::SqlitePool;

use super::error::{ChatError, ChatResult};
use super::hub::Hub;
use super::room_name;
use super::store::{self, NewMessage};
use super::wire::{Event, Inbound, SenderRole};

/// Routes one inbound text message. `bound_room` is the room the sending
/// session is attached to; only the admin path reads it, since guests and
/// students always address "the" admin and their room is derived from their
/// own identifier.
pub async fn route(
    db_pool: &SqlitePool,
    hub: &Hub,
    bound_room: Option<&str>,
    inbound: Inbound,
) -> ChatResult<()> {
    let body = inbound.message.trim();
    if body.is_empty() {
        return Err(ChatError::validation("empty message"));
    }

    match inbound.sender_type {
        SenderRole::Guest => {
            let guest_id = sender_identifier(&inbound)?;
            route_guest(db_pool, hub, &guest_id, body, inbound.client_msg_id.as_deref()).await
        }
        SenderRole::Student => {
            let username = sender_identifier(&inbound)?;
            route_student(db_pool, hub, &username, body, inbound.client_msg_id.as_deref()).await
        }
        SenderRole::Admin => {
            let room = bound_room.ok_or_else(|| ChatError::not_found("room"))?;
            route_admin(db_pool, hub, room, body, inbound.client_msg_id.as_deref()).await
        }
    }
}

fn sender_identifier(inbound: &Inbound) -> ChatResult<String> {
    match inbound.sender.as_deref().map(str::trim) {
        Some(sender) if !sender.is_empty() => Ok(sender.to_owned()),
        _ => Err(ChatError::validation("missing sender")),
    }
}

async fn route_guest(
    db_pool: &SqlitePool,
    hub: &Hub,
    guest_id: &str,
    body: &str,
    client_msg_id: Option<&str>,
) -> ChatResult<()> {
    let admin = store::admin_user(db_pool)
        .await?
        .ok_or_else(|| ChatError::not_found("admin account"))?;

    let room = room_name::for_guest(guest_id);
    let room_id = store::get_or_create_room(db_pool, &room).await?;

    let stored = store::insert_message(db_pool, NewMessage {
        room_id,
        sender_id: None,
        receiver_id: Some(admin.id),
        body,
        guest_name: Some(guest_id),
        role: SenderRole::Guest,
        client_msg_id,
    })
    .await?;

    if stored {
        tracing::debug!(room = %room, "guest message routed");
        hub.publish(&room_name::group(&room), Event::ChatMessage {
            message: body.to_owned(),
            sender: guest_id.to_owned(),
        });
    }
    Ok(())
}

async fn route_student(
    db_pool: &SqlitePool,
    hub: &Hub,
    username: &str,
    body: &str,
    client_msg_id: Option<&str>,
) -> ChatResult<()> {
    let student = store::find_user(db_pool, username)
        .await?
        .ok_or_else(|| ChatError::not_found(format!("student {username}")))?;
    let admin = store::admin_user(db_pool)
        .await?
        .ok_or_else(|| ChatError::not_found("admin account"))?;

    let room = room_name::for_student(&student.username);
    let room_id = store::get_or_create_room(db_pool, &room).await?;
    store::add_participant(db_pool, room_id, student.id).await?;

    let stored = store::insert_message(db_pool, NewMessage {
        room_id,
        sender_id: Some(student.id),
        receiver_id: Some(admin.id),
        body,
        guest_name: None,
        role: SenderRole::Student,
        client_msg_id,
    })
    .await?;

    if stored {
        tracing::debug!(room = %room, "student message routed");
        hub.publish(&room_name::group(&room), Event::ChatMessage {
            message: body.to_owned(),
            sender: student.username.clone(),
        });
    }
    Ok(())
}

async fn route_admin(
    db_pool: &SqlitePool,
    hub: &Hub,
    bound_room: &str,
    body: &str,
    client_msg_id: Option<&str>,
) -> ChatResult<()> {
    let room = room_name::normalize(bound_room);
    let room_id = store::find_room(db_pool, &room)
        .await?
        .ok_or_else(|| ChatError::not_found("room"))?;
    let admin = store::admin_user(db_pool)
        .await?
        .ok_or_else(|| ChatError::not_found("admin account"))?;

    // A registered participant means a student thread; otherwise the other
    // side is a guest known only by the room's name.
    let others = store::participants_excluding_admin(db_pool, room_id).await?;
    let (receiver_id, guest_name) = match others.first() {
        Some(student) => (Some(student.id), None),
        None => (None, Some(room_name::guest_label(&room))),
    };

    let stored = store::insert_message(db_pool, NewMessage {
        room_id,
        sender_id: Some(admin.id),
        receiver_id,
        body,
        guest_name: guest_name.as_deref(),
        role: SenderRole::Admin,
        client_msg_id,
    })
    .await?;

    if stored {
        tracing::debug!(room = %room, "admin reply routed");
        hub.publish(&room_name::group(&room), Event::ChatMessage {
            message: body.to_owned(),
            sender: "admin".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        store::init_schema(&db_pool).await.unwrap();
        store::create_user(&db_pool, "admin", true).await.unwrap();
        db_pool
    }

    fn inbound(message: &str, sender_type: SenderRole, sender: Option<&str>) -> Inbound {
        Inbound {
            message: message.to_owned(),
            sender_type,
            sender: sender.map(str::to_owned),
            client_msg_id: None,
        }
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_any_write() {
        let db_pool = test_pool().await;
        let hub = Hub::new();

        let err = route(&db_pool, &hub, None, inbound("   ", SenderRole::Guest, Some("g123")))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn guest_message_without_identifier_is_rejected() {
        let db_pool = test_pool().await;
        let hub = Hub::new();

        let err = route(&db_pool, &hub, None, inbound("hi", SenderRole::Guest, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_student_means_no_partial_write() {
        let db_pool = test_pool().await;
        let hub = Hub::new();

        let err = route(
            &db_pool,
            &hub,
            None,
            inbound("hi", SenderRole::Student, Some("nobody")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));

        let (rooms,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rooms")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        let (messages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!((rooms, messages), (0, 0));
    }

    #[tokio::test]
    async fn admin_reply_to_unknown_room_is_not_found() {
        let db_pool = test_pool().await;
        let hub = Hub::new();
        let mut group = hub.subscribe("chat_student_ghost_admin");

        let err = route(
            &db_pool,
            &hub,
            Some("student_ghost_admin"),
            inbound("anyone there?", SenderRole::Admin, None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));

        let (messages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(messages, 0);
        assert!(group.try_recv().is_err());
    }
}
