//! Durable side of the chat core: rooms, participants, messages, and the
//! minimal account table standing in for the platform's user store.

use sqlx::SqlitePool;

use super::wire::SenderRole;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        is_admin INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS rooms (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS room_participants (
        room_id INTEGER NOT NULL REFERENCES rooms(id),
        user_id INTEGER NOT NULL REFERENCES users(id),
        UNIQUE (room_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY,
        room_id INTEGER NOT NULL REFERENCES rooms(id),
        sender_id INTEGER REFERENCES users(id),
        receiver_id INTEGER REFERENCES users(id),
        body TEXT NOT NULL,
        guest_name TEXT,
        role TEXT NOT NULL CHECK (role IN ('guest', 'student', 'admin')),
        is_read INTEGER NOT NULL DEFAULT 0,
        client_msg_id TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (room_id, client_msg_id)
    )",
];

pub async fn init_schema(db_pool: &SqlitePool) -> sqlx::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

pub async fn create_user(db_pool: &SqlitePool, username: &str, is_admin: bool) -> sqlx::Result<i64> {
    let result = sqlx::query("INSERT INTO users (username, is_admin) VALUES (?, ?)")
        .bind(username)
        .bind(is_admin)
        .execute(db_pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn find_user(db_pool: &SqlitePool, username: &str) -> sqlx::Result<Option<User>> {
    let row: Option<(i64, String, bool)> =
        sqlx::query_as("SELECT id, username, is_admin FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(db_pool)
            .await?;
    Ok(row.map(|(id, username, is_admin)| User { id, username, is_admin }))
}

/// The single support agent. Exactly one account carries the flag; a
/// deployment that seeded none gets `None` and the router reports it.
pub async fn admin_user(db_pool: &SqlitePool) -> sqlx::Result<Option<User>> {
    let row: Option<(i64, String, bool)> =
        sqlx::query_as("SELECT id, username, is_admin FROM users WHERE is_admin = 1 LIMIT 1")
            .fetch_optional(db_pool)
            .await?;
    Ok(row.map(|(id, username, is_admin)| User { id, username, is_admin }))
}

pub async fn ensure_admin(db_pool: &SqlitePool, username: &str) -> sqlx::Result<()> {
    if admin_user(db_pool).await?.is_none() {
        create_user(db_pool, username, true).await?;
    }
    Ok(())
}

pub async fn get_or_create_room(db_pool: &SqlitePool, name: &str) -> sqlx::Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO rooms (name) VALUES (?)")
        .bind(name)
        .execute(db_pool)
        .await?;
    let (id,): (i64,) = sqlx::query_as("SELECT id FROM rooms WHERE name = ?")
        .bind(name)
        .fetch_one(db_pool)
        .await?;
    Ok(id)
}

pub async fn find_room(db_pool: &SqlitePool, name: &str) -> sqlx::Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM rooms WHERE name = ?")
        .bind(name)
        .fetch_optional(db_pool)
        .await?;
    Ok(row.map(|(id,)| id))
}

pub async fn add_participant(db_pool: &SqlitePool, room_id: i64, user_id: i64) -> sqlx::Result<()> {
    sqlx::query("INSERT OR IGNORE INTO room_participants (room_id, user_id) VALUES (?, ?)")
        .bind(room_id)
        .bind(user_id)
        .execute(db_pool)
        .await?;
    Ok(())
}

/// Room participants minus the support agent, i.e. the human the admin is
/// talking to (empty for guest rooms, where the other side has no account).
pub async fn participants_excluding_admin(
    db_pool: &SqlitePool,
    room_id: i64,
) -> sqlx::Result<Vec<User>> {
    let rows: Vec<(i64, String, bool)> = sqlx::query_as(
        "SELECT u.id, u.username, u.is_admin
         FROM room_participants p JOIN users u ON u.id = p.user_id
         WHERE p.room_id = ? AND u.is_admin = 0
         ORDER BY u.id",
    )
    .bind(room_id)
    .fetch_all(db_pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, username, is_admin)| User { id, username, is_admin })
        .collect())
}

pub struct NewMessage<'a> {
    pub room_id: i64,
    pub sender_id: Option<i64>,
    pub receiver_id: Option<i64>,
    pub body: &'a str,
    pub guest_name: Option<&'a str>,
    pub role: SenderRole,
    pub client_msg_id: Option<&'a str>,
}

/// Persists one message. Returns `false` when `client_msg_id` matched an
/// already-stored message in the room, in which case nothing was written and
/// the caller must not broadcast.
pub async fn insert_message(db_pool: &SqlitePool, msg: NewMessage<'_>) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO messages
         (room_id, sender_id, receiver_id, body, guest_name, role, client_msg_id)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(msg.room_id)
    .bind(msg.sender_id)
    .bind(msg.receiver_id)
    .bind(msg.body)
    .bind(msg.guest_name)
    .bind(msg.role.as_str())
    .bind(msg.client_msg_id)
    .execute(db_pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[derive(Debug, serde::Serialize)]
pub struct HistoryRow {
    pub sender: String,
    pub message: String,
    pub timestamp: String,
}

pub async fn room_history(db_pool: &SqlitePool, room_id: i64) -> sqlx::Result<Vec<HistoryRow>> {
    let rows: Vec<(String, Option<String>, Option<String>, String, String)> = sqlx::query_as(
        "SELECT m.role, u.username, m.guest_name, m.body, m.created_at
         FROM messages m LEFT JOIN users u ON u.id = m.sender_id
         WHERE m.room_id = ?
         ORDER BY m.id",
    )
    .bind(room_id)
    .fetch_all(db_pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(role, username, guest_name, body, created_at)| {
            let sender = match role.as_str() {
                "admin" => "admin".to_owned(),
                "student" => username.unwrap_or_else(|| "student".to_owned()),
                _ => guest_name.unwrap_or_else(|| "Guest".to_owned()),
            };
            HistoryRow {
                sender,
                message: body,
                timestamp: created_at,
            }
        })
        .collect())
}

/// Admin-side read action: flips every unread inbound message in the room.
pub async fn mark_room_read(db_pool: &SqlitePool, room_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE messages SET is_read = 1 WHERE room_id = ? AND role != 'admin' AND is_read = 0")
        .bind(room_id)
        .execute(db_pool)
        .await?;
    Ok(())
}

/// Admin inbox: every room, newest first.
pub async fn list_rooms(db_pool: &SqlitePool) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM rooms ORDER BY id DESC")
        .fetch_all(db_pool)
        .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
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
        init_schema(&db_pool).await.unwrap();
        db_pool
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let db_pool = test_pool().await;
        ensure_admin(&db_pool, "admin").await.unwrap();
        ensure_admin(&db_pool, "someone_else").await.unwrap();

        let admin = admin_user(&db_pool).await.unwrap().unwrap();
        assert_eq!(admin.username, "admin");
        assert!(admin.is_admin);
    }

    #[tokio::test]
    async fn get_or_create_room_returns_same_id() {
        let db_pool = test_pool().await;
        let first = get_or_create_room(&db_pool, "g123_admin").await.unwrap();
        let second = get_or_create_room(&db_pool, "g123_admin").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(find_room(&db_pool, "g123_admin").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn participants_exclude_the_admin_account() {
        let db_pool = test_pool().await;
        let admin = create_user(&db_pool, "admin", true).await.unwrap();
        let student = create_user(&db_pool, "amaka", false).await.unwrap();
        let room = get_or_create_room(&db_pool, "student_amaka_admin").await.unwrap();
        add_participant(&db_pool, room, admin).await.unwrap();
        add_participant(&db_pool, room, student).await.unwrap();
        add_participant(&db_pool, room, student).await.unwrap();

        let others = participants_excluding_admin(&db_pool, room).await.unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].username, "amaka");
    }

    #[tokio::test]
    async fn duplicate_client_msg_id_is_ignored() {
        let db_pool = test_pool().await;
        let room = get_or_create_room(&db_pool, "g123_admin").await.unwrap();

        let msg = NewMessage {
            room_id: room,
            sender_id: None,
            receiver_id: None,
            body: "hello",
            guest_name: Some("g123"),
            role: SenderRole::Guest,
            client_msg_id: Some("c-1"),
        };
        assert!(insert_message(&db_pool, msg).await.unwrap());

        let dup = NewMessage {
            room_id: room,
            sender_id: None,
            receiver_id: None,
            body: "hello",
            guest_name: Some("g123"),
            role: SenderRole::Guest,
            client_msg_id: Some("c-1"),
        };
        assert!(!insert_message(&db_pool, dup).await.unwrap());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn messages_without_client_id_are_never_deduped() {
        let db_pool = test_pool().await;
        let room = get_or_create_room(&db_pool, "g123_admin").await.unwrap();

        for _ in 0..2 {
            let msg = NewMessage {
                room_id: room,
                sender_id: None,
                receiver_id: None,
                body: "hello",
                guest_name: Some("g123"),
                role: SenderRole::Guest,
                client_msg_id: None,
            };
            assert!(insert_message(&db_pool, msg).await.unwrap());
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn history_labels_senders_by_role() {
        let db_pool = test_pool().await;
        let admin = create_user(&db_pool, "admin", true).await.unwrap();
        let student = create_user(&db_pool, "amaka", false).await.unwrap();
        let room = get_or_create_room(&db_pool, "student_amaka_admin").await.unwrap();

        insert_message(&db_pool, NewMessage {
            room_id: room,
            sender_id: Some(student),
            receiver_id: Some(admin),
            body: "need help",
            guest_name: None,
            role: SenderRole::Student,
            client_msg_id: None,
        })
        .await
        .unwrap();
        insert_message(&db_pool, NewMessage {
            room_id: room,
            sender_id: Some(admin),
            receiver_id: Some(student),
            body: "sure",
            guest_name: None,
            role: SenderRole::Admin,
            client_msg_id: None,
        })
        .await
        .unwrap();

        let history = room_history(&db_pool, room).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sender, "amaka");
        assert_eq!(history[0].message, "need help");
        assert_eq!(history[1].sender, "admin");
    }

    #[tokio::test]
    async fn mark_room_read_leaves_admin_messages_alone() {
        let db_pool = test_pool().await;
        let admin = create_user(&db_pool, "admin", true).await.unwrap();
        let room = get_or_create_room(&db_pool, "g123_admin").await.unwrap();

        insert_message(&db_pool, NewMessage {
            room_id: room,
            sender_id: None,
            receiver_id: Some(admin),
            body: "hello",
            guest_name: Some("g123"),
            role: SenderRole::Guest,
            client_msg_id: None,
        })
        .await
        .unwrap();
        insert_message(&db_pool, NewMessage {
            room_id: room,
            sender_id: Some(admin),
            receiver_id: None,
            body: "hi",
            guest_name: Some("g123"),
            role: SenderRole::Admin,
            client_msg_id: None,
        })
        .await
        .unwrap();

        mark_room_read(&db_pool, room).await.unwrap();

        let (unread_guest,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE role = 'guest' AND is_read = 0",
        )
        .fetch_one(&db_pool)
        .await
        .unwrap();
        assert_eq!(unread_guest, 0);
    }
}
