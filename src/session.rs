//! Per-request identity, read from the hosting session the same way the
//! rest of the platform stores it: `user_id` holds the username of a logged
//! in account, `guest_id` the opaque id minted for an anonymous visitor.

use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::AppResult;
use crate::chat::store;

pub const USER_ID: &str = "user_id";
pub const GUEST_ID: &str = "guest_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous { guest_id: Option<String> },
    Student { username: String },
    Admin { username: String },
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        matches!(self, Identity::Admin { .. })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous { .. })
    }
}

/// Classifies the caller. A session naming an account we no longer know is
/// treated as anonymous rather than an error; the login flow is not ours to
/// police.
pub async fn resolve(session: &Session, db_pool: &SqlitePool) -> AppResult<Identity> {
    if let Some(username) = session.get::<String>(USER_ID).await? {
        if let Some(user) = store::find_user(db_pool, &username).await? {
            return Ok(if user.is_admin {
                Identity::Admin { username: user.username }
            } else {
                Identity::Student { username: user.username }
            });
        }
    }

    Ok(Identity::Anonymous {
        guest_id: session.get::<String>(GUEST_ID).await?,
    })
}
