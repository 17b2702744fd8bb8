use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::hub::Hub;
use super::room_name::GUEST_GROUP;
use super::wire::Event;

/// Registry of open admin connections. Shared through `AppState`, so it is
/// scoped to one process; a multi-process deployment needs a shared registry
/// behind the same interface.
///
/// Empty<->non-empty transitions push exactly one `admin_status` event to
/// the guest group.
#[derive(Clone)]
pub struct Presence {
    admins: Arc<Mutex<HashSet<Uuid>>>,
    hub: Hub,
}

impl Presence {
    pub fn new(hub: Hub) -> Self {
        Self {
            admins: Arc::new(Mutex::new(HashSet::new())),
            hub,
        }
    }

    pub fn mark_connected(&self, conn_id: Uuid) {
        let mut admins = self.admins.lock().unwrap();
        let was_empty = admins.is_empty();
        admins.insert(conn_id);
        if was_empty {
            tracing::info!("admin came online");
            self.hub.publish(GUEST_GROUP, Event::AdminStatus { online: true });
        }
    }

    pub fn mark_disconnected(&self, conn_id: Uuid) {
        let mut admins = self.admins.lock().unwrap();
        let was_online = !admins.is_empty();
        admins.remove(&conn_id);
        if was_online && admins.is_empty() {
            tracing::info!("last admin went offline");
            self.hub.publish(GUEST_GROUP, Event::AdminStatus { online: false });
        }
    }

    pub fn is_online(&self) -> bool {
        !self.admins.lock().unwrap().is_empty()
    }
}
