use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::wire::Event;

const GROUP_CAPACITY: usize = 64;

/// Named fan-out groups over tokio broadcast channels. A session subscribes
/// to its room's group (guests also to the guest group) and anything
/// published to that name reaches every live subscriber. Groups are created
/// lazily and never removed; a group with no subscribers just drops the
/// published event.
#[derive(Clone, Default)]
pub struct Hub {
    groups: Arc<Mutex<HashMap<String, broadcast::Sender<Event>>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, group: &str) -> broadcast::Receiver<Event> {
        self.sender(group).subscribe()
    }

    /// Returns the number of subscribers the event reached.
    pub fn publish(&self, group: &str, event: Event) -> usize {
        self.sender(group).send(event).unwrap_or(0)
    }

    fn sender(&self, group: &str) -> broadcast::Sender<Event> {
        let mut groups = self.groups.lock().unwrap();
        groups
            .entry(group.to_owned())
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .clone()
    }
}
