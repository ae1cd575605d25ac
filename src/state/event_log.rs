//! C5 — Payment Event Log.
//!
//! An append-only record of the six event kinds in `spec.md` §4.5, kept in
//! memory and folded into the periodic snapshot. Nothing is ever removed
//! from it at runtime; truncation, if ever needed, is an operational
//! concern outside the gateway.

use tokio::sync::RwLock;

use crate::model::event::Event;

#[derive(Debug, Default)]
pub struct EventLog {
    events: RwLock<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn restore(events: Vec<Event>) -> Self {
        EventLog {
            events: RwLock::new(events),
        }
    }

    pub async fn append(&self, event: Event) {
        self.events.write().await.push(event);
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn snapshot(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }
}
