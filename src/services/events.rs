//! In-process book event channel
//!
//! `addBook` publishes every created book here and the `bookAdded`
//! subscription streams from it. Delivery is fire-and-forget:
//! - a subscriber only sees events published after it subscribed
//! - publishing never waits on subscribers and succeeds with no subscribers
//! - a subscriber that falls more than `capacity` events behind loses the
//!   oldest ones

use tokio::sync::broadcast;
use tracing::debug;

use crate::db::{AuthorRecord, BookRecord};

/// A created book with its author populated
#[derive(Debug, Clone)]
pub struct BookAddedEvent {
    pub book: BookRecord,
    pub author: AuthorRecord,
}

/// Broadcast channel for book events
pub struct BookEvents {
    event_tx: broadcast::Sender<BookAddedEvent>,
}

impl BookEvents {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    /// Subscribe to books added from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BookAddedEvent> {
        self.event_tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }

    /// Publish a book to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: BookAddedEvent) -> usize {
        let book_id = event.book.id.clone();
        // send only fails when there are no receivers
        let receivers = self.event_tx.send(event).unwrap_or(0);
        debug!(book_id = %book_id, receivers, "Published book added event");
        receivers
    }
}

impl Default for BookEvents {
    fn default() -> Self {
        Self::new(256)
    }
}
