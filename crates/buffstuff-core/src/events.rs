//! Event feed from the host simulation to the buff manager.

use buffstuff_common::{EntityId, PlayerRef};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Why an entity left the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DespawnReason {
    /// Entity died and its body was removed
    Death,
    /// Chunk unloaded
    Unload,
    /// Owning player disconnected
    Disconnect,
    /// Removed by a command or script
    Removed,
}

/// Host events the manager reacts to, in delivery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BuffEvent {
    /// Simulation step
    Tick {
        /// Real seconds since the previous tick
        dt: f32,
    },
    /// Player finished connecting
    PlayerJoined(PlayerRef),
    /// Player disconnected
    PlayerLeft(PlayerRef),
    /// Player died
    PlayerDied(PlayerRef),
    /// Entity removed from the world
    EntityDespawned {
        /// Entity ID
        entity: EntityId,
        /// Despawn reason
        reason: DespawnReason,
    },
}

/// Bounded queue of [`BuffEvent`]s.
#[derive(Debug)]
pub struct EventFeed {
    /// Sender for publishing events
    sender: Sender<BuffEvent>,
    /// Receiver drained by the manager
    receiver: Receiver<BuffEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventFeed {
    /// Creates a new feed with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event. Returns false if the feed was full and the event
    /// was dropped.
    pub fn publish(&self, event: BuffEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!("Buff event feed full, dropping {event:?}");
                false
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<BuffEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<BuffEvent> {
        self.sender.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let feed = EventFeed::new(8);
        let player = PlayerRef::new(EntityId::from_raw(1), "p1");
        assert!(feed.publish(BuffEvent::PlayerJoined(player.clone())));
        assert!(feed.publish(BuffEvent::Tick { dt: 0.25 }));
        assert!(feed.publish(BuffEvent::PlayerLeft(player)));
        assert_eq!(feed.pending_count(), 3);

        let events = feed.drain();
        assert!(matches!(events[0], BuffEvent::PlayerJoined(_)));
        assert!(matches!(events[1], BuffEvent::Tick { .. }));
        assert!(matches!(events[2], BuffEvent::PlayerLeft(_)));
        assert_eq!(feed.pending_count(), 0);
    }

    #[test]
    fn test_full_feed_drops() {
        let feed = EventFeed::new(1);
        assert!(feed.publish(BuffEvent::Tick { dt: 0.1 }));
        assert!(!feed.publish(BuffEvent::Tick { dt: 0.2 }));
        assert_eq!(feed.capacity(), 1);
        assert_eq!(feed.drain().len(), 1);
    }

    #[test]
    fn test_sender_handle_publishes() {
        let feed = EventFeed::default();
        let sender = feed.sender();
        sender
            .send(BuffEvent::EntityDespawned {
                entity: EntityId::from_raw(9),
                reason: DespawnReason::Unload,
            })
            .expect("send");
        assert_eq!(feed.pending_count(), 1);
    }
}
