//! Message bus for inter-component communication.
//!
//! Messages are addressed either to a single entity or to every entity that
//! subscribed to a topic. Delivery happens when the world drains the bus, so
//! publishing never re-enters a handler.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use refuge_common::EntityId;

use crate::animation::ModelHandle;

/// Topic names carried by [`Message`]s.
pub mod topics {
    /// Model finished loading for the receiving entity.
    pub const LOAD_CHARACTER: &str = "load.character";
    /// The receiving entity took damage.
    pub const HEALTH_DAMAGE: &str = "health.damage";
    /// The receiving entity died.
    pub const HEALTH_DEATH: &str = "health.death";
    /// Display-facing health refresh.
    pub const HEALTH_UPDATE: &str = "health.update";
    /// The receiving entity killed something.
    pub const HEALTH_ADD_EXPERIENCE: &str = "health.add-experience";
    /// Well-known channel the player's health listens on.
    pub const PLAYER_DEATH_TRIGGER: &str = "player-death-trigger";
}

/// Messages exchanged between components.
#[derive(Debug, Clone)]
pub enum Message {
    /// Visual model became available
    LoadCharacter {
        /// Handle to the loaded model
        model: ModelHandle,
    },
    /// Damage was applied
    HealthDamage {
        /// Damage amount
        value: f32,
    },
    /// Health reached zero
    HealthDeath {
        /// Health at death (zero)
        health: f32,
        /// Maximum health
        max_health: f32,
    },
    /// Health display refresh
    HealthUpdate {
        /// Current health
        health: f32,
        /// Maximum health
        max_health: f32,
    },
    /// Experience awarded for a kill
    AddExperience {
        /// Experience value
        value: f32,
    },
    /// Request that the player die
    PlayerDeathTrigger {
        /// Entity whose death caused the trigger
        source: EntityId,
    },
}

impl Message {
    /// Returns the topic this message travels under.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::LoadCharacter { .. } => topics::LOAD_CHARACTER,
            Self::HealthDamage { .. } => topics::HEALTH_DAMAGE,
            Self::HealthDeath { .. } => topics::HEALTH_DEATH,
            Self::HealthUpdate { .. } => topics::HEALTH_UPDATE,
            Self::AddExperience { .. } => topics::HEALTH_ADD_EXPERIENCE,
            Self::PlayerDeathTrigger { .. } => topics::PLAYER_DEATH_TRIGGER,
        }
    }
}

/// Where a message should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// A single entity
    Entity(EntityId),
    /// Every entity subscribed to the topic
    Topic(&'static str),
}

/// A message together with its destination.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Destination
    pub address: Address,
    /// Payload
    pub message: Message,
}

/// Bus buffering messages until the world dispatches them.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for publishing envelopes
    sender: Sender<Envelope>,
    /// Receiver for collecting envelopes
    receiver: Receiver<Envelope>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes a message. Returns false if the bus was full and the message
    /// was dropped.
    pub fn publish(&self, address: Address, message: Message) -> bool {
        match self.sender.try_send(Envelope { address, message }) {
            Ok(()) => true,
            Err(TrySendError::Full(envelope) | TrySendError::Disconnected(envelope)) => {
                warn!(
                    "Event bus full, dropping {} for {:?}",
                    envelope.message.topic(),
                    envelope.address
                );
                false
            },
        }
    }

    /// Publishes a message to a single entity.
    pub fn send_to(&self, entity: EntityId, message: Message) -> bool {
        self.publish(Address::Entity(entity), message)
    }

    /// Drains all pending envelopes.
    pub fn drain(&self) -> Vec<Envelope> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending envelopes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain_preserves_order() {
        let bus = EventBus::new(8);
        let id = EntityId::from_raw(7);

        assert!(bus.send_to(id, Message::HealthDamage { value: 5.0 }));
        assert!(bus.send_to(id, Message::AddExperience { value: 1.0 }));
        assert_eq!(bus.pending_count(), 2);

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message.topic(), topics::HEALTH_DAMAGE);
        assert_eq!(drained[1].message.topic(), topics::HEALTH_ADD_EXPERIENCE);
        assert_eq!(drained[0].address, Address::Entity(id));
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops() {
        let bus = EventBus::new(1);
        let id = EntityId::from_raw(1);
        assert!(bus.send_to(id, Message::HealthDamage { value: 1.0 }));
        assert!(!bus.send_to(id, Message::HealthDamage { value: 2.0 }));
        assert_eq!(bus.drain().len(), 1);
    }

    #[test]
    fn test_topic_address_survives_drain() {
        let bus = EventBus::default();
        assert!(bus.publish(
            Address::Topic(topics::PLAYER_DEATH_TRIGGER),
            Message::PlayerDeathTrigger {
                source: EntityId::from_raw(3),
            },
        ));
        let drained = bus.drain();
        assert_eq!(
            drained[0].address,
            Address::Topic(topics::PLAYER_DEATH_TRIGGER)
        );
        assert_eq!(bus.capacity(), 1024);
    }
}
