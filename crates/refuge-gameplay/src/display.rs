//! Health display plumbing and kill bookkeeping.

use ahash::AHashMap;
use tracing::{debug, info};

use refuge_common::EntityId;

use crate::behavior::BehaviorHost;
use crate::events::{Address, Message};

/// Relays the owner's health to whatever displays it.
#[derive(Debug, Default, Clone, Copy)]
pub struct HealthBridge;

impl HealthBridge {
    /// Publishes the host's current health to itself as a display refresh.
    /// Hosts without health publish nothing.
    pub fn publish_display<H: BehaviorHost>(&self, host: &mut H) {
        let Some(snapshot) = host.health() else {
            return;
        };
        host.publish(
            Address::Entity(host.entity()),
            Message::HealthUpdate {
                health: snapshot.health,
                max_health: snapshot.max_health,
            },
        );
    }

    /// Logs damage and refreshes the display.
    pub fn on_damage<H: BehaviorHost>(&self, value: f32, host: &mut H) {
        info!(entity = %host.entity(), "Took {value} damage");
        self.publish_display(host);
    }
}

/// Counts kills credited to an entity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KillTracker {
    kills: u32,
}

impl KillTracker {
    /// Creates a tracker with no kills.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one kill.
    pub fn on_kill(&mut self) {
        self.kills += 1;
    }

    /// Kills so far.
    #[must_use]
    pub fn kills(&self) -> u32 {
        self.kills
    }
}

/// Last health shown for one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthReadout {
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Refreshes received
    pub updates: u64,
}

/// Collects display refreshes per entity.
#[derive(Debug, Default)]
pub struct DisplayBoard {
    readouts: AHashMap<EntityId, HealthReadout>,
}

impl DisplayBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a refresh for `entity`.
    pub fn record(&mut self, entity: EntityId, health: f32, max_health: f32) {
        let readout = self.readouts.entry(entity).or_insert(HealthReadout {
            health,
            max_health,
            updates: 0,
        });
        readout.health = health;
        readout.max_health = max_health;
        readout.updates += 1;
        debug!(%entity, "Health display {health}/{max_health}");
    }

    /// Latest readout for `entity`.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&HealthReadout> {
        self.readouts.get(&entity)
    }

    /// Total refreshes across all entities.
    #[must_use]
    pub fn total_updates(&self) -> u64 {
        self.readouts.values().map(|r| r.updates).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::MockBehaviorHost;
    use crate::events::topics;
    use glam::Vec3;

    #[test]
    fn test_publish_display_targets_owner() {
        let mut host = MockBehaviorHost::new(Vec3::ZERO);
        HealthBridge.publish_display(&mut host);

        assert_eq!(host.published.len(), 1);
        let (address, message) = &host.published[0];
        assert_eq!(*address, Address::Entity(host.id));
        assert_eq!(message.topic(), topics::HEALTH_UPDATE);
    }

    #[test]
    fn test_no_health_publishes_nothing() {
        let mut host = MockBehaviorHost::new(Vec3::ZERO);
        host.health = None;
        HealthBridge.on_damage(5.0, &mut host);
        assert!(host.published.is_empty());
    }

    #[test]
    fn test_kill_tracker() {
        let mut tracker = KillTracker::new();
        tracker.on_kill();
        tracker.on_kill();
        assert_eq!(tracker.kills(), 2);
    }

    #[test]
    fn test_display_board_records_latest() {
        let mut board = DisplayBoard::new();
        let id = EntityId::from_raw(4);
        board.record(id, 100.0, 100.0);
        board.record(id, 60.0, 100.0);

        let readout = board.get(id).expect("readout recorded");
        assert_eq!(readout.health, 60.0);
        assert_eq!(readout.updates, 2);
        assert_eq!(board.total_updates(), 2);
        assert!(board.get(EntityId::from_raw(5)).is_none());
    }
}
