//! Death cascade from the escorted character to the player.
//!
//! When the character dies the controller broadcasts on
//! [`topics::PLAYER_DEATH_TRIGGER`]. The player's health subscribes to that
//! topic and applies the kill at most once, so duplicate deaths or duplicate
//! triggers still produce a single player death.

use tracing::{debug, info, warn};

use refuge_common::EntityId;

use crate::behavior::BehaviorHost;
use crate::events::{topics, Address, Message};
use crate::health::Health;

/// Sending side of the cascade, owned by the character's controller.
#[derive(Debug, Default, Clone)]
pub struct DeathCascade {
    triggers_sent: u32,
}

impl DeathCascade {
    /// Broadcasts a player-death trigger naming the host as the source.
    /// Returns false if the bus dropped it.
    pub fn trigger<H: BehaviorHost>(&mut self, host: &mut H) -> bool {
        info!(source = %host.entity(), "Escort died, triggering player death");
        let source = host.entity();
        let sent = host.publish(
            Address::Topic(topics::PLAYER_DEATH_TRIGGER),
            Message::PlayerDeathTrigger { source },
        );
        if sent {
            self.triggers_sent += 1;
        } else {
            warn!(%source, "Player death trigger dropped");
        }
        sent
    }

    /// How many triggers reached the bus.
    #[must_use]
    pub fn triggers_sent(&self) -> u32 {
        self.triggers_sent
    }
}

/// Receiving side: applies a trigger to the player's health.
///
/// Returns the death message to deliver to the player, or `None` when the
/// player was already dead.
pub fn receive_death_trigger(
    target: EntityId,
    health: &mut Health,
    source: EntityId,
) -> Option<Message> {
    if !health.force_kill() {
        debug!(%target, %source, "Death trigger ignored, already dead");
        return None;
    }
    info!(%target, %source, "Player killed by death trigger");
    Some(Message::HealthDeath {
        health: health.current(),
        max_health: health.max(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::MockBehaviorHost;
    use glam::Vec3;

    #[test]
    fn test_trigger_broadcasts_source() {
        let mut host = MockBehaviorHost::new(Vec3::ZERO);
        let mut cascade = DeathCascade::default();
        assert!(cascade.trigger(&mut host));

        assert_eq!(cascade.triggers_sent(), 1);
        assert_eq!(host.published.len(), 1);
        let (address, message) = &host.published[0];
        assert_eq!(*address, Address::Topic(topics::PLAYER_DEATH_TRIGGER));
        assert!(matches!(
            message,
            Message::PlayerDeathTrigger { source } if *source == host.id
        ));
    }

    #[test]
    fn test_dropped_trigger_not_counted() {
        let mut host = MockBehaviorHost::new(Vec3::ZERO);
        host.publish_limit = Some(0);
        let mut cascade = DeathCascade::default();

        assert!(!cascade.trigger(&mut host));
        assert_eq!(cascade.triggers_sent(), 0);
        assert!(host.published.is_empty());

        host.publish_limit = None;
        assert!(cascade.trigger(&mut host));
        assert_eq!(cascade.triggers_sent(), 1);
    }

    #[test]
    fn test_receive_is_idempotent() {
        let player = EntityId::from_raw(1);
        let girl = EntityId::from_raw(2);
        let mut health = Health::new(100.0);

        let first = receive_death_trigger(player, &mut health, girl);
        assert!(matches!(
            first,
            Some(Message::HealthDeath { health, max_health }) if health == 0.0 && max_health == 100.0
        ));
        assert!(receive_death_trigger(player, &mut health, girl).is_none());
        assert!(!health.is_alive());
    }

    #[test]
    fn test_receive_after_combat_death() {
        let mut health = Health::new(30.0);
        assert!(health.apply_damage(50.0).killed);
        assert!(receive_death_trigger(EntityId::from_raw(1), &mut health, EntityId::from_raw(2))
            .is_none());
    }
}
