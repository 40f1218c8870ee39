//! Health capability.

use serde::{Deserialize, Serialize};

/// Health component for entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    /// Current health
    current: f32,
    /// Maximum health
    max: f32,
    /// Set once the death of this entity has been announced
    death_processed: bool,
}

/// What a call to [`Health::apply_damage`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    /// Health actually removed
    pub dealt: f32,
    /// True only for the hit that took health to zero
    pub killed: bool,
}

/// Copy of health values handed to other components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSnapshot {
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
}

impl HealthSnapshot {
    /// Returns health as a fraction of max (0 when max is not positive).
    #[must_use]
    pub fn ratio(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            self.health / self.max_health
        }
    }

    /// Whether any health is left.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }
}

impl Health {
    /// Creates a full health component.
    #[must_use]
    pub const fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            death_processed: false,
        }
    }

    /// Sets current health, clamped to `[0, max]`.
    #[must_use]
    pub fn with_current(mut self, current: f32) -> Self {
        self.current = current.clamp(0.0, self.max);
        self
    }

    /// Returns current health.
    #[must_use]
    pub const fn current(&self) -> f32 {
        self.current
    }

    /// Returns maximum health.
    #[must_use]
    pub const fn max(&self) -> f32 {
        self.max
    }

    /// Health as a fraction of max.
    #[must_use]
    pub fn ratio(&self) -> f32 {
        self.snapshot().ratio()
    }

    /// Whether any health is left.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    /// Whether this entity's death has already been announced.
    #[must_use]
    pub const fn death_processed(&self) -> bool {
        self.death_processed
    }

    /// Copy of the current values.
    #[must_use]
    pub const fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            health: self.current,
            max_health: self.max,
        }
    }

    /// Applies damage, clamping at zero.
    pub fn apply_damage(&mut self, amount: f32) -> DamageOutcome {
        if amount <= 0.0 || !self.is_alive() {
            return DamageOutcome {
                dealt: 0.0,
                killed: false,
            };
        }
        let before = self.current;
        self.current = (self.current - amount).max(0.0);
        let killed = self.current <= 0.0 && !self.death_processed;
        if killed {
            self.death_processed = true;
        }
        DamageOutcome {
            dealt: before - self.current,
            killed,
        }
    }

    /// Forces health to zero outside the damage pipeline. Returns true only
    /// the first time, so a repeated kill announces nothing.
    pub fn force_kill(&mut self) -> bool {
        if self.death_processed {
            return false;
        }
        self.current = 0.0;
        self.death_processed = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_full() {
        let health = Health::new(100.0);
        assert_eq!(health.current(), 100.0);
        assert_eq!(health.ratio(), 1.0);
        assert!(health.is_alive());
    }

    #[test]
    fn test_damage_clamps_and_kills_once() {
        let mut health = Health::new(50.0);

        let hit = health.apply_damage(30.0);
        assert_eq!(hit.dealt, 30.0);
        assert!(!hit.killed);

        let lethal = health.apply_damage(100.0);
        assert_eq!(lethal.dealt, 20.0);
        assert!(lethal.killed);
        assert_eq!(health.current(), 0.0);

        let overkill = health.apply_damage(10.0);
        assert_eq!(overkill.dealt, 0.0);
        assert!(!overkill.killed);
    }

    #[test]
    fn test_negative_damage_ignored() {
        let mut health = Health::new(10.0);
        let outcome = health.apply_damage(-5.0);
        assert_eq!(outcome.dealt, 0.0);
        assert_eq!(health.current(), 10.0);
    }

    #[test]
    fn test_force_kill_is_idempotent() {
        let mut health = Health::new(100.0);
        assert!(health.force_kill());
        assert_eq!(health.current(), 0.0);
        assert!(!health.force_kill());
    }

    #[test]
    fn test_force_kill_after_lethal_damage() {
        let mut health = Health::new(10.0);
        assert!(health.apply_damage(10.0).killed);
        assert!(!health.force_kill());
    }

    #[test]
    fn test_snapshot_ratio_zero_max() {
        let snapshot = HealthSnapshot {
            health: 5.0,
            max_health: 0.0,
        };
        assert_eq!(snapshot.ratio(), 0.0);
    }
}
