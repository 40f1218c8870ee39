//! ID types for entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for entity IDs.
static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Name under which the player entity is registered.
pub const PLAYER_NAME: &str = "player";

/// Name under which the escorted girl entity is registered.
pub const GIRL_NAME: &str = "girl";

/// Unique identifier for an entity in the simulation.
///
/// Ordered so systems can visit entities in a stable sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new unique entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an entity ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) entity ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_id() {
        assert!(!EntityId::NULL.is_valid());
        assert_eq!(EntityId::from_raw(0), EntityId::NULL);
    }

    #[test]
    fn test_display() {
        assert_eq!(EntityId::from_raw(42).to_string(), "#42");
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        let mut ids = vec![EntityId::from_raw(9), EntityId::from_raw(3), EntityId::from_raw(5)];
        ids.sort();
        assert_eq!(
            ids.iter().map(|id| id.raw()).collect::<Vec<_>>(),
            vec![3, 5, 9]
        );
    }
}
