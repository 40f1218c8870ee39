//! Entity system with arena-based storage.
//!
//! Entities carry a transform plus a fixed set of optional typed
//! capabilities. Systems check capabilities directly instead of looking
//! components up by name.

use ahash::{AHashMap, AHashSet};
use glam::{Quat, Vec3};

use refuge_common::{EntityError, EntityId};

use crate::animation::AnimatedModel;
use crate::display::KillTracker;
use crate::health::Health;

/// Result type for entity operations.
pub type EntityResult<T> = Result<T, EntityError>;

/// Position and orientation of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// World position
    pub position: Vec3,
    /// Orientation
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Marks an entity as driven by hostile NPC logic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NpcMarker {
    /// Kind of NPC, for logging
    pub kind: String,
}

impl NpcMarker {
    /// Creates a marker for `kind`.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

/// An entity in the simulation.
#[derive(Debug)]
pub struct Entity {
    /// Unique identifier
    id: EntityId,
    /// Registry name, unique when present
    name: Option<String>,
    /// Position and orientation
    transform: Transform,
    /// Health capability
    health: Option<Health>,
    /// Hostile NPC capability
    npc: Option<NpcMarker>,
    /// Indexed by the spatial grid and allowed to query it
    spatial_client: bool,
    /// Animated model capability
    animated: Option<AnimatedModel>,
    /// Kill counting capability
    kill_tracker: Option<KillTracker>,
    /// Topics this entity listens to besides its own address
    subscriptions: AHashSet<&'static str>,
    /// Whether entity is active
    active: bool,
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity {
    /// Creates a bare entity at the origin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: EntityId::new(),
            name: None,
            transform: Transform::default(),
            health: None,
            npc: None,
            spatial_client: false,
            animated: None,
            kill_tracker: None,
            subscriptions: AHashSet::new(),
            active: true,
        }
    }

    /// Gives the entity a registry name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Places the entity.
    #[must_use]
    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    /// Adds a full health capability.
    #[must_use]
    pub fn with_health(mut self, max: f32) -> Self {
        self.health = Some(Health::new(max));
        self
    }

    /// Marks the entity as a hostile NPC.
    #[must_use]
    pub fn with_npc_marker(mut self, marker: NpcMarker) -> Self {
        self.npc = Some(marker);
        self
    }

    /// Registers the entity with the spatial grid.
    #[must_use]
    pub fn with_spatial_client(mut self) -> Self {
        self.spatial_client = true;
        self
    }

    /// Adds an animated model capability.
    #[must_use]
    pub fn with_animated_model(mut self, model: AnimatedModel) -> Self {
        self.animated = Some(model);
        self
    }

    /// Adds a kill tracker.
    #[must_use]
    pub fn with_kill_tracker(mut self) -> Self {
        self.kill_tracker = Some(KillTracker::new());
        self
    }

    /// Subscribes to a broadcast topic.
    #[must_use]
    pub fn subscribed_to(mut self, topic: &'static str) -> Self {
        self.subscriptions.insert(topic);
        self
    }

    /// Returns the entity's unique ID.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the registry name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the transform.
    #[must_use]
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Returns the world position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Sets the world position.
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
    }

    /// Sets the orientation.
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
    }

    /// Returns the health capability.
    #[must_use]
    pub const fn health(&self) -> Option<&Health> {
        self.health.as_ref()
    }

    /// Returns the health capability mutably.
    pub fn health_mut(&mut self) -> Option<&mut Health> {
        self.health.as_mut()
    }

    /// Returns the NPC marker.
    #[must_use]
    pub const fn npc(&self) -> Option<&NpcMarker> {
        self.npc.as_ref()
    }

    /// Whether the spatial grid indexes this entity.
    #[must_use]
    pub const fn is_spatial_client(&self) -> bool {
        self.spatial_client
    }

    /// Returns the animated model capability.
    #[must_use]
    pub const fn animated_model(&self) -> Option<&AnimatedModel> {
        self.animated.as_ref()
    }

    /// Returns the animated model capability mutably.
    pub fn animated_model_mut(&mut self) -> Option<&mut AnimatedModel> {
        self.animated.as_mut()
    }

    /// Returns the kill tracker.
    #[must_use]
    pub const fn kill_tracker(&self) -> Option<&KillTracker> {
        self.kill_tracker.as_ref()
    }

    /// Returns the kill tracker mutably.
    pub fn kill_tracker_mut(&mut self) -> Option<&mut KillTracker> {
        self.kill_tracker.as_mut()
    }

    /// Whether the entity listens to `topic`.
    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains(topic)
    }

    /// Returns whether entity is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Deactivates the entity.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// Arena-based entity storage for efficient allocation and lookup.
///
/// Uses a free list for O(1) allocation and deallocation.
/// Entity lookup by ID and by name uses hash maps.
#[derive(Debug, Default)]
pub struct EntityArena {
    /// Storage slots for entities
    entities: Vec<Option<Entity>>,
    /// Free slot indices for reuse
    free_list: Vec<usize>,
    /// Map from EntityId to slot index
    id_to_index: AHashMap<EntityId, usize>,
    /// Map from registry name to entity
    names: AHashMap<String, EntityId>,
}

impl EntityArena {
    /// Creates a new empty entity arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_index.len()
    }

    /// Returns true if there are no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_index.is_empty()
    }

    /// Returns the total capacity (including free slots).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entities.len()
    }

    /// Stores an entity and returns its ID. Fails if its name is taken.
    pub fn spawn_entity(&mut self, entity: Entity) -> EntityResult<EntityId> {
        let id = entity.id();
        if let Some(name) = entity.name() {
            if self.names.contains_key(name) {
                return Err(EntityError::DuplicateName(name.to_string()));
            }
            self.names.insert(name.to_string(), id);
        }

        let index = if let Some(free_index) = self.free_list.pop() {
            self.entities[free_index] = Some(entity);
            free_index
        } else {
            let index = self.entities.len();
            self.entities.push(Some(entity));
            index
        };

        self.id_to_index.insert(id, index);
        Ok(id)
    }

    /// Removes an entity by ID and returns it.
    pub fn despawn(&mut self, id: EntityId) -> EntityResult<Entity> {
        let index = self
            .id_to_index
            .remove(&id)
            .ok_or(EntityError::NotFound(id))?;

        let entity = self.entities[index]
            .take()
            .ok_or(EntityError::NotFound(id))?;

        if let Some(name) = entity.name() {
            self.names.remove(name);
        }
        self.free_list.push(index);
        Ok(entity)
    }

    /// Gets a reference to an entity by ID.
    pub fn get(&self, id: EntityId) -> EntityResult<&Entity> {
        let index = self.id_to_index.get(&id).ok_or(EntityError::NotFound(id))?;

        self.entities[*index]
            .as_ref()
            .ok_or(EntityError::NotFound(id))
    }

    /// Gets a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> EntityResult<&mut Entity> {
        let index = self.id_to_index.get(&id).ok_or(EntityError::NotFound(id))?;

        self.entities[*index]
            .as_mut()
            .ok_or(EntityError::NotFound(id))
    }

    /// Looks up an entity ID by registry name.
    #[must_use]
    pub fn id_by_name(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    /// Checks if an entity with the given ID exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.id_to_index.contains_key(&id)
    }

    /// Returns an iterator over all live entities.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter_map(|opt| opt.as_ref())
    }

    /// Returns a mutable iterator over all live entities.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut().filter_map(|opt| opt.as_mut())
    }

    /// IDs of active entities subscribed to `topic`, in ascending order.
    #[must_use]
    pub fn subscribers(&self, topic: &str) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .iter()
            .filter(|e| e.is_active() && e.is_subscribed(topic))
            .map(Entity::id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
