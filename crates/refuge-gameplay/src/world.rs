//! World: owns entities and their controllers, and runs the frame.
//!
//! A frame polls pending model loads, dispatches queued messages, rebuilds
//! the spatial grid, updates controllers in ascending entity-id order,
//! advances mixers, then dispatches whatever the frame produced.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Quat, Vec3};
use tracing::{debug, info, trace, warn};

use refuge_common::{EntityError, EntityId};

use crate::animation::{AnimationClip, MixerHandle};
use crate::assets::{AssetLoad, AssetSource};
use crate::behavior::{BehaviorConfig, BehaviorController, BehaviorHost, NearbyEntity};
use crate::cascade::receive_death_trigger;
use crate::display::DisplayBoard;
use crate::entity::{Entity, EntityArena, EntityResult};
use crate::events::{Address, Envelope, EventBus, Message};
use crate::health::{DamageOutcome, Health};
use crate::spatial::SpatialGrid;

/// Upper bound on drain rounds per dispatch.
pub const MAX_DISPATCH_ROUNDS: usize = 8;

/// The simulation world.
pub struct World {
    entities: EntityArena,
    controllers: BTreeMap<EntityId, BehaviorController>,
    grid: SpatialGrid,
    bus: EventBus,
    assets: Arc<dyn AssetSource>,
    display: DisplayBoard,
    deaths: Vec<EntityId>,
    frame: u64,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("controllers", &self.controllers.len())
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl World {
    /// Creates an empty world loading assets from `assets`.
    #[must_use]
    pub fn new(assets: Arc<dyn AssetSource>) -> Self {
        Self {
            entities: EntityArena::new(),
            controllers: BTreeMap::new(),
            grid: SpatialGrid::default(),
            bus: EventBus::default(),
            assets,
            display: DisplayBoard::new(),
            deaths: Vec::new(),
            frame: 0,
        }
    }

    /// Adds an entity, starting its model load if it has one.
    pub fn spawn(&mut self, mut entity: Entity) -> EntityResult<EntityId> {
        if let Some(animated) = entity.animated_model_mut() {
            animated.begin_load(self.assets.as_ref());
        }
        let id = self.entities.spawn_entity(entity)?;
        debug!(%id, "Spawned entity");
        Ok(id)
    }

    /// Attaches a behavior controller to an existing entity.
    pub fn attach_controller(&mut self, id: EntityId, config: BehaviorConfig) -> EntityResult<()> {
        if !self.entities.contains(id) {
            return Err(EntityError::NotFound(id));
        }
        self.controllers.insert(id, BehaviorController::new(config));
        Ok(())
    }

    /// Removes an entity and its controller. In-flight loads are dropped
    /// with it.
    pub fn despawn(&mut self, id: EntityId) -> EntityResult<Entity> {
        self.controllers.remove(&id);
        let entity = self.entities.despawn(id)?;
        debug!(%id, "Despawned entity");
        Ok(entity)
    }

    /// Entity by id.
    pub fn entity(&self, id: EntityId) -> EntityResult<&Entity> {
        self.entities.get(id)
    }

    /// Entity by id, mutably.
    pub fn entity_mut(&mut self, id: EntityId) -> EntityResult<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Entity id registered under `name`.
    #[must_use]
    pub fn id_by_name(&self, name: &str) -> Option<EntityId> {
        self.entities.id_by_name(name)
    }

    /// All entities.
    #[must_use]
    pub fn entities(&self) -> &EntityArena {
        &self.entities
    }

    /// Controller attached to `id`.
    #[must_use]
    pub fn controller(&self, id: EntityId) -> Option<&BehaviorController> {
        self.controllers.get(&id)
    }

    /// Health display sink.
    #[must_use]
    pub fn display(&self) -> &DisplayBoard {
        &self.display
    }

    /// Message bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Entities that received a death message, in delivery order.
    #[must_use]
    pub fn deaths(&self) -> &[EntityId] {
        &self.deaths
    }

    /// Frames run so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Queues a message.
    pub fn publish(&self, address: Address, message: Message) -> bool {
        self.bus.publish(address, message)
    }

    /// Damages `target`. Publishes the damage, and on the killing blow the
    /// death plus an experience award to `attacker`.
    pub fn apply_damage(
        &mut self,
        target: EntityId,
        amount: f32,
        attacker: Option<EntityId>,
    ) -> EntityResult<DamageOutcome> {
        let health = self
            .entities
            .get_mut(target)?
            .health_mut()
            .ok_or(EntityError::NoHealth(target))?;
        let outcome = health.apply_damage(amount);
        let (current, max) = (health.current(), health.max());

        if outcome.dealt > 0.0 {
            self.bus.send_to(target, Message::HealthDamage {
                value: outcome.dealt,
            });
        }
        if outcome.killed {
            info!(%target, "Entity killed");
            self.bus.send_to(target, Message::HealthDeath {
                health: current,
                max_health: max,
            });
            if let Some(attacker) = attacker {
                self.bus
                    .send_to(attacker, Message::AddExperience { value: max });
            }
        }
        Ok(outcome)
    }

    /// Runs one frame.
    pub fn tick(&mut self, dt: f32) {
        self.frame += 1;
        trace!(frame = self.frame, "Tick");

        self.poll_model_loads();
        self.dispatch();
        self.grid.rebuild(&self.entities);

        let ids: Vec<EntityId> = self.controllers.keys().copied().collect();
        for id in ids {
            let Some(controller) = self.controllers.get_mut(&id) else {
                continue;
            };
            let mut host = WorldHost {
                id,
                entities: &mut self.entities,
                grid: &self.grid,
                bus: &self.bus,
                assets: self.assets.as_ref(),
            };
            controller.update(dt, &mut host);
        }

        for entity in self.entities.iter() {
            if let Some(animated) = entity.animated_model() {
                animated.update(dt);
            }
        }

        self.dispatch();
    }

    fn poll_model_loads(&mut self) {
        for entity in self.entities.iter_mut() {
            let id = entity.id();
            let Some(animated) = entity.animated_model_mut() else {
                continue;
            };
            if let Some(model) = animated.poll_load() {
                self.bus.send_to(id, Message::LoadCharacter { model });
            }
        }
    }

    /// Delivers queued messages until the bus is empty or the round limit is
    /// reached.
    pub fn dispatch(&mut self) {
        for _ in 0..MAX_DISPATCH_ROUNDS {
            let envelopes = self.bus.drain();
            if envelopes.is_empty() {
                return;
            }
            for envelope in envelopes {
                self.route(envelope);
            }
        }
        if self.bus.pending_count() > 0 {
            warn!(
                "Dispatch stopped after {MAX_DISPATCH_ROUNDS} rounds with {} messages queued",
                self.bus.pending_count()
            );
        }
    }

    fn route(&mut self, envelope: Envelope) {
        match envelope.address {
            Address::Entity(id) => self.deliver(id, &envelope.message),
            Address::Topic(topic) => {
                for id in self.entities.subscribers(topic) {
                    self.deliver(id, &envelope.message);
                }
            },
        }
    }

    fn deliver(&mut self, id: EntityId, message: &Message) {
        let Ok(entity) = self.entities.get_mut(id) else {
            debug!(%id, "Dropping {} for missing entity", message.topic());
            return;
        };

        match message {
            Message::HealthUpdate { health, max_health } => {
                self.display.record(id, *health, *max_health);
            },
            Message::AddExperience { .. } => {
                if let Some(tracker) = entity.kill_tracker_mut() {
                    tracker.on_kill();
                    info!(%id, "Kill count: {}", tracker.kills());
                }
            },
            Message::PlayerDeathTrigger { source } => {
                if let Some(death) = entity
                    .health_mut()
                    .and_then(|health: &mut Health| receive_death_trigger(id, health, *source))
                {
                    self.bus.send_to(id, death);
                }
            },
            Message::HealthDeath { .. } => {
                self.deaths.push(id);
            },
            Message::LoadCharacter { .. } | Message::HealthDamage { .. } => {},
        }

        if let Some(controller) = self.controllers.get_mut(&id) {
            let mut host = WorldHost {
                id,
                entities: &mut self.entities,
                grid: &self.grid,
                bus: &self.bus,
                assets: self.assets.as_ref(),
            };
            controller.handle(message, &mut host);
        }
    }
}

/// [`BehaviorHost`] view of one entity inside a [`World`].
struct WorldHost<'w> {
    id: EntityId,
    entities: &'w mut EntityArena,
    grid: &'w SpatialGrid,
    bus: &'w EventBus,
    assets: &'w dyn AssetSource,
}

impl BehaviorHost for WorldHost<'_> {
    fn entity(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Option<Vec3> {
        self.entities.get(self.id).ok().map(Entity::position)
    }

    fn set_position(&mut self, position: Vec3) {
        if let Ok(entity) = self.entities.get_mut(self.id) {
            entity.set_position(position);
        }
    }

    fn set_rotation(&mut self, rotation: Quat) {
        if let Ok(entity) = self.entities.get_mut(self.id) {
            entity.set_rotation(rotation);
        }
    }

    fn health(&self) -> Option<crate::health::HealthSnapshot> {
        self.entities
            .get(self.id)
            .ok()
            .and_then(Entity::health)
            .map(Health::snapshot)
    }

    fn nearby(&self, radius: f32) -> Option<Vec<NearbyEntity>> {
        let me = self.entities.get(self.id).ok()?;
        if !me.is_spatial_client() {
            return None;
        }
        let found = self
            .grid
            .find_nearby(me.position(), radius, Some(self.id))
            .into_iter()
            .filter_map(|id| self.entities.get(id).ok())
            .map(|e| NearbyEntity {
                id: e.id(),
                position: e.position(),
                npc: e.npc().is_some(),
                health: e.health().map(Health::snapshot),
            })
            .collect();
        Some(found)
    }

    fn mixer(&self) -> Option<MixerHandle> {
        self.entities
            .get(self.id)
            .ok()
            .and_then(Entity::animated_model)
            .and_then(|a| a.mixer().cloned())
    }

    fn load_clips(&self, path: &str) -> AssetLoad<Vec<AnimationClip>> {
        self.assets.load_clips(path)
    }

    fn publish(&mut self, address: Address, message: Message) -> bool {
        self.bus.publish(address, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimatedModel;
    use crate::assets::{asset_channel, MemoryAssets, ModelData};
    use crate::behavior::{AnimationBinding, Mode};
    use crate::entity::NpcMarker;
    use crate::events::topics;
    use refuge_common::{GIRL_NAME, PLAYER_NAME};

    const MODEL: &str = "girl/girl.fbx";

    fn assets() -> Arc<dyn AssetSource> {
        Arc::new(
            MemoryAssets::new()
                .with_model(MODEL, ModelData::new("girl"))
                .with_clips(BehaviorConfig::default().clip_asset, vec![
                    AnimationClip::new("idle", 2.0),
                    AnimationClip::new("run", 0.8),
                ]),
        )
    }

    fn config() -> BehaviorConfig {
        BehaviorConfig {
            seed: Some(11),
            ..BehaviorConfig::default()
        }
    }

    /// World with a girl at the origin and a player nearby.
    fn setup() -> (World, EntityId, EntityId) {
        let mut world = World::new(assets());
        let girl = world
            .spawn(
                Entity::new()
                    .with_name(GIRL_NAME)
                    .with_health(100.0)
                    .with_spatial_client()
                    .with_animated_model(AnimatedModel::new(MODEL)),
            )
            .expect("spawn girl");
        world
            .attach_controller(girl, config())
            .expect("girl exists");
        let player = world
            .spawn(
                Entity::new()
                    .with_name(PLAYER_NAME)
                    .at(Vec3::new(3.0, 0.0, 0.0))
                    .with_health(100.0)
                    .with_spatial_client()
                    .with_kill_tracker()
                    .subscribed_to(topics::PLAYER_DEATH_TRIGGER),
            )
            .expect("spawn player");
        (world, girl, player)
    }

    fn spawn_monster(world: &mut World, position: Vec3) -> EntityId {
        world
            .spawn(
                Entity::new()
                    .at(position)
                    .with_health(40.0)
                    .with_npc_marker(NpcMarker::new("zombie"))
                    .with_spatial_client(),
            )
            .expect("spawn monster")
    }

    #[test]
    fn test_load_flow_binds_animation() {
        let (mut world, girl, _) = setup();
        let ctrl = world.controller(girl).expect("controller attached");
        assert!(!ctrl.is_loaded());

        world.tick(0.1);
        let ctrl = world.controller(girl).expect("controller attached");
        assert!(ctrl.is_loaded());
        assert!(ctrl.animation().is_bound());
        assert!(ctrl.model().is_some());
    }

    #[test]
    fn test_player_is_not_a_threat() {
        let (mut world, girl, _) = setup();
        for _ in 0..5 {
            world.tick(0.1);
        }
        let ctrl = world.controller(girl).expect("controller attached");
        assert_eq!(ctrl.mode(), Mode::Wandering);
    }

    #[test]
    fn test_girl_flees_monster() {
        let (mut world, girl, _) = setup();
        spawn_monster(&mut world, Vec3::new(0.0, 0.0, 5.0));
        world.tick(0.0);
        world.tick(1.0);

        let ctrl = world.controller(girl).expect("controller attached");
        assert_eq!(ctrl.mode(), Mode::Fleeing);
        let pos = world.entity(girl).expect("girl exists").position();
        assert!(pos.z < 0.0);
        assert_eq!(pos.y, 0.0);
    }

    #[test]
    fn test_dead_monster_ignored() {
        let (mut world, girl, player) = setup();
        let monster = spawn_monster(&mut world, Vec3::new(0.0, 0.0, 5.0));
        world
            .apply_damage(monster, 100.0, Some(player))
            .expect("monster has health");
        world.tick(0.5);
        world.tick(0.5);
        let ctrl = world.controller(girl).expect("controller attached");
        assert_eq!(ctrl.mode(), Mode::Wandering);
    }

    #[test]
    fn test_kill_awards_experience() {
        let (mut world, _, player) = setup();
        let monster = spawn_monster(&mut world, Vec3::new(50.0, 0.0, 50.0));
        let outcome = world
            .apply_damage(monster, 100.0, Some(player))
            .expect("monster has health");
        assert!(outcome.killed);
        world.dispatch();

        let tracker = world
            .entity(player)
            .expect("player exists")
            .kill_tracker()
            .expect("player tracks kills");
        assert_eq!(tracker.kills(), 1);
        assert_eq!(world.deaths(), &[monster]);
    }

    #[test]
    fn test_damage_updates_display() {
        let (mut world, girl, _) = setup();
        world.tick(0.1);
        let before = world.display().get(girl).map_or(0, |r| r.updates);

        world.apply_damage(girl, 30.0, None).expect("girl has health");
        world.dispatch();

        let readout = world.display().get(girl).expect("girl displayed");
        assert_eq!(readout.health, 70.0);
        assert_eq!(readout.updates, before + 1);
    }

    #[test]
    fn test_damage_without_health() {
        let mut world = World::new(assets());
        let rock = world.spawn(Entity::new()).expect("spawn rock");
        assert_eq!(
            world.apply_damage(rock, 5.0, None),
            Err(EntityError::NoHealth(rock))
        );
    }

    #[test]
    fn test_girl_death_kills_player_once() {
        let (mut world, girl, player) = setup();
        world.tick(0.1);

        world.apply_damage(girl, 500.0, None).expect("girl has health");
        // A second death notice must not kill the player twice.
        world.publish(Address::Entity(girl), Message::HealthDeath {
            health: 0.0,
            max_health: 100.0,
        });
        world.tick(0.1);

        let player_health = world
            .entity(player)
            .expect("player exists")
            .health()
            .expect("player has health");
        assert_eq!(player_health.current(), 0.0);
        assert_eq!(world.deaths().iter().filter(|&&id| id == player).count(), 1);

        let ctrl = world.controller(girl).expect("controller attached");
        assert_eq!(ctrl.cascade().triggers_sent(), 2);
        assert_eq!(ctrl.velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_dead_girl_stops_moving() {
        let (mut world, girl, _) = setup();
        spawn_monster(&mut world, Vec3::new(0.0, 0.0, 5.0));
        world.tick(0.5);
        world.apply_damage(girl, 100.0, None).expect("girl has health");
        world.tick(0.5);

        let pos = world.entity(girl).expect("girl exists").position();
        world.tick(1.0);
        assert_eq!(world.entity(girl).expect("girl exists").position(), pos);
    }

    #[test]
    fn test_despawn_mid_load() {
        let mut world = World::new(assets());
        let (sender, load) = asset_channel(MODEL);
        let mut animated = AnimatedModel::new(MODEL);
        animated.attach_load(load);
        let girl = world
            .spawn(Entity::new().with_animated_model(animated))
            .expect("spawn girl");
        world.attach_controller(girl, config()).expect("girl exists");

        world.tick(0.1);
        world.despawn(girl).expect("despawn girl");
        assert!(!sender.complete(Ok(ModelData::new("girl"))));
        world.tick(0.1);
        assert!(world.controller(girl).is_none());
    }

    #[test]
    fn test_failed_model_load_keeps_controller_idle() {
        let mut world = World::new(Arc::new(MemoryAssets::new()));
        let girl = world
            .spawn(
                Entity::new()
                    .at(Vec3::new(1.0, 0.0, 1.0))
                    .with_animated_model(AnimatedModel::new("missing.fbx")),
            )
            .expect("spawn girl");
        world.attach_controller(girl, config()).expect("girl exists");

        world.tick(1.0);
        world.tick(1.0);
        let ctrl = world.controller(girl).expect("controller attached");
        assert!(!ctrl.is_loaded());
        assert!(matches!(
            ctrl.animation(),
            AnimationBinding::Unbound { pending: None }
        ));
        assert_eq!(
            world.entity(girl).expect("girl exists").position(),
            Vec3::new(1.0, 0.0, 1.0)
        );
    }

    #[test]
    fn test_attach_controller_missing_entity() {
        let mut world = World::new(assets());
        let ghost = EntityId::from_raw(u64::MAX);
        assert_eq!(
            world.attach_controller(ghost, config()),
            Err(EntityError::NotFound(ghost))
        );
    }

    #[test]
    fn test_dispatch_drains_queue() {
        let mut world = World::new(assets());
        let id = world.spawn(Entity::new().with_health(10.0)).expect("spawn");
        for _ in 0..4 {
            world.publish(Address::Entity(id), Message::HealthUpdate {
                health: 10.0,
                max_health: 10.0,
            });
        }
        world.dispatch();
        assert_eq!(world.bus().pending_count(), 0);
        assert_eq!(world.display().total_updates(), 4);
        assert_eq!(world.frame(), 0);
    }
}
