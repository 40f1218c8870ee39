//! Flee/wander behavior controller for the escorted character.
//!
//! Every tick the controller asks its host for nearby entities, keeps those
//! that are live hostile NPCs, and either runs from their centroid or wanders
//! on a randomly resampled heading. Mode changes drive a two-action animation
//! set (idle and run) with hard cuts.
//!
//! The controller never reaches into other entities. Everything it needs from
//! the outside goes through [`BehaviorHost`], and everything it says to other
//! systems goes out as [`Message`]s.

use std::f32::consts::TAU;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use refuge_common::{
    centroid, exceeds_horizontal_bounds, heading_to_origin, horizontal_unit, pin_to_ground,
    yaw_from_direction, yaw_rotation, AssetError, EntityId,
};

use crate::animation::{ActionId, AnimationClip, LoopMode, MixerHandle, ModelHandle};
use crate::assets::{AssetLoad, LoadPoll};
use crate::cascade::DeathCascade;
use crate::display::HealthBridge;
use crate::events::{Address, Message};
use crate::health::HealthSnapshot;

/// Below this health ratio the character runs faster.
pub const LOW_HEALTH_RATIO: f32 = 0.5;
/// Flee speed multiplier applied under low health.
pub const LOW_HEALTH_FLEE_MULTIPLIER: f32 = 1.5;
/// Shortest time between wander heading changes.
pub const WANDER_INTERVAL_MIN: f32 = 3.0;
/// Random extra time added to [`WANDER_INTERVAL_MIN`].
pub const WANDER_INTERVAL_SPREAD: f32 = 2.0;
/// Half extent of the square the character wanders in.
pub const WANDER_BOUNDARY: f32 = 200.0;

/// Static parameters of a behavior controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Radius for threat queries
    pub detection_range: f32,
    /// Flee speed in units per second
    pub flee_speed: f32,
    /// Wander speed in units per second
    pub walk_speed: f32,
    /// Asset holding the idle and run clips
    pub clip_asset: String,
    /// Seed for wander randomness (None = random)
    pub seed: Option<u64>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            detection_range: 15.0,
            flee_speed: 2.0,
            walk_speed: 1.0,
            clip_asset: "girl/Run_Look_Back_girl.fbx".to_string(),
            seed: None,
        }
    }
}

impl BehaviorConfig {
    /// Replaces non-positive or non-finite values with defaults.
    pub fn validate(&mut self) {
        let defaults = Self::default();
        if !(self.detection_range.is_finite() && self.detection_range > 0.0) {
            warn!("Invalid detection_range {}, using default", self.detection_range);
            self.detection_range = defaults.detection_range;
        }
        if !(self.flee_speed.is_finite() && self.flee_speed > 0.0) {
            warn!("Invalid flee_speed {}, using default", self.flee_speed);
            self.flee_speed = defaults.flee_speed;
        }
        if !(self.walk_speed.is_finite() && self.walk_speed > 0.0) {
            warn!("Invalid walk_speed {}, using default", self.walk_speed);
            self.walk_speed = defaults.walk_speed;
        }
    }
}

/// Current behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Idle wandering
    #[default]
    Wandering,
    /// Running from threats
    Fleeing,
}

/// An entity returned by a spatial query, reduced to the capabilities the
/// threat filter looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyEntity {
    /// Entity id
    pub id: EntityId,
    /// Current position
    pub position: Vec3,
    /// Whether it carries an NPC marker
    pub npc: bool,
    /// Its health, if it has any
    pub health: Option<HealthSnapshot>,
}

impl NearbyEntity {
    /// A threat is a hostile NPC with health left.
    #[must_use]
    pub fn is_threat(&self) -> bool {
        self.npc && self.health.is_some_and(|h| h.health > 0.0)
    }
}

/// What a controller needs from the entity that owns it.
pub trait BehaviorHost {
    /// Id of the owning entity.
    fn entity(&self) -> EntityId;
    /// Position of the owning entity, if known.
    fn position(&self) -> Option<Vec3>;
    /// Moves the owning entity.
    fn set_position(&mut self, position: Vec3);
    /// Rotates the owning entity.
    fn set_rotation(&mut self, rotation: Quat);
    /// Health of the owning entity, if it has a health capability.
    fn health(&self) -> Option<HealthSnapshot>;
    /// Entities within `radius`, or `None` without a spatial capability.
    fn nearby(&self, radius: f32) -> Option<Vec<NearbyEntity>>;
    /// Mixer of the owning entity's animated model.
    fn mixer(&self) -> Option<MixerHandle>;
    /// Starts loading animation clips.
    fn load_clips(&self, path: &str) -> AssetLoad<Vec<AnimationClip>>;
    /// Sends a message. Returns false if it was dropped.
    fn publish(&mut self, address: Address, message: Message) -> bool;
}

/// Idle and run actions bound to a mixer.
#[derive(Debug, Clone)]
pub struct AnimationSet {
    mixer: MixerHandle,
    idle: ActionId,
    run: ActionId,
    current: ActionId,
}

impl AnimationSet {
    fn action_for(&self, mode: Mode) -> ActionId {
        match mode {
            Mode::Wandering => self.idle,
            Mode::Fleeing => self.run,
        }
    }

    /// Hard cut to the action for `mode`.
    fn switch_to(&mut self, mode: Mode) {
        let next = self.action_for(mode);
        let mut mixer = self.mixer.write();
        if let Some(action) = mixer.action_mut(self.current) {
            action.stop();
        }
        if let Some(action) = mixer.action_mut(next) {
            action.reset();
            action.set_loop(LoopMode::Repeat);
            action.play();
        }
        self.current = next;
    }

    fn stop_current(&self) {
        if let Some(action) = self.mixer.write().action_mut(self.current) {
            action.stop();
        }
    }

    /// Action currently selected.
    #[must_use]
    pub fn current(&self) -> ActionId {
        self.current
    }

    /// Idle action.
    #[must_use]
    pub fn idle(&self) -> ActionId {
        self.idle
    }

    /// Run action.
    #[must_use]
    pub fn run(&self) -> ActionId {
        self.run
    }
}

/// Readiness of the animation set.
#[derive(Debug, Clone)]
pub enum AnimationBinding {
    /// Clips not available yet. A mode change requested meanwhile is kept
    /// and replayed once binding completes.
    Unbound {
        /// Mode whose action should start on binding
        pending: Option<Mode>,
    },
    /// Actions bound and one of them selected
    Bound(AnimationSet),
}

impl AnimationBinding {
    /// Whether the animation set is ready.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }
}

/// Per-entity flee/wander controller.
#[derive(Debug)]
pub struct BehaviorController {
    config: BehaviorConfig,
    velocity: Vec3,
    mode: Mode,
    wander_direction: Vec3,
    flee_direction: Vec3,
    wander_timer: f32,
    model: Option<ModelHandle>,
    mixer: Option<MixerHandle>,
    animation: AnimationBinding,
    clip_load: Option<AssetLoad<Vec<AnimationClip>>>,
    loaded: bool,
    rng: fastrand::Rng,
    bridge: HealthBridge,
    cascade: DeathCascade,
}

impl BehaviorController {
    /// Creates a controller in the unloaded wandering state.
    #[must_use]
    pub fn new(mut config: BehaviorConfig) -> Self {
        config.validate();
        let mut rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let wander_direction = horizontal_unit(rng.f32() * TAU);
        Self {
            config,
            velocity: Vec3::ZERO,
            mode: Mode::Wandering,
            wander_direction,
            flee_direction: Vec3::ZERO,
            wander_timer: 0.0,
            model: None,
            mixer: None,
            animation: AnimationBinding::Unbound { pending: None },
            clip_load: None,
            loaded: false,
            rng,
            bridge: HealthBridge,
            cascade: DeathCascade::default(),
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Last computed velocity.
    #[must_use]
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Current wander heading.
    #[must_use]
    pub fn wander_direction(&self) -> Vec3 {
        self.wander_direction
    }

    /// Last flee heading.
    #[must_use]
    pub fn flee_direction(&self) -> Vec3 {
        self.flee_direction
    }

    /// Time since the last wander heading change.
    #[must_use]
    pub fn wander_timer(&self) -> f32 {
        self.wander_timer
    }

    /// Whether the model reference arrived.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The owning entity's model, once loaded.
    #[must_use]
    pub fn model(&self) -> Option<&ModelHandle> {
        self.model.as_ref()
    }

    /// Animation readiness.
    #[must_use]
    pub fn animation(&self) -> &AnimationBinding {
        &self.animation
    }

    /// Whether a clip load is still in flight.
    #[must_use]
    pub fn is_loading_clips(&self) -> bool {
        self.clip_load.is_some()
    }

    /// Death cascade state.
    #[must_use]
    pub fn cascade(&self) -> &DeathCascade {
        &self.cascade
    }

    /// Overrides the wander heading. Non-zero input is normalized.
    pub fn set_wander_direction(&mut self, direction: Vec3) {
        self.wander_direction = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
    }

    /// Handles a message addressed to the owning entity.
    pub fn handle<H: BehaviorHost>(&mut self, message: &Message, host: &mut H) {
        match message {
            Message::LoadCharacter { model } => self.on_character_loaded(model.clone(), host),
            Message::HealthDamage { value } => self.bridge.on_damage(*value, host),
            Message::HealthDeath { .. } => self.on_death(host),
            _ => {},
        }
    }

    fn on_character_loaded<H: BehaviorHost>(&mut self, model: ModelHandle, host: &mut H) {
        self.model = Some(model);
        self.loaded = true;
        info!(entity = %host.entity(), "Character model loaded");

        match host.mixer() {
            Some(mixer) => {
                self.mixer = Some(mixer);
                self.clip_load = Some(host.load_clips(&self.config.clip_asset));
            },
            None => debug!(entity = %host.entity(), "No mixer, animation stays unbound"),
        }
    }

    fn on_death<H: BehaviorHost>(&mut self, host: &mut H) {
        info!(entity = %host.entity(), "Character died");
        self.velocity = Vec3::ZERO;
        self.mode = Mode::Wandering;
        if let AnimationBinding::Bound(set) = &self.animation {
            set.stop_current();
        }
        self.cascade.trigger(host);
    }

    fn poll_clip_load(&mut self) {
        let Some(load) = &self.clip_load else {
            return;
        };
        match load.poll() {
            LoadPoll::Pending => {},
            LoadPoll::Ready(clips) => {
                let path = load.path().to_string();
                self.clip_load = None;
                self.bind_clips(&path, &clips);
            },
            LoadPoll::Failed(err) => {
                self.clip_load = None;
                warn!("Animation clips failed to load: {err}");
            },
        }
    }

    fn bind_clips(&mut self, path: &str, clips: &[AnimationClip]) {
        let [idle_clip, run_clip, ..] = clips else {
            let err = AssetError::Malformed {
                path: path.to_string(),
                reason: format!("expected 2 animations, found {}", clips.len()),
            };
            warn!("{err}");
            return;
        };
        let Some(mixer) = self.mixer.clone() else {
            return;
        };
        let (idle, run) = {
            let mut m = mixer.write();
            (m.add_action(idle_clip), m.add_action(run_clip))
        };
        let pending = match &self.animation {
            AnimationBinding::Unbound { pending } => *pending,
            AnimationBinding::Bound(_) => None,
        };

        let mut set = AnimationSet {
            mixer,
            idle,
            run,
            current: idle,
        };
        set.switch_to(self.mode);
        if let Some(mode) = pending {
            debug!("Replayed pending {mode:?} transition on binding");
        }
        info!("Idle and run animations bound");
        self.animation = AnimationBinding::Bound(set);
    }

    fn enter<H: BehaviorHost>(&mut self, mode: Mode, host: &H) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        match mode {
            Mode::Fleeing => info!(entity = %host.entity(), "Started running"),
            Mode::Wandering => {
                self.velocity = Vec3::ZERO;
                info!(entity = %host.entity(), "Stopped running, back to idle");
            },
        }
        match &mut self.animation {
            AnimationBinding::Bound(set) => set.switch_to(mode),
            AnimationBinding::Unbound { pending } => {
                *pending = Some(mode);
                debug!("Animation not bound yet, {mode:?} transition pending");
            },
        }
    }

    fn face<H: BehaviorHost>(&self, direction: Vec3, host: &mut H) {
        let yaw = yaw_from_direction(direction);
        host.set_rotation(yaw_rotation(yaw));
        if let Some(model) = &self.model {
            model.set_yaw(yaw);
        }
    }

    /// Advances the controller by `dt` seconds.
    pub fn update<H: BehaviorHost>(&mut self, dt: f32, host: &mut H) {
        if !self.loaded {
            return;
        }
        let Some(position) = host.position() else {
            return;
        };
        let health = host.health();
        if health.is_some_and(|h| !h.is_alive()) {
            return;
        }

        self.bridge.publish_display(host);
        self.wander_timer += dt;
        self.poll_clip_load();

        let threats: Vec<Vec3> = host
            .nearby(self.config.detection_range)
            .unwrap_or_default()
            .into_iter()
            .filter(NearbyEntity::is_threat)
            .map(|e| e.position)
            .collect();
        let low_health = health.is_some_and(|h| h.ratio() < LOW_HEALTH_RATIO);

        if threats.is_empty() {
            self.wander(position, dt, host);
        } else {
            debug!(entity = %host.entity(), "Detected {} threats nearby", threats.len());
            self.flee(position, &threats, low_health, dt, host);
        }
    }

    fn flee<H: BehaviorHost>(
        &mut self,
        position: Vec3,
        threats: &[Vec3],
        low_health: bool,
        dt: f32,
        host: &mut H,
    ) {
        let center = centroid(threats.iter().copied()).unwrap_or(position);
        self.flee_direction = (position - center).normalize_or_zero();
        self.enter(Mode::Fleeing, host);

        let speed = if low_health {
            self.config.flee_speed * LOW_HEALTH_FLEE_MULTIPLIER
        } else {
            self.config.flee_speed
        };
        self.velocity = self.flee_direction * speed;
        host.set_position(pin_to_ground(position + self.velocity * dt));

        if self.flee_direction != Vec3::ZERO {
            self.face(self.flee_direction, host);
        }
    }

    fn wander<H: BehaviorHost>(&mut self, position: Vec3, dt: f32, host: &mut H) {
        self.enter(Mode::Wandering, host);

        if dt > 0.0 {
            let threshold = WANDER_INTERVAL_MIN + self.rng.f32() * WANDER_INTERVAL_SPREAD;
            if self.wander_timer > threshold {
                self.wander_direction = horizontal_unit(self.rng.f32() * TAU);
                self.wander_timer = 0.0;
            }
        }

        self.velocity = self.wander_direction * self.config.walk_speed;
        let next = pin_to_ground(position + self.velocity * dt);

        if exceeds_horizontal_bounds(next, WANDER_BOUNDARY) {
            self.wander_direction = heading_to_origin(next);
            debug!(entity = %host.entity(), "Out of bounds at {next}, turning toward center");
        }

        host.set_position(next);
        if self.wander_direction != Vec3::ZERO {
            self.face(self.wander_direction, host);
        }
    }
}

/// In-memory host for driving a controller without a world.
#[derive(Debug)]
pub struct MockBehaviorHost {
    /// Owning entity id
    pub id: EntityId,
    /// Position (None = unknown)
    pub position: Option<Vec3>,
    /// Last rotation set
    pub rotation: Quat,
    /// Health (None = no health capability)
    pub health: Option<HealthSnapshot>,
    /// Nearby entities (None = no spatial capability)
    pub nearby: Option<Vec<NearbyEntity>>,
    /// Mixer handed out on load
    pub mixer: Option<MixerHandle>,
    /// Clips delivered on request (None = the load is abandoned)
    pub clips: Option<Vec<AnimationClip>>,
    /// Messages published so far
    pub published: Vec<(Address, Message)>,
    /// Publishes beyond this many are rejected (None = unbounded)
    pub publish_limit: Option<usize>,
}

impl MockBehaviorHost {
    /// Creates a host at `position` with full health, a spatial capability
    /// and a mixer.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            id: EntityId::from_raw(1),
            position: Some(position),
            rotation: Quat::IDENTITY,
            health: Some(HealthSnapshot {
                health: 100.0,
                max_health: 100.0,
            }),
            nearby: Some(Vec::new()),
            mixer: Some(MixerHandle::new()),
            clips: None,
            published: Vec::new(),
            publish_limit: None,
        }
    }

    /// Adds a live hostile NPC at `position`.
    pub fn add_threat(&mut self, position: Vec3) {
        let id = EntityId::from_raw(100 + self.nearby.as_ref().map_or(0, Vec::len) as u64);
        self.nearby.get_or_insert_with(Vec::new).push(NearbyEntity {
            id,
            position,
            npc: true,
            health: Some(HealthSnapshot {
                health: 50.0,
                max_health: 50.0,
            }),
        });
    }

    /// Messages published under `topic`.
    #[must_use]
    pub fn published_on(&self, topic: &str) -> Vec<&Message> {
        self.published
            .iter()
            .filter(|(_, m)| m.topic() == topic)
            .map(|(_, m)| m)
            .collect()
    }
}

impl BehaviorHost for MockBehaviorHost {
    fn entity(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Option<Vec3> {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = Some(position);
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn health(&self) -> Option<HealthSnapshot> {
        self.health
    }

    fn nearby(&self, radius: f32) -> Option<Vec<NearbyEntity>> {
        let origin = self.position.unwrap_or(Vec3::ZERO);
        self.nearby.as_ref().map(|all| {
            all.iter()
                .filter(|e| e.position.distance(origin) <= radius)
                .copied()
                .collect()
        })
    }

    fn mixer(&self) -> Option<MixerHandle> {
        self.mixer.clone()
    }

    fn load_clips(&self, path: &str) -> AssetLoad<Vec<AnimationClip>> {
        let (sender, load) = crate::assets::asset_channel(path);
        if let Some(clips) = &self.clips {
            sender.complete(Ok(clips.clone()));
        }
        load
    }

    fn publish(&mut self, address: Address, message: Message) -> bool {
        if self
            .publish_limit
            .is_some_and(|limit| self.published.len() >= limit)
        {
            return false;
        }
        self.published.push((address, message));
        true
    }
}
