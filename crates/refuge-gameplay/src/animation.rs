//! Animated model capability: shared model transform and a time-driven mixer.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assets::{AssetLoad, AssetSource, LoadPoll, ModelData};

/// A named animation clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    /// Clip name
    pub name: String,
    /// Length in seconds
    pub duration: f32,
}

impl AnimationClip {
    /// Creates a clip.
    #[must_use]
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

/// How an action behaves when it reaches the end of its clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Stop at the end
    #[default]
    Once,
    /// Wrap around forever
    Repeat,
}

/// Index of an action inside its mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(usize);

/// Playback state of one clip.
#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: AnimationClip,
    time: f32,
    playing: bool,
    loop_mode: LoopMode,
}

impl AnimationAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time: 0.0,
            playing: false,
            loop_mode: LoopMode::Once,
        }
    }

    /// The clip being played.
    #[must_use]
    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    /// Playback position in seconds.
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Whether the action is running.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Current loop mode.
    #[must_use]
    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Starts playback from the current position.
    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Stops playback and rewinds.
    pub fn stop(&mut self) {
        self.playing = false;
        self.time = 0.0;
    }

    /// Rewinds without changing the playing flag.
    pub fn reset(&mut self) {
        self.time = 0.0;
    }

    /// Sets the loop mode.
    pub fn set_loop(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        self.time += dt;
        let duration = self.clip.duration;
        if self.time < duration {
            return;
        }
        match self.loop_mode {
            LoopMode::Repeat if duration > 0.0 => self.time %= duration,
            LoopMode::Repeat => self.time = 0.0,
            LoopMode::Once => {
                self.time = duration;
                self.playing = false;
            },
        }
    }
}

/// Drives every action bound to one model.
#[derive(Debug, Default)]
pub struct AnimationMixer {
    actions: Vec<AnimationAction>,
}

impl AnimationMixer {
    /// Creates an empty mixer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stopped action for `clip`. Every call yields a new action,
    /// so clips exported under the same name stay distinct.
    pub fn add_action(&mut self, clip: &AnimationClip) -> ActionId {
        self.actions.push(AnimationAction::new(clip.clone()));
        ActionId(self.actions.len() - 1)
    }

    /// Looks up an action.
    #[must_use]
    pub fn action(&self, id: ActionId) -> Option<&AnimationAction> {
        self.actions.get(id.0)
    }

    /// Looks up an action mutably.
    pub fn action_mut(&mut self, id: ActionId) -> Option<&mut AnimationAction> {
        self.actions.get_mut(id.0)
    }

    /// Ids of all actions currently playing.
    pub fn playing(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.playing)
            .map(|(i, _)| ActionId(i))
    }

    /// Number of actions created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no action was created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Advances every playing action.
    pub fn update(&mut self, dt: f32) {
        for action in &mut self.actions {
            action.advance(dt);
        }
    }
}

/// Shared handle to a mixer.
#[derive(Debug, Clone, Default)]
pub struct MixerHandle(Arc<RwLock<AnimationMixer>>);

impl MixerHandle {
    /// Wraps a fresh mixer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access.
    pub fn read(&self) -> RwLockReadGuard<'_, AnimationMixer> {
        self.0.read()
    }

    /// Write access.
    pub fn write(&self) -> RwLockWriteGuard<'_, AnimationMixer> {
        self.0.write()
    }
}

/// Visual transform state of a loaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    /// Model name
    pub name: String,
    /// Rotation about the vertical axis
    pub yaw: f32,
    /// Uniform scale
    pub scale: f32,
}

/// Shared handle to a loaded model, read by renderers and written by
/// controllers.
#[derive(Debug, Clone)]
pub struct ModelHandle(Arc<RwLock<ModelState>>);

impl ModelHandle {
    /// Creates a handle for freshly loaded model data.
    #[must_use]
    pub fn new(data: &ModelData) -> Self {
        Self(Arc::new(RwLock::new(ModelState {
            name: data.name.clone(),
            yaw: 0.0,
            scale: data.scale,
        })))
    }

    /// Current yaw.
    #[must_use]
    pub fn yaw(&self) -> f32 {
        self.0.read().yaw
    }

    /// Sets the yaw.
    pub fn set_yaw(&self, yaw: f32) {
        self.0.write().yaw = yaw;
    }

    /// Snapshot of the model state.
    #[must_use]
    pub fn state(&self) -> ModelState {
        self.0.read().clone()
    }

    /// Whether both handles point at the same model.
    #[must_use]
    pub fn same_model(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Animated-model capability of an entity. Loads its model asynchronously and
/// exposes a mixer once loaded.
#[derive(Debug)]
pub struct AnimatedModel {
    path: String,
    load: Option<AssetLoad<ModelData>>,
    model: Option<ModelHandle>,
    mixer: Option<MixerHandle>,
    failed: bool,
}

impl AnimatedModel {
    /// Creates a capability that will load `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            load: None,
            model: None,
            mixer: None,
            failed: false,
        }
    }

    /// Asset path of the model.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Requests the model from `source`. Does nothing once loading started.
    pub fn begin_load(&mut self, source: &dyn AssetSource) {
        if self.load.is_some() || self.model.is_some() {
            return;
        }
        self.load = Some(source.load_model(&self.path));
    }

    /// Attaches an externally driven load.
    pub fn attach_load(&mut self, load: AssetLoad<ModelData>) {
        self.load = Some(load);
    }

    /// Polls the in-flight load. Returns the model handle on the poll that
    /// completes it.
    pub fn poll_load(&mut self) -> Option<ModelHandle> {
        let poll = self.load.as_ref()?.poll();
        match poll {
            LoadPoll::Pending => None,
            LoadPoll::Ready(data) => {
                self.load = None;
                let model = ModelHandle::new(&data);
                self.model = Some(model.clone());
                self.mixer = Some(MixerHandle::new());
                info!("Model {} loaded", self.path);
                Some(model)
            },
            LoadPoll::Failed(err) => {
                self.load = None;
                self.failed = true;
                warn!("Model {} failed to load: {err}", self.path);
                None
            },
        }
    }

    /// The loaded model, if any.
    #[must_use]
    pub fn model(&self) -> Option<&ModelHandle> {
        self.model.as_ref()
    }

    /// The mixer, available once the model loaded.
    #[must_use]
    pub fn mixer(&self) -> Option<&MixerHandle> {
        self.mixer.as_ref()
    }

    /// Whether the model is available.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Whether the load failed.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Advances the mixer.
    pub fn update(&self, dt: f32) {
        if let Some(mixer) = &self.mixer {
            mixer.write().update(dt);
        }
    }
}
