//! Asynchronous asset loads.
//!
//! A load is the receiving half of a one-shot channel. The producer completes
//! it on some later frame; the owner polls it from the tick thread. Dropping
//! the [`AssetLoad`] closes the channel, so a producer finishing after its
//! owner was torn down writes into nothing instead of a stale reference.

use ahash::AHashMap;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use refuge_common::{AssetError, AssetResult};

use crate::animation::AnimationClip;

/// Loaded skinned-mesh description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    /// Model name
    pub name: String,
    /// Uniform scale applied at load
    pub scale: f32,
}

impl ModelData {
    /// Creates model data with unit scale.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scale: 1.0,
        }
    }
}

/// Result of polling an in-flight load.
#[derive(Debug)]
pub enum LoadPoll<T> {
    /// Not finished yet
    Pending,
    /// Finished successfully
    Ready(T),
    /// Finished with an error
    Failed(AssetError),
}

/// Receiving end of an asynchronous asset load.
#[derive(Debug)]
pub struct AssetLoad<T> {
    path: String,
    receiver: Receiver<AssetResult<T>>,
}

impl<T> AssetLoad<T> {
    /// Path that was requested.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checks for completion without blocking.
    pub fn poll(&self) -> LoadPoll<T> {
        match self.receiver.try_recv() {
            Ok(Ok(value)) => LoadPoll::Ready(value),
            Ok(Err(err)) => LoadPoll::Failed(err),
            Err(TryRecvError::Empty) => LoadPoll::Pending,
            Err(TryRecvError::Disconnected) => LoadPoll::Failed(AssetError::Abandoned),
        }
    }
}

/// Producing end of an asynchronous asset load.
#[derive(Debug)]
pub struct AssetSender<T> {
    sender: Sender<AssetResult<T>>,
}

impl<T> AssetSender<T> {
    /// Delivers the result. Returns false when the requester is gone.
    pub fn complete(self, result: AssetResult<T>) -> bool {
        self.sender.send(result).is_ok()
    }
}

/// Creates a linked sender/load pair for `path`.
#[must_use]
pub fn asset_channel<T>(path: impl Into<String>) -> (AssetSender<T>, AssetLoad<T>) {
    let (sender, receiver) = bounded(1);
    (
        AssetSender { sender },
        AssetLoad {
            path: path.into(),
            receiver,
        },
    )
}

/// Source of models and animation clips.
pub trait AssetSource: Send + Sync {
    /// Starts loading a model.
    fn load_model(&self, path: &str) -> AssetLoad<ModelData>;
    /// Starts loading the animation clips stored in an asset.
    fn load_clips(&self, path: &str) -> AssetLoad<Vec<AnimationClip>>;
}

/// In-memory asset source. Registered paths resolve on the next poll,
/// anything else fails with [`AssetError::NotFound`].
#[derive(Debug, Default, Clone)]
pub struct MemoryAssets {
    models: AHashMap<String, ModelData>,
    clips: AHashMap<String, Vec<AnimationClip>>,
}

impl MemoryAssets {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model.
    #[must_use]
    pub fn with_model(mut self, path: impl Into<String>, model: ModelData) -> Self {
        self.models.insert(path.into(), model);
        self
    }

    /// Registers a clip set.
    #[must_use]
    pub fn with_clips(mut self, path: impl Into<String>, clips: Vec<AnimationClip>) -> Self {
        self.clips.insert(path.into(), clips);
        self
    }

    fn resolve<T: Clone>(table: &AHashMap<String, T>, path: &str) -> AssetLoad<T> {
        let (sender, load) = asset_channel(path);
        let result = table
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_string()));
        debug!("Resolving asset {path}: found={}", result.is_ok());
        sender.complete(result);
        load
    }
}

impl AssetSource for MemoryAssets {
    fn load_model(&self, path: &str) -> AssetLoad<ModelData> {
        Self::resolve(&self.models, path)
    }

    fn load_clips(&self, path: &str) -> AssetLoad<Vec<AnimationClip>> {
        Self::resolve(&self.clips, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_pending_then_ready() {
        let (sender, load) = asset_channel::<u32>("a");
        assert!(matches!(load.poll(), LoadPoll::Pending));
        assert!(sender.complete(Ok(7)));
        assert!(matches!(load.poll(), LoadPoll::Ready(7)));
        assert_eq!(load.path(), "a");
    }

    #[test]
    fn test_dropped_sender_is_abandoned() {
        let (sender, load) = asset_channel::<u32>("a");
        drop(sender);
        assert!(matches!(load.poll(), LoadPoll::Failed(AssetError::Abandoned)));
    }

    #[test]
    fn test_completing_into_dropped_load() {
        let (sender, load) = asset_channel::<u32>("a");
        drop(load);
        assert!(!sender.complete(Ok(1)));
    }

    #[test]
    fn test_memory_assets() {
        let assets = MemoryAssets::new()
            .with_model("girl.fbx", ModelData::new("girl"))
            .with_clips("anim.fbx", vec![AnimationClip::new("idle", 1.0)]);

        match assets.load_model("girl.fbx").poll() {
            LoadPoll::Ready(model) => assert_eq!(model.name, "girl"),
            other => panic!("unexpected poll result: {other:?}"),
        }
        match assets.load_clips("anim.fbx").poll() {
            LoadPoll::Ready(clips) => assert_eq!(clips.len(), 1),
            other => panic!("unexpected poll result: {other:?}"),
        }
        assert!(matches!(
            assets.load_clips("missing.fbx").poll(),
            LoadPoll::Failed(AssetError::NotFound(_))
        ));
    }
}
