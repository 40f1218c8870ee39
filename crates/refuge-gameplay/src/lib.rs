//! # Refuge Gameplay
//!
//! Entity layer and NPC behavior for Refuge.
//!
//! This crate provides:
//! - Entities with typed optional capabilities, stored in an arena
//! - Message bus addressed by entity or topic
//! - Health, kill tracking and a health display sink
//! - Spatial grid for radius queries
//! - Animation mixer and asynchronous asset loads
//! - Flee/wander behavior controller and its death cascade
//! - The world that runs all of the above each frame

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod animation;
pub mod assets;
pub mod behavior;
pub mod cascade;
pub mod display;
pub mod entity;
pub mod events;
pub mod health;
pub mod spatial;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::animation::*;
    pub use crate::assets::*;
    pub use crate::behavior::*;
    pub use crate::cascade::*;
    pub use crate::display::*;
    pub use crate::entity::*;
    pub use crate::events::*;
    pub use crate::health::*;
    pub use crate::spatial::*;
    pub use crate::world::*;
}

pub use prelude::*;
