//! Error types for Refuge.

use thiserror::Error;

use crate::ids::EntityId;

/// Top-level error type for Refuge operations.
#[derive(Debug, Error)]
pub enum RefugeError {
    /// Entity registry errors
    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),

    /// Asset loading errors
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Entity registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityError {
    /// Entity not found
    #[error("Entity not found: {0}")]
    NotFound(EntityId),

    /// Another entity already uses this name
    #[error("Entity name already registered: {0}")]
    DuplicateName(String),

    /// Entity has no health capability
    #[error("Entity {0} has no health")]
    NoHealth(EntityId),
}

/// Asset loading errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssetError {
    /// Nothing is registered under the requested path
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// The asset loaded but its contents are unusable
    #[error("Malformed asset {path}: {reason}")]
    Malformed {
        /// Asset path
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// The producer went away before delivering a result
    #[error("Asset load abandoned")]
    Abandoned,
}

/// Result type alias for Refuge operations.
pub type RefugeResult<T> = Result<T, RefugeError>;

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
