//! Scenario definitions loaded from RON.
//!
//! A scenario places the escort, the player and a set of monsters, and
//! scripts damage on given frames.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use refuge_gameplay::{AnimationClip, MemoryAssets, ModelData};

/// Errors that can occur during scenario loading.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse RON.
    #[error("Failed to parse scenario RON: {0}")]
    ParseError(#[from] ron::error::SpannedError),

    /// Validation error.
    #[error("Scenario validation error: {0}")]
    ValidationError(String),
}

/// Result type for scenario loading operations.
pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// Placement of a named character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSpawn {
    /// World position
    pub position: [f32; 3],
    /// Maximum health
    pub health: f32,
}

/// Placement of a hostile NPC that walks toward the escort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterSpawn {
    /// Kind, for logs
    pub kind: String,
    /// World position
    pub position: [f32; 3],
    /// Maximum health
    pub health: f32,
    /// Chase speed in units per second
    #[serde(default = "default_monster_speed")]
    pub speed: f32,
}

fn default_monster_speed() -> f32 {
    0.8
}

/// Entity a scripted event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageTarget {
    /// The escorted character
    Girl,
    /// The player
    Player,
    /// Monster by index in [`Scenario::monsters`]
    Monster(usize),
}

/// Damage applied at the start of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedDamage {
    /// Frame number (1-based)
    pub frame: u64,
    /// Victim
    pub target: DamageTarget,
    /// Damage amount
    pub amount: f32,
    /// Who gets credit for a kill
    #[serde(default)]
    pub attacker: Option<DamageTarget>,
}

/// A full scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Asset path of the escort's model
    pub model_asset: String,
    /// Clips available under the behavior's clip asset
    pub clips: Vec<AnimationClip>,
    /// Escort placement
    pub girl: CharacterSpawn,
    /// Player placement
    pub player: CharacterSpawn,
    /// Monsters
    pub monsters: Vec<MonsterSpawn>,
    /// Scripted damage events
    pub damage: Vec<ScriptedDamage>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            model_asset: "girl/girl.fbx".to_string(),
            clips: vec![
                AnimationClip::new("Idle", 2.4),
                AnimationClip::new("Run_Look_Back", 0.9),
            ],
            girl: CharacterSpawn {
                position: [0.0, 0.0, 0.0],
                health: 100.0,
            },
            player: CharacterSpawn {
                position: [4.0, 0.0, 0.0],
                health: 100.0,
            },
            monsters: vec![
                MonsterSpawn {
                    kind: "zombie".to_string(),
                    position: [0.0, 0.0, 24.0],
                    health: 40.0,
                    speed: 1.2,
                },
                MonsterSpawn {
                    kind: "zombie".to_string(),
                    position: [-20.0, 0.0, 10.0],
                    health: 40.0,
                    speed: 0.8,
                },
            ],
            damage: vec![
                ScriptedDamage {
                    frame: 240,
                    target: DamageTarget::Girl,
                    amount: 60.0,
                    attacker: Some(DamageTarget::Monster(0)),
                },
                ScriptedDamage {
                    frame: 360,
                    target: DamageTarget::Monster(0),
                    amount: 40.0,
                    attacker: Some(DamageTarget::Player),
                },
            ],
        }
    }
}

impl Scenario {
    /// Parses and validates a scenario from RON text.
    pub fn from_ron(text: &str) -> ScenarioResult<Self> {
        let scenario: Self = ron::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Loads a scenario file.
    pub fn load<P: AsRef<Path>>(path: P) -> ScenarioResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let scenario = Self::from_ron(&text)?;
        info!(
            "Loaded scenario {} with {} monsters",
            path.display(),
            scenario.monsters.len()
        );
        Ok(scenario)
    }

    /// Checks health values and event references.
    pub fn validate(&self) -> ScenarioResult<()> {
        let positive = |what: &str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ScenarioError::ValidationError(format!(
                    "{what} must be positive, got {value}"
                )))
            }
        };
        positive("girl health", self.girl.health)?;
        positive("player health", self.player.health)?;
        for (i, monster) in self.monsters.iter().enumerate() {
            positive(format!("monster {i} health").as_str(), monster.health)?;
            if !(monster.speed.is_finite() && monster.speed >= 0.0) {
                return Err(ScenarioError::ValidationError(format!(
                    "monster {i} speed must not be negative, got {}",
                    monster.speed
                )));
            }
        }

        for event in &self.damage {
            for target in std::iter::once(event.target).chain(event.attacker) {
                if let DamageTarget::Monster(index) = target {
                    if index >= self.monsters.len() {
                        return Err(ScenarioError::ValidationError(format!(
                            "damage on frame {} names monster {index}, only {} defined",
                            event.frame,
                            self.monsters.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Asset source serving this scenario's model and clips.
    #[must_use]
    pub fn assets(&self, clip_asset: &str) -> MemoryAssets {
        debug!("Registering {} clips under {clip_asset}", self.clips.len());
        MemoryAssets::new()
            .with_model(self.model_asset.clone(), ModelData::new("girl"))
            .with_clips(clip_asset, self.clips.clone())
    }

    /// Damage events scheduled for `frame`.
    pub fn damage_on(&self, frame: u64) -> impl Iterator<Item = &ScriptedDamage> {
        self.damage.iter().filter(move |d| d.frame == frame)
    }
}
