//! Fixed-step headless simulation of a scenario.

use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, info, warn};

use refuge_common::{pin_to_ground, EntityId, RefugeResult, GIRL_NAME, PLAYER_NAME};
use refuge_gameplay::{topics, AnimatedModel, Entity, Mode, NpcMarker, World};

use crate::config::SimConfig;
use crate::scenario::{DamageTarget, Scenario};

/// Monsters stop this close to the escort.
const CHASE_STOP_DISTANCE: f32 = 1.0;

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSummary {
    /// Frames actually simulated
    pub frames_run: u64,
    /// Final escort position
    pub girl_position: Vec3,
    /// Final escort mode
    pub girl_mode: Mode,
    /// Whether the escort survived
    pub girl_alive: bool,
    /// Whether the player survived
    pub player_alive: bool,
    /// Kills credited to the player
    pub player_kills: u32,
    /// Health display refreshes seen
    pub display_updates: u64,
    /// Death messages delivered
    pub deaths: usize,
}

#[derive(Debug)]
struct Monster {
    id: EntityId,
    speed: f32,
}

/// A world populated from a scenario, stepped at a fixed rate.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    scenario: Scenario,
    girl: EntityId,
    player: EntityId,
    monsters: Vec<Monster>,
    fixed_dt: f32,
    frames: u64,
}

impl Simulation {
    /// Builds the world described by `scenario`.
    pub fn new(config: &SimConfig, scenario: Scenario) -> RefugeResult<Self> {
        let assets = scenario.assets(&config.behavior.clip_asset);
        let mut world = World::new(Arc::new(assets));

        let girl = world.spawn(
            Entity::new()
                .with_name(GIRL_NAME)
                .at(Vec3::from_array(scenario.girl.position))
                .with_health(scenario.girl.health)
                .with_spatial_client()
                .with_animated_model(AnimatedModel::new(scenario.model_asset.clone())),
        )?;
        world.attach_controller(girl, config.behavior.clone())?;

        let player = world.spawn(
            Entity::new()
                .with_name(PLAYER_NAME)
                .at(Vec3::from_array(scenario.player.position))
                .with_health(scenario.player.health)
                .with_spatial_client()
                .with_kill_tracker()
                .subscribed_to(topics::PLAYER_DEATH_TRIGGER),
        )?;

        let mut monsters = Vec::with_capacity(scenario.monsters.len());
        for spawn in &scenario.monsters {
            let id = world.spawn(
                Entity::new()
                    .at(Vec3::from_array(spawn.position))
                    .with_health(spawn.health)
                    .with_npc_marker(NpcMarker::new(spawn.kind.clone()))
                    .with_spatial_client(),
            )?;
            monsters.push(Monster {
                id,
                speed: spawn.speed,
            });
        }

        info!(
            "Simulation ready: girl {girl}, player {player}, {} monsters",
            monsters.len()
        );
        Ok(Self {
            world,
            scenario,
            girl,
            player,
            monsters,
            fixed_dt: config.fixed_dt,
            frames: config.frames,
        })
    }

    /// The simulated world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Escort id.
    #[must_use]
    pub fn girl(&self) -> EntityId {
        self.girl
    }

    /// Player id.
    #[must_use]
    pub fn player(&self) -> EntityId {
        self.player
    }

    fn resolve(&self, target: DamageTarget) -> Option<EntityId> {
        match target {
            DamageTarget::Girl => Some(self.girl),
            DamageTarget::Player => Some(self.player),
            DamageTarget::Monster(index) => self.monsters.get(index).map(|m| m.id),
        }
    }

    fn is_alive(&self, id: EntityId) -> bool {
        self.world
            .entity(id)
            .ok()
            .and_then(Entity::health)
            .is_some_and(|h| h.is_alive())
    }

    fn apply_scripted_damage(&mut self, frame: u64) {
        let events: Vec<_> = self
            .scenario
            .damage_on(frame)
            .map(|d| (d.target, d.amount, d.attacker))
            .collect();
        for (target, amount, attacker) in events {
            let Some(victim) = self.resolve(target) else {
                continue;
            };
            let attacker = attacker.and_then(|a| self.resolve(a));
            match self.world.apply_damage(victim, amount, attacker) {
                Ok(outcome) => debug!(
                    frame,
                    "Scripted {amount} damage on {target:?}, dealt {}",
                    outcome.dealt
                ),
                Err(e) => warn!(frame, "Scripted damage on {target:?} failed: {e}"),
            }
        }
    }

    fn move_monsters(&mut self) {
        let Ok(girl) = self.world.entity(self.girl) else {
            return;
        };
        let target = girl.position();
        let dt = self.fixed_dt;

        for monster in &self.monsters {
            if !self.is_alive(monster.id) {
                continue;
            }
            let Ok(entity) = self.world.entity_mut(monster.id) else {
                continue;
            };
            let position = entity.position();
            let offset = Vec3::new(target.x - position.x, 0.0, target.z - position.z);
            let distance = offset.length();
            if distance <= CHASE_STOP_DISTANCE {
                continue;
            }
            let step = (monster.speed * dt).min(distance - CHASE_STOP_DISTANCE);
            entity.set_position(pin_to_ground(position + offset / distance * step));
        }
    }

    /// Runs one frame: scripted damage, monster movement, world tick.
    pub fn step(&mut self) {
        let frame = self.world.frame() + 1;
        self.apply_scripted_damage(frame);
        if self.is_alive(self.girl) {
            self.move_monsters();
        }
        self.world.tick(self.fixed_dt);
    }

    /// Runs the configured number of frames, stopping early once both the
    /// escort and the player are dead.
    pub fn run(mut self) -> SimSummary {
        info!("Running {} frames at dt={}", self.frames, self.fixed_dt);
        for _ in 0..self.frames {
            self.step();
            if !self.is_alive(self.girl) && !self.is_alive(self.player) {
                info!(frame = self.world.frame(), "Escort and player dead, stopping");
                break;
            }
        }
        let summary = self.summary();
        info!("Simulation finished: {summary:?}");
        summary
    }

    /// Snapshot of the current outcome.
    #[must_use]
    pub fn summary(&self) -> SimSummary {
        let girl_position = self
            .world
            .entity(self.girl)
            .map_or(Vec3::ZERO, Entity::position);
        let girl_mode = self
            .world
            .controller(self.girl)
            .map_or(Mode::Wandering, |c| c.mode());
        let player_kills = self
            .world
            .entity(self.player)
            .ok()
            .and_then(Entity::kill_tracker)
            .map_or(0, |k| k.kills());

        SimSummary {
            frames_run: self.world.frame(),
            girl_position,
            girl_mode,
            girl_alive: self.is_alive(self.girl),
            player_alive: self.is_alive(self.player),
            player_kills,
            display_updates: self.world.display().total_updates(),
            deaths: self.world.deaths().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{CharacterSpawn, MonsterSpawn, ScriptedDamage};

    fn config(frames: u64) -> SimConfig {
        let mut config = SimConfig {
            frames,
            fixed_dt: 0.1,
            ..SimConfig::default()
        };
        config.behavior.seed = Some(3);
        config
    }

    fn quiet_scenario() -> Scenario {
        Scenario {
            monsters: Vec::new(),
            damage: Vec::new(),
            ..Scenario::default()
        }
    }

    #[test]
    fn test_quiet_scenario_wanders() {
        let summary = Simulation::new(&config(50), quiet_scenario())
            .expect("simulation builds")
            .run();
        assert_eq!(summary.frames_run, 50);
        assert_eq!(summary.girl_mode, Mode::Wandering);
        assert!(summary.girl_alive);
        assert!(summary.player_alive);
        assert_eq!(summary.girl_position.y, 0.0);
        assert_eq!(summary.display_updates, 50);
    }

    #[test]
    fn test_monster_in_range_triggers_flee() {
        let mut scenario = quiet_scenario();
        scenario.monsters.push(MonsterSpawn {
            kind: "zombie".to_string(),
            position: [0.0, 0.0, 6.0],
            health: 40.0,
            speed: 0.0,
        });
        let mut sim = Simulation::new(&config(10), scenario).expect("simulation builds");
        sim.step();
        sim.step();

        let summary = sim.summary();
        assert_eq!(summary.girl_mode, Mode::Fleeing);
        assert!(summary.girl_position.z < 0.0);
    }

    #[test]
    fn test_monsters_chase_escort() {
        let mut scenario = quiet_scenario();
        scenario.monsters.push(MonsterSpawn {
            kind: "zombie".to_string(),
            position: [0.0, 0.0, 40.0],
            health: 40.0,
            speed: 2.0,
        });
        let mut sim = Simulation::new(&config(10), scenario).expect("simulation builds");
        let monster = sim.monsters[0].id;
        sim.step();

        let pos = sim.world().entity(monster).expect("monster exists").position();
        assert!(pos.z < 40.0);
        assert_eq!(pos.y, 0.0);
    }

    #[test]
    fn test_escort_death_ends_run() {
        let mut scenario = quiet_scenario();
        scenario.damage.push(ScriptedDamage {
            frame: 5,
            target: DamageTarget::Girl,
            amount: 1000.0,
            attacker: None,
        });
        let summary = Simulation::new(&config(100), scenario)
            .expect("simulation builds")
            .run();

        assert!(!summary.girl_alive);
        assert!(!summary.player_alive);
        assert!(summary.frames_run < 100);
        assert_eq!(summary.deaths, 2);
    }

    #[test]
    fn test_player_kill_credit() {
        let mut scenario = quiet_scenario();
        scenario.monsters.push(MonsterSpawn {
            kind: "zombie".to_string(),
            position: [100.0, 0.0, 100.0],
            health: 10.0,
            speed: 0.0,
        });
        scenario.damage.push(ScriptedDamage {
            frame: 2,
            target: DamageTarget::Monster(0),
            amount: 10.0,
            attacker: Some(DamageTarget::Player),
        });
        let summary = Simulation::new(&config(5), scenario)
            .expect("simulation builds")
            .run();
        assert_eq!(summary.player_kills, 1);
        assert!(summary.girl_alive);
    }

    #[test]
    fn test_duplicate_girl_name_fails() {
        let mut sim = Simulation::new(&config(1), quiet_scenario()).expect("simulation builds");
        let again = sim.world.spawn(Entity::new().with_name(GIRL_NAME));
        assert!(again.is_err());

        let scenario = Scenario {
            girl: CharacterSpawn {
                position: [1.0, 2.0, 3.0],
                health: 5.0,
            },
            ..quiet_scenario()
        };
        let sim = Simulation::new(&config(1), scenario).expect("simulation builds");
        assert_eq!(
            sim.world().id_by_name(GIRL_NAME),
            Some(sim.girl())
        );
        assert_eq!(sim.world().id_by_name(PLAYER_NAME), Some(sim.player()));
    }
}
