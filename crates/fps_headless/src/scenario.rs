//! Scenario loading and configuration.
//!
//! Scenarios define the combatants of a headless run (data records, spawn
//! poses, weapons) and a per-tick input script.

use std::collections::HashSet;
use std::path::Path;

use fps_core::components::Command;
use fps_core::data::{CharacterData, GunData};
use fps_core::error::GameError;
use fps_core::gun::ReloadNotify;
use fps_core::math::Vec3;
use fps_core::simulation::{DEFAULT_SEED, TICK_RATE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Failed to write RON.
    #[error("Failed to serialize scenario: {0}")]
    SerializeError(#[from] ron::Error),
    /// A data record inside the scenario was rejected.
    #[error("Invalid scenario data: {0}")]
    InvalidData(#[from] GameError),
    /// Two combatants share a name.
    #[error("Duplicate combatant name: {0}")]
    DuplicateName(String),
    /// The script addresses a combatant that does not exist.
    #[error("Script step at tick {tick} names unknown combatant '{name}'")]
    UnknownCombatant {
        /// Tick of the offending step.
        tick: u64,
        /// Name used.
        name: String,
    },
    /// The tick rate cannot drive the simulation.
    #[error("Tick rate must be positive")]
    InvalidTickRate,
}

/// A character placed in the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    /// Name the script refers to.
    pub name: String,
    /// Character record.
    pub character: CharacterData,
    /// Gun held at spawn, if any.
    #[serde(default)]
    pub weapon: Option<GunData>,
    /// Eye location at spawn.
    pub location: Vec3,
    /// View direction at spawn.
    pub facing: Vec3,
    /// Whether the observer controls this combatant and predicts its input.
    #[serde(default)]
    pub local: bool,
}

/// What a script step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Issue an input command.
    Input(Command),
    /// Deliver an animation notify to the combatant's weapon.
    Notify(ReloadNotify),
    /// Pick a new spread seed for the combatant's weapon.
    Reseed(u32),
}

/// One scripted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Tick (0-based) before which the step is applied.
    pub tick: u64,
    /// Combatant name.
    pub combatant: String,
    /// Action to perform.
    pub action: Action,
}

impl ScriptStep {
    fn new(tick: u64, combatant: &str, action: Action) -> Self {
        Self {
            tick,
            combatant: combatant.to_string(),
            action,
        }
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Ticks to run when the command line does not override it.
    pub ticks: u64,
    /// Ticks per simulated second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// Master seed for spread seeds.
    #[serde(default = "default_seed")]
    pub seed: u32,
    /// Characters, spawned in order.
    pub combatants: Vec<Combatant>,
    /// Input script, in any order.
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

const fn default_tick_rate() -> u32 {
    TICK_RATE
}

const fn default_seed() -> u32 {
    DEFAULT_SEED
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ScenarioError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Reject scenarios the runner cannot play.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.tick_rate == 0 {
            return Err(ScenarioError::InvalidTickRate);
        }

        let mut names = HashSet::new();
        for combatant in &self.combatants {
            if !names.insert(combatant.name.as_str()) {
                return Err(ScenarioError::DuplicateName(combatant.name.clone()));
            }
            combatant.character.validate()?;
            if let Some(weapon) = &combatant.weapon {
                weapon.validate()?;
            }
        }

        if let Some(step) = self
            .script
            .iter()
            .find(|step| !names.contains(step.combatant.as_str()))
        {
            return Err(ScenarioError::UnknownCombatant {
                tick: step.tick,
                name: step.combatant.clone(),
            });
        }
        Ok(())
    }

    /// Steps to apply before `tick`, in script order.
    pub fn steps_at(&self, tick: u64) -> impl Iterator<Item = &ScriptStep> {
        self.script.iter().filter(move |step| step.tick == tick)
    }

    /// Rifle against pistol, twenty metres apart, both aiming at chest
    /// height. `blue` aims and fires a burst at `red`, reloads with the full
    /// notify sequence, then fires again.
    #[must_use]
    pub fn duel() -> Self {
        let soldier = CharacterData::soldier();
        let blue = Combatant {
            name: "blue".to_string(),
            character: soldier.clone(),
            weapon: Some(GunData::rifle()),
            location: Vec3::new(0.0, 0.0, 165.0),
            facing: Vec3::new(2_000.0, 0.0, -40.0),
            local: true,
        };
        let red = Combatant {
            name: "red".to_string(),
            character: soldier,
            weapon: Some(GunData::pistol()),
            location: Vec3::new(2_000.0, 0.0, 165.0),
            facing: Vec3::new(-2_000.0, 0.0, -40.0),
            local: false,
        };

        let fire = |tick, who: &str| ScriptStep::new(tick, who, Action::Input(Command::FirePressed));
        let release =
            |tick, who: &str| ScriptStep::new(tick, who, Action::Input(Command::FireReleased));

        Self {
            name: "duel".to_string(),
            description: "Rifle against pistol, with a tactical reload".to_string(),
            ticks: 640,
            tick_rate: TICK_RATE,
            seed: DEFAULT_SEED,
            combatants: vec![blue, red],
            script: vec![
                ScriptStep::new(0, "blue", Action::Reseed(0xB1E)),
                ScriptStep::new(8, "blue", Action::Input(Command::AimPressed)),
                fire(32, "blue"),
                release(96, "blue"),
                ScriptStep::new(100, "blue", Action::Input(Command::Reload)),
                ScriptStep::new(120, "blue", Action::Notify(ReloadNotify::MagazineOut)),
                ScriptStep::new(130, "blue", Action::Notify(ReloadNotify::DropMagazine)),
                ScriptStep::new(150, "blue", Action::Notify(ReloadNotify::GrabMagazine)),
                ScriptStep::new(200, "blue", Action::Notify(ReloadNotify::MagazineIn)),
                ScriptStep::new(220, "blue", Action::Notify(ReloadNotify::EndReload)),
                fire(40, "red"),
                release(41, "red"),
                fire(80, "red"),
                release(81, "red"),
                fire(260, "blue"),
                release(400, "blue"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duel_scenario_is_valid() {
        let scenario = Scenario::duel();
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.combatants.len(), 2);
        assert_eq!(scenario.steps_at(32).count(), 1);
    }

    #[test]
    fn test_duel_survives_ron() {
        let scenario = Scenario::duel();
        let text = scenario.to_ron_string().unwrap();
        let parsed = Scenario::from_ron_str(&text).unwrap();
        assert_eq!(parsed.name, "duel");
        assert_eq!(parsed.script, scenario.script);
        assert_eq!(parsed.combatants[0].weapon, scenario.combatants[0].weapon);
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                ticks: 64,
                combatants: [
                    Combatant(
                        name: "a",
                        character: CharacterData(id: "dummy", max_health: 50.0),
                        location: (x: 0.0, y: 0.0, z: 0.0),
                        facing: (x: 1.0, y: 0.0, z: 0.0),
                    ),
                ],
                script: [
                    ScriptStep(tick: 3, combatant: "a", action: Input(SetSprint(true))),
                ],
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert_eq!(scenario.tick_rate, TICK_RATE);
        assert!(scenario.combatants[0].weapon.is_none());
        assert!(!scenario.combatants[0].local);
    }

    #[test]
    fn test_rejects_unknown_combatant() {
        let mut scenario = Scenario::duel();
        scenario
            .script
            .push(ScriptStep::new(5, "green", Action::Input(Command::Reload)));
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::UnknownCombatant { tick: 5, .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let mut scenario = Scenario::duel();
        scenario.combatants[1].name = "blue".to_string();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_weapon() {
        let mut scenario = Scenario::duel();
        if let Some(weapon) = scenario.combatants[0].weapon.as_mut() {
            weapon.capacity = 0;
        }
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::InvalidData(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duel.ron");
        std::fs::write(&path, Scenario::duel().to_ron_string().unwrap()).unwrap();

        let loaded = Scenario::load(&path).unwrap();
        assert_eq!(loaded.ticks, 640);
        assert_eq!(loaded.combatants[1].name, "red");
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ron");
        std::fs::write(&path, "Scenario(name: ").unwrap();

        assert!(matches!(
            Scenario::load(&path),
            Err(ScenarioError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("does/not/exist.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
