//! Authority/observer match runner.
//!
//! Every scenario runs on two participants: the authority, which owns all
//! entities, and an observer that predicts its local combatant and mirrors
//! the rest. Each tick the observer predicts first, then the authority
//! ticks and its replication frame is encoded, decoded and applied to the
//! observer, exactly as a transport would.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use fps_core::components::{EntityId, NetRole, Pose, PropId, WeaponState};
use fps_core::events::{GameEvent, TickEvents};
use fps_core::gun::{ReloadNotify, Weapon};
use fps_core::math::Fixed;
use fps_core::replication::ReplicationFrame;
use fps_core::simulation::Simulation;
use serde::{Deserialize, Serialize};

use crate::arena::ArenaWorld;
use crate::scenario::{Action, Scenario, ScenarioError, ScriptStep};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Override the scenario's tick count.
    pub ticks: Option<u64>,
    /// Override the tick length in seconds.
    pub dt: Option<Fixed>,
}

/// Final state of one combatant on both participants.
impl RunConfig {
    /// Configuration from command-line values, with `dt` in seconds.
    ///
    /// A tick length that is not finite or does not fit the clock is
    /// rejected as an invalid tick rate.
    pub fn from_seconds(ticks: Option<u64>, dt: Option<f64>) -> Result<Self, ScenarioError> {
        let dt = dt
            .map(|seconds| {
                Some(seconds)
                    .filter(|s| s.is_finite())
                    .and_then(Fixed::checked_from_num)
                    .ok_or(ScenarioError::InvalidTickRate)
            })
            .transpose()?;
        Ok(Self { ticks, dt })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterReport {
    /// Combatant name.
    pub name: String,
    /// Health on the authority.
    pub health: f64,
    /// Health on the observer.
    pub observer_health: f64,
    /// Liveness on the authority.
    pub alive: bool,
    /// Liveness on the observer.
    pub observer_alive: bool,
}

/// Final state of one gun still in play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponReport {
    /// Name of the combatant holding it, if any.
    pub holder: Option<String>,
    /// Gun data id.
    pub gun: String,
    /// Rounds left on the authority.
    pub clip: u32,
    /// Rounds left on the observer.
    pub observer_clip: Option<u32>,
    /// Fire-mode state on the authority.
    pub state: WeaponState,
}

/// Result of a headless run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Simulated seconds.
    pub seconds: f64,
    /// Rounds fired on the authority.
    pub shots_fired: usize,
    /// Rounds predicted by the observer.
    pub observer_shots: usize,
    /// Shots that applied damage.
    pub hits: usize,
    /// Total damage applied.
    pub damage_dealt: f64,
    /// Names of combatants killed, in order.
    pub kills: Vec<String>,
    /// Reloads that refilled a clip.
    pub reloads_completed: usize,
    /// Reloads interrupted.
    pub reloads_canceled: usize,
    /// Non-empty replication frames sent.
    pub frames_sent: usize,
    /// Encoded bytes sent.
    pub bytes_sent: usize,
    /// Magazine props spawned but neither destroyed nor still held.
    pub leaked_props: usize,
    /// Per-combatant final state.
    pub characters: Vec<CharacterReport>,
    /// Per-gun final state.
    pub weapons: Vec<WeaponReport>,
    /// Whether the observer's replicated state matches the authority's.
    pub converged: bool,
    /// Authority state hash at the end of the run.
    pub state_hash: u64,
}

/// One participant's simulation, arena and name table.
struct Participant {
    sim: Simulation,
    world: ArenaWorld,
    names: HashMap<String, EntityId>,
}

impl Participant {
    /// Spawn every combatant in scenario order so ids agree across
    /// participants.
    fn spawn(scenario: &Scenario, observer: bool) -> Result<Self, ScenarioError> {
        let mut sim = Simulation::with_seed(scenario.seed);
        let mut names = HashMap::new();

        for combatant in &scenario.combatants {
            let role = match (observer, combatant.local) {
                (false, _) => NetRole::Authority,
                (true, true) => NetRole::AutonomousProxy,
                (true, false) => NetRole::SimulatedProxy,
            };
            let id = sim.spawn_character(
                Arc::new(combatant.character.clone()),
                role,
                combatant.local,
            );
            sim.set_pose(id, Pose::looking(combatant.location, combatant.facing))?;
            if let Some(data) = &combatant.weapon {
                let gun = sim.spawn_gun(Arc::new(data.clone()), role);
                sim.equip(id, gun)?;
            }
            names.insert(combatant.name.clone(), id);
        }

        let mut world = ArenaWorld::new();
        world.sync(&sim);
        Ok(Self { sim, world, names })
    }

    fn id(&self, name: &str) -> Result<EntityId, ScenarioError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ScenarioError::UnknownCombatant {
                tick: self.sim.get_tick(),
                name: name.to_string(),
            })
    }

    fn held_weapon(&self, character: EntityId) -> Option<EntityId> {
        self.sim.character(character).and_then(|c| c.weapon())
    }

    fn notify(&mut self, character: EntityId, notify: ReloadNotify) -> Result<(), ScenarioError> {
        if let Some(gun) = self.held_weapon(character) {
            self.world.sync(&self.sim);
            self.sim.reload_notify(gun, notify, &self.world)?;
        }
        Ok(())
    }

    fn tick(&mut self, dt: Fixed) -> TickEvents {
        self.world.sync(&self.sim);
        self.sim.tick(dt, &self.world)
    }

    fn name_of(&self, id: EntityId) -> Option<String> {
        self.names
            .iter()
            .find(|(_, entity)| **entity == id)
            .map(|(name, _)| name.clone())
    }
}

#[derive(Debug, Default)]
struct Tally {
    shots_fired: usize,
    observer_shots: usize,
    hits: usize,
    damage_dealt: Fixed,
    kills: Vec<EntityId>,
    reloads_completed: usize,
    reloads_canceled: usize,
    frames_sent: usize,
    bytes_sent: usize,
    spawned_props: BTreeSet<PropId>,
    destroyed_props: BTreeSet<PropId>,
}

impl Tally {
    fn record(&mut self, events: &TickEvents) {
        self.shots_fired += events.shots_fired();
        self.kills.extend(events.deaths());
        self.spawned_props.extend(events.spawned_props());
        self.destroyed_props.extend(events.destroyed_props());
        for event in events.iter() {
            match event {
                GameEvent::Damaged { amount, .. } => {
                    self.hits += 1;
                    self.damage_dealt = self.damage_dealt.saturating_add(*amount);
                }
                GameEvent::ReloadCompleted { .. } => self.reloads_completed += 1,
                GameEvent::ReloadCanceled { .. } => self.reloads_canceled += 1,
                _ => {}
            }
        }
    }
}

/// Drives an authority and an observer through a scenario.
pub struct MatchRunner {
    scenario: Scenario,
    ticks: u64,
    dt: Fixed,
    authority: Participant,
    observer: Participant,
    tally: Tally,
}

impl MatchRunner {
    /// Spawn both participants.
    pub fn new(scenario: Scenario, config: &RunConfig) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let dt = match config.dt {
            Some(dt) if dt <= Fixed::ZERO => return Err(ScenarioError::InvalidTickRate),
            Some(dt) => dt,
            None => Fixed::ONE / Fixed::from_num(scenario.tick_rate),
        };
        let ticks = config.ticks.unwrap_or(scenario.ticks);

        let authority = Participant::spawn(&scenario, false)?;
        let observer = Participant::spawn(&scenario, true)?;
        tracing::info!(
            scenario = %scenario.name,
            ticks,
            dt = %dt,
            combatants = scenario.combatants.len(),
            "Match ready"
        );

        Ok(Self {
            scenario,
            ticks,
            dt,
            authority,
            observer,
            tally: Tally::default(),
        })
    }

    /// The authority's simulation.
    pub fn authority(&self) -> &Simulation {
        &self.authority.sim
    }

    /// The observer's simulation.
    pub fn observer(&self) -> &Simulation {
        &self.observer.sim
    }

    /// Ticks simulated so far.
    pub fn tick_count(&self) -> u64 {
        self.authority.sim.get_tick()
    }

    /// Whether the configured tick count has been reached.
    pub fn is_finished(&self) -> bool {
        self.tick_count() >= self.ticks
    }

    /// Advance both participants by one tick.
    ///
    /// Returns the authority's events.
    pub fn step(&mut self) -> Result<TickEvents, ScenarioError> {
        let tick = self.tick_count();
        let steps: Vec<ScriptStep> = self.scenario.steps_at(tick).cloned().collect();
        for step in &steps {
            self.apply(step)?;
        }

        let predicted = self.observer.tick(self.dt);
        self.tally.observer_shots += predicted.shots_fired();

        let events = self.authority.tick(self.dt);
        self.tally.record(&events);

        self.relay()?;
        Ok(events)
    }

    fn apply(&mut self, step: &ScriptStep) -> Result<(), ScenarioError> {
        let local = self
            .scenario
            .combatants
            .iter()
            .any(|c| c.name == step.combatant && c.local);
        let character = self.authority.id(&step.combatant)?;
        tracing::debug!(tick = self.tick_count(), combatant = %step.combatant, action = ?step.action, "Script step");

        match step.action {
            Action::Input(command) => {
                self.authority.sim.queue_command(character, command)?;
                if local {
                    let predicted = self.observer.id(&step.combatant)?;
                    self.observer.sim.queue_command(predicted, command)?;
                }
            }
            Action::Notify(notify) => {
                self.authority.notify(character, notify)?;
                let mirrored = self.observer.id(&step.combatant)?;
                self.observer.notify(mirrored, notify)?;
            }
            Action::Reseed(seed) => {
                if let Some(gun) = self.authority.held_weapon(character) {
                    self.authority.sim.reseed_spread(gun, seed)?;
                }
            }
        }
        Ok(())
    }

    /// Push the authority's pending changes through the wire format.
    fn relay(&mut self) -> Result<(), ScenarioError> {
        let frame = self.authority.sim.collect_replication();
        if frame.is_empty() {
            return Ok(());
        }
        let bytes = frame.encode()?;
        self.tally.frames_sent += 1;
        self.tally.bytes_sent += bytes.len();

        let received = ReplicationFrame::decode(&bytes)?;
        self.observer.sim.apply_replication(&received);
        Ok(())
    }

    /// Run the remaining ticks and report.
    pub fn run(mut self) -> Result<RunReport, ScenarioError> {
        while !self.is_finished() {
            self.step()?;
        }
        self.finish()
    }

    /// Build the report.
    pub fn finish(self) -> Result<RunReport, ScenarioError> {
        let authority = &self.authority;
        let observer = &self.observer;

        let characters: Vec<CharacterReport> = self
            .scenario
            .combatants
            .iter()
            .filter_map(|c| {
                let id = *authority.names.get(&c.name)?;
                Some(CharacterReport {
                    name: c.name.clone(),
                    health: authority.sim.health(id)?.to_num(),
                    observer_health: observer.sim.health(id)?.to_num(),
                    alive: authority.sim.is_alive(id),
                    observer_alive: observer.sim.is_alive(id),
                })
            })
            .collect();

        let weapons: Vec<WeaponReport> = authority
            .sim
            .weapons()
            .sorted_ids()
            .into_iter()
            .filter_map(|id| {
                let gun = authority.sim.gun(id)?;
                Some(WeaponReport {
                    holder: gun.wielder().and_then(|w| authority.name_of(w)),
                    gun: gun.data().id.clone(),
                    clip: gun.clip(),
                    observer_clip: observer.sim.clip_count(id),
                    state: gun.state(),
                })
            })
            .collect();

        let converged = characters
            .iter()
            .all(|c| c.health == c.observer_health && c.alive == c.observer_alive)
            && weapons.iter().all(|w| w.observer_clip == Some(w.clip))
            && authority.sim.weapons().sorted_ids() == observer.sim.weapons().sorted_ids();

        let held: BTreeSet<PropId> = authority
            .sim
            .weapons()
            .sorted_ids()
            .into_iter()
            .filter_map(|id| authority.sim.gun(id).and_then(|g| g.magazine()))
            .collect();
        let leaked_props = self
            .tally
            .spawned_props
            .iter()
            .filter(|p| !self.tally.destroyed_props.contains(p) && !held.contains(p))
            .count();

        let ticks = authority.sim.get_tick();
        let report = RunReport {
            scenario: self.scenario.name.clone(),
            ticks,
            seconds: authority.sim.now().to_num(),
            shots_fired: self.tally.shots_fired,
            observer_shots: self.tally.observer_shots,
            hits: self.tally.hits,
            damage_dealt: self.tally.damage_dealt.to_num(),
            kills: self
                .tally
                .kills
                .iter()
                .filter_map(|id| authority.name_of(*id))
                .collect(),
            reloads_completed: self.tally.reloads_completed,
            reloads_canceled: self.tally.reloads_canceled,
            frames_sent: self.tally.frames_sent,
            bytes_sent: self.tally.bytes_sent,
            leaked_props,
            characters,
            weapons,
            converged,
            state_hash: authority.sim.state_hash(),
        };

        if report.converged {
            tracing::info!(ticks, hash = report.state_hash, "Match finished");
        } else {
            tracing::warn!(ticks, "Observer diverged from authority");
        }
        Ok(report)
    }
}

/// Run a scenario with the given configuration.
pub fn run_scenario(scenario: Scenario, config: &RunConfig) -> Result<RunReport, ScenarioError> {
    MatchRunner::new(scenario, config)?.run()
}

/// Run the same scenario `runs` times and compare final state hashes.
pub fn verify_determinism(
    scenario: &Scenario,
    config: &RunConfig,
    runs: u32,
) -> Result<bool, ScenarioError> {
    let mut hashes = Vec::with_capacity(runs as usize);
    for run in 0..runs {
        let report = run_scenario(scenario.clone(), config)?;
        tracing::debug!(run, hash = report.state_hash, "Verification run complete");
        hashes.push(report.state_hash);
    }
    Ok(hashes.windows(2).all(|w| w[0] == w[1]))
}
