//! Determinism and convergence testing utilities.
//!
//! Provides harnesses for verifying that the simulation produces identical
//! results given identical inputs, and that observers converge on the
//! authority's replicated state.
//!
//! # Testing Strategy
//!
//! Every participant runs its own simulation, so the replicated fields
//! must converge and the cosmetic streams (spread seeds) must agree.
//! Sources of divergence include:
//!
//! - **Floating-point math**: gameplay quantities use
//!   [`fps_core::math::Fixed`]; only world geometry is `f32`.
//!
//! - **HashMap iteration order**: entities are visited in sorted id order.
//!
//! - **Randomness**: spread comes from seeded streams only.
//!
//! - **Dropped frames**: replication is push-based, so a frame lost in
//!   transit is only repaired by the next change of the same field.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use fps_core::components::EntityId;
use fps_core::error::Result;
use fps_core::math::Fixed;
use fps_core::replication::ReplicationFrame;
use fps_core::simulation::{tick_duration, Simulation};
use fps_core::world::{EmptyWorld, World};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use fps_core::simulation::tick_duration;
/// use fps_core::world::EmptyWorld;
/// use fps_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     100, // 100 ticks each
///     || setup_duel(),
///     |sim| { sim.tick(tick_duration(), &EmptyWorld); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for `Simulation` type.
///
/// Runs the simulation twice at the default tick rate against an empty
/// world and verifies the final state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick(tick_duration(), &EmptyWorld);
        },
        |sim| sim.state_hash(),
    );
    result.is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations_scoped<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> Vec<u64>
where
    F: Fn() -> Simulation + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick(tick_duration(), &EmptyWorld);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        tracing::debug!("Simulations diverge before the first tick");
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick(tick_duration(), &EmptyWorld);
        sim2.tick(tick_duration(), &EmptyWorld);

        let (hash1, hash2) = (sim1.state_hash(), sim2.state_hash());
        if hash1 != hash2 {
            tracing::debug!(tick, hash1, hash2, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Ship the authority's pending changes to an observer through the wire
/// format.
///
/// Returns the decoded frame that was applied.
pub fn relay(authority: &mut Simulation, observer: &mut Simulation) -> Result<ReplicationFrame> {
    let bytes = authority.collect_replication().encode()?;
    let frame = ReplicationFrame::decode(&bytes)?;
    tracing::trace!(
        tick = frame.tick,
        updates = frame.updates.len(),
        bytes = bytes.len(),
        "Relaying frame"
    );
    observer.apply_replication(&frame);
    Ok(frame)
}

/// Replicated state of one character or gun, for convergence checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicatedSnapshot {
    /// Character `health` bits and `alive`.
    Character {
        /// Entity id.
        id: EntityId,
        /// Health as raw fixed-point bits.
        health_bits: i64,
        /// Liveness.
        alive: bool,
    },
    /// Gun `clip` and `spread_seed`.
    Gun {
        /// Entity id.
        id: EntityId,
        /// Rounds left.
        clip: u32,
        /// Spread seed.
        spread_seed: u32,
    },
}

/// Replicated state of every entity, in id order.
#[must_use]
pub fn replicated_snapshot(sim: &Simulation) -> Vec<ReplicatedSnapshot> {
    use fps_core::gun::Weapon;

    let characters = sim.characters().sorted_ids().into_iter().filter_map(|id| {
        sim.character(id).map(|c| ReplicatedSnapshot::Character {
            id,
            health_bits: c.health().to_bits(),
            alive: c.is_alive(),
        })
    });
    let guns = sim.weapons().sorted_ids().into_iter().filter_map(|id| {
        sim.gun(id).map(|g| ReplicatedSnapshot::Gun {
            id,
            clip: g.clip(),
            spread_seed: g.spread_seed(),
        })
    });
    characters.chain(guns).collect()
}

/// Drive an authority and an observer side by side.
///
/// Each tick, `step` may feed input into both simulations, then the
/// observer ticks (predicting), the authority ticks and its frame is
/// relayed. The observer therefore ends every tick holding the
/// authority's latest values.
///
/// # Panics
///
/// Panics if a frame fails to encode or decode.
pub fn run_linked<Step>(
    authority: &mut Simulation,
    observer: &mut Simulation,
    ticks: u64,
    dt: Fixed,
    world: &dyn World,
    mut step: Step,
) where
    Step: FnMut(u64, &mut Simulation, &mut Simulation),
{
    for tick in 0..ticks {
        step(tick, authority, observer);
        observer.tick(dt, world);
        authority.tick(dt, world);
        relay(authority, observer).expect("frames survive the wire format");
    }
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for combat testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use fps_core::components::Command;
    use fps_core::math::Fixed;
    use proptest::prelude::*;

    /// Tick lengths that are exact in fixed point: 1/256 s to 1/8 s.
    pub fn arb_dt() -> impl Strategy<Value = Fixed> {
        (3u32..=8).prop_map(|shift| Fixed::ONE >> shift)
    }

    /// Cadence in rounds per minute.
    ///
    /// Range: 60 to 1200
    pub fn arb_rounds_per_minute() -> impl Strategy<Value = Fixed> {
        (60i32..=1200).prop_map(Fixed::from_num)
    }

    /// Whole-number damage (1-100).
    pub fn arb_damage() -> impl Strategy<Value = Fixed> {
        (1i32..=100).prop_map(Fixed::from_num)
    }

    /// Bone multiplier in quarter steps, 0 to 8.
    pub fn arb_multiplier() -> impl Strategy<Value = Fixed> {
        (0i32..=32).prop_map(|quarters| Fixed::from_num(quarters) / 4)
    }

    /// Spread seed.
    pub fn arb_seed() -> impl Strategy<Value = u32> {
        any::<u32>()
    }

    /// Hipfire cone half-angle in radians, 0 to 0.5.
    pub fn arb_half_angle() -> impl Strategy<Value = f32> {
        0.0f32..0.5
    }

    /// Any input command that needs no entity reference.
    pub fn arb_command() -> impl Strategy<Value = Command> {
        prop_oneof![
            3 => Just(Command::FirePressed),
            3 => Just(Command::FireReleased),
            1 => Just(Command::AimPressed),
            1 => Just(Command::AimReleased),
            2 => Just(Command::Reload),
            1 => any::<bool>().prop_map(Command::SetSprint),
        ]
    }

    /// Per-tick input script: at most one command per tick.
    pub fn arb_command_script(max_ticks: usize) -> impl Strategy<Value = Vec<Option<Command>>> {
        proptest::collection::vec(proptest::option::weighted(0.2, arb_command()), 1..max_ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{test_rifle, Duel};
    use fps_core::components::{Command, NetRole};
    use proptest::prelude::*;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_empty_simulation_determinism() {
        assert!(verify_simulation_determinism(Simulation::new, 100));
    }

    #[test]
    fn test_firing_duel_determinism() {
        let setup = || {
            let mut duel = Duel::new(test_rifle());
            duel.sim
                .queue_command(duel.shooter, Command::FirePressed)
                .unwrap();
            duel.sim
        };
        assert!(verify_simulation_determinism(setup, 200));
        assert_eq!(find_first_divergence(setup, 200), None);

        let hashes = run_parallel_simulations_scoped(setup, 4, 100);
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_relay_converges_observer() {
        let mut authority = Duel::new(test_rifle());
        let mut observer = Duel::with_role(test_rifle(), NetRole::SimulatedProxy);
        let world = crate::fixtures::ScriptedWorld::new()
            .with_default_hit(authority.hit_on("spine"));
        let shooter = authority.shooter;

        run_linked(
            &mut authority.sim,
            &mut observer.sim,
            64,
            tick_duration(),
            &world,
            |tick, authority, _| {
                if tick == 0 {
                    authority.queue_command(shooter, Command::FirePressed).unwrap();
                }
            },
        );

        assert_eq!(
            replicated_snapshot(&authority.sim),
            replicated_snapshot(&observer.sim)
        );
        assert!(!observer.sim.is_alive(observer.target));
    }

    proptest! {
        #[test]
        fn prop_scripted_duels_are_deterministic(script in strategies::arb_command_script(120)) {
            let setup = || Duel::new(test_rifle());
            let result = verify_determinism(
                2,
                script.len() as u64,
                || (setup(), 0usize),
                |(duel, step)| {
                    if let Some(command) = script[*step] {
                        duel.sim.queue_command(duel.shooter, command).unwrap();
                    }
                    duel.sim.tick(tick_duration(), &EmptyWorld);
                    *step += 1;
                },
                |(duel, _)| duel.sim.state_hash(),
            );
            prop_assert!(result.is_deterministic);
        }
    }
}
