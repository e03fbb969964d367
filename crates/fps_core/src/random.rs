//! Deterministic seeded random stream for hipfire spread.
//!
//! Uses xorshift32. The authority picks a seed and replicates it, so every
//! observer that re-seeds its local stream draws the same cone offsets for
//! the same shots.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Seeded pseudo-random stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadRandom {
    seed: u32,
    state: u32,
}

impl SpreadRandom {
    /// Creates a new stream with the given seed.
    /// Seed of 0 is treated as 1 to avoid the degenerate all-zero sequence.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { seed, state }
    }

    /// Restart the stream from `seed`.
    pub fn reseed(&mut self, seed: u32) {
        *self = Self::new(seed);
    }

    /// Seed the stream was last started from.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Returns the next raw value.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Returns a float in `[0, 1)`.
    pub fn next_unit(&mut self) -> f32 {
        // 24 bits fit the f32 mantissa exactly.
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Random unit vector inside the cone around `direction`.
    ///
    /// `half_angle` is in radians. A non-positive half-angle returns the
    /// normalized direction without consuming the stream.
    pub fn random_cone_vector(&mut self, direction: Vec3, half_angle: f32) -> Vec3 {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO || half_angle <= 0.0 {
            return dir;
        }

        let theta = TAU * self.next_unit();
        let phi = (2.0 * self.next_unit() - 1.0).clamp(-1.0, 1.0).acos() % half_angle;

        let (right, up) = dir.orthonormal_basis();
        let radial = right * theta.cos() + up * theta.sin();
        (dir * phi.cos() + radial * phi.sin()).normalize_or_zero()
    }
}

impl Default for SpreadRandom {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_sequence() {
        let mut a = SpreadRandom::new(12345);
        let mut b = SpreadRandom::new(12345);
        for _ in 0..1000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_seeds_different_sequence() {
        let mut a = SpreadRandom::new(12345);
        let mut b = SpreadRandom::new(54321);
        assert_ne!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn zero_seed_handled() {
        let mut zero = SpreadRandom::new(0);
        let mut one = SpreadRandom::new(1);
        assert_eq!(zero.seed(), 0);
        assert_eq!(zero.next_u32(), one.next_u32());
    }

    #[test]
    fn unit_range() {
        let mut rng = SpreadRandom::new(42);
        for _ in 0..1000 {
            let v = rng.next_unit();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn cone_stays_inside_half_angle() {
        let mut rng = SpreadRandom::new(7);
        let dir = Vec3::new(1.0, 2.0, -0.5).normalize_or_zero();
        let half_angle = 0.1_f32;
        for _ in 0..500 {
            let v = rng.random_cone_vector(dir, half_angle);
            assert!((v.length() - 1.0).abs() < 1e-4);
            let angle = v.dot(dir).clamp(-1.0, 1.0).acos();
            assert!(angle <= half_angle + 1e-3, "angle {angle} exceeds cone");
        }
    }

    #[test]
    fn zero_cone_returns_direction_without_draws() {
        let mut rng = SpreadRandom::new(99);
        let dir = rng.random_cone_vector(Vec3::new(0.0, 0.0, 2.0), 0.0);
        assert_eq!(dir, Vec3::Z);
        assert_eq!(rng, SpreadRandom::new(99));
    }

    #[test]
    fn reseed_matches_fresh_stream() {
        let mut rng = SpreadRandom::new(3);
        rng.next_u32();
        rng.reseed(77);
        let mut fresh = SpreadRandom::new(77);
        for _ in 0..10 {
            assert_eq!(
                rng.random_cone_vector(Vec3::X, 0.2),
                fresh.random_cone_vector(Vec3::X, 0.2)
            );
        }
    }
}
