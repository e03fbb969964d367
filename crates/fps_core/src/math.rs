//! Math utilities for the combat simulation.
//!
//! Gameplay quantities (clock, cadence, health, damage, aim blend) use
//! fixed-point arithmetic so every participant reaches identical results
//! for identical inputs. Geometry exchanged with the world collaborator
//! (ray origins, directions, hit points) is plain `f32` in [`Vec3`].

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Seconds in one minute, the unit rate-of-fire is configured in.
const SECONDS_PER_MINUTE: i32 = 60;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for fixed-point numbers written as decimals.
///
/// Used for hand-edited data files where `2.5` reads better than the raw
/// bit pattern. Conversion from the decimal is deterministic, so every
/// participant loading the same file gets the same bits.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        super::decimal_to_fixed(value).ok_or_else(|| {
            D::Error::custom(format!("{value} is out of fixed-point range"))
        })
    }
}

/// Serde support for string-keyed maps of decimal fixed-point values.
pub mod fixed_decimal_map {
    use std::collections::BTreeMap;

    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize the map with decimal values.
    pub fn serialize<S>(map: &BTreeMap<String, Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let decimals: BTreeMap<&String, f64> =
            map.iter().map(|(k, v)| (k, v.to_num::<f64>())).collect();
        decimals.serialize(serializer)
    }

    /// Deserialize a map with decimal values.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let decimals = BTreeMap::<String, f64>::deserialize(deserializer)?;
        decimals
            .into_iter()
            .map(|(key, value)| {
                super::decimal_to_fixed(value)
                    .map(|fixed| (key.clone(), fixed))
                    .ok_or_else(|| D::Error::custom(format!("{key}: {value} is out of range")))
            })
            .collect()
    }
}

fn decimal_to_fixed(value: f64) -> Option<Fixed> {
    if !value.is_finite() {
        return None;
    }
    Fixed::checked_from_num(value)
}

/// Seconds between two shots at the given rate of fire.
///
/// A non-positive rate yields `Fixed::MAX`, which no elapsed time reaches.
#[must_use]
pub fn shot_interval(rounds_per_minute: Fixed) -> Fixed {
    if rounds_per_minute <= Fixed::ZERO {
        return Fixed::MAX;
    }
    Fixed::from_num(SECONDS_PER_MINUTE) / rounds_per_minute
}

/// Cubic ease from `from` to `to` with zero end tangents.
///
/// Hermite interpolation `from + (to - from) * (3a² - 2a³)`; `alpha` is
/// clamped to `[0, 1]`. Drives both the aim blend and the hipfire spread.
#[must_use]
pub fn ease_cubic(from: Fixed, to: Fixed, alpha: Fixed) -> Fixed {
    let a = alpha.clamp(Fixed::ZERO, Fixed::ONE);
    let a2 = a * a;
    let a3 = a2 * a;
    let weight = Fixed::from_num(3) * a2 - Fixed::from_num(2) * a3;
    from + (to - from) * weight
}

/// 3D vector used for geometry exchanged with the world collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate (forward).
    pub x: f32,
    /// Y coordinate (right).
    pub y: f32,
    /// Z coordinate (up).
    pub z: f32,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit forward axis.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit right axis.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit up axis.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product of two vectors.
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or zero for a degenerate vector.
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON || !len.is_finite() {
            return Self::ZERO;
        }
        self * (1.0 / len)
    }

    /// Two unit vectors perpendicular to `self` and to each other.
    ///
    /// `self` must be normalized.
    #[must_use]
    pub fn orthonormal_basis(self) -> (Self, Self) {
        let helper = if self.z.abs() < 0.999 { Self::Z } else { Self::X };
        let right = helper.cross(self).normalize_or_zero();
        let up = self.cross(right);
        (right, up)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shot_interval() {
        assert_eq!(shot_interval(Fixed::from_num(480)), Fixed::from_num(0.125));
        assert_eq!(shot_interval(Fixed::from_num(60)), Fixed::ONE);
        assert_eq!(shot_interval(Fixed::ZERO), Fixed::MAX);
    }

    #[test]
    fn test_ease_cubic_endpoints() {
        let from = Fixed::from_num(4);
        let to = Fixed::ZERO;
        assert_eq!(ease_cubic(from, to, Fixed::ZERO), from);
        assert_eq!(ease_cubic(from, to, Fixed::ONE), to);
        // Symmetric midpoint: 3/4 - 2/8 = 1/2
        assert_eq!(ease_cubic(from, to, Fixed::from_num(0.5)), Fixed::from_num(2));
    }

    #[test]
    fn test_ease_cubic_clamps_alpha() {
        let from = Fixed::ONE;
        let to = Fixed::from_num(3);
        assert_eq!(ease_cubic(from, to, Fixed::from_num(-1)), from);
        assert_eq!(ease_cubic(from, to, Fixed::from_num(2)), to);
    }

    #[test]
    fn test_ease_cubic_is_not_linear() {
        let quarter = ease_cubic(Fixed::ZERO, Fixed::ONE, Fixed::from_num(0.25));
        // 3/16 - 2/64 = 0.15625
        assert_eq!(quarter, Fixed::from_num(0.15625));
    }

    #[test]
    fn test_fixed_determinism() {
        // Same operations must produce identical results
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }

    #[test]
    fn test_vec3_normalize() {
        let v = Vec3::new(3.0, 0.0, 4.0).normalize_or_zero();
        assert!((v.length() - 1.0).abs() < 1e-6);
        assert!((v.x - 0.6).abs() < 1e-6);
        assert_eq!(Vec3::ZERO.normalize_or_zero(), Vec3::ZERO);
    }

    #[test]
    fn test_orthonormal_basis() {
        for dir in [Vec3::X, Vec3::Z, Vec3::new(1.0, 1.0, 1.0).normalize_or_zero()] {
            let (right, up) = dir.orthonormal_basis();
            assert!(dir.dot(right).abs() < 1e-5);
            assert!(dir.dot(up).abs() < 1e-5);
            assert!(right.dot(up).abs() < 1e-5);
            assert!((right.length() - 1.0).abs() < 1e-5);
            assert!((up.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_decimal_serde() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            #[serde(with = "fixed_decimal")]
            value: Fixed,
        }

        let parsed: Wrapper = ron::from_str("(value: 2.5)").unwrap();
        assert_eq!(parsed.value, Fixed::from_num(2.5));
        assert!(ron::from_str::<Wrapper>("(value: 1e300)").is_err());
    }
}
