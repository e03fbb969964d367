//! Gun data structures for data-driven weapon definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_decimal, shot_interval, Fixed};

/// Effect parameter the trail uses for its end point.
pub const TRAIL_END_PARAM: &str = "BeamEnd";

/// Animation clip names a gun requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GunAnimations {
    /// Played on the character for every shot.
    pub character_fire: String,
    /// Played on the weapon for every shot.
    pub fire: String,
    /// Character montage for a tactical reload.
    pub character_tactical_reload: String,
    /// Character montage for a full reload.
    pub character_full_reload: String,
    /// Weapon clip when the magazine is seated.
    pub magazine_in: String,
    /// Weapon clip when the magazine is pulled.
    pub magazine_out: String,
    /// Weapon clip for racking the bolt.
    pub bolt: String,
}

impl Default for GunAnimations {
    fn default() -> Self {
        Self {
            character_fire: "character_fire".to_string(),
            fire: "fire".to_string(),
            character_tactical_reload: "character_tactical_reload".to_string(),
            character_full_reload: "character_full_reload".to_string(),
            magazine_in: "magazine_in".to_string(),
            magazine_out: "magazine_out".to_string(),
            bolt: "bolt".to_string(),
        }
    }
}

/// Socket names on the gun and wielder meshes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GunSockets {
    /// Barrel end on the gun; trails and deflected shots start here.
    pub muzzle: String,
    /// Rear sight on the gun; the aimed camera sits here.
    pub aim: String,
    /// Front sight on the gun; aimed shots point at it.
    pub aim_end: String,
    /// Magazine well, on the gun and on the wielder's hand.
    pub magazine: String,
}

impl Default for GunSockets {
    fn default() -> Self {
        Self {
            muzzle: "Muzzle".to_string(),
            aim: "Aim".to_string(),
            aim_end: "AimEnd".to_string(),
            magazine: "Magazine".to_string(),
        }
    }
}

/// Data-driven gun definition.
///
/// Captured once when a gun spawns and never mutated afterwards, so every
/// comparison against capacity uses the same baseline however the live
/// clip changes.
///
/// # Example RON
///
/// ```ron
/// GunData(
///     id: "rifle",
///     automatic: true,
///     capacity: 30,
///     chamber: true,
///     rounds_per_minute: 600.0,
///     damage: 25.0,
///     max_range: 10000.0,
///     hipfire_spread: 0.05,
///     aim_time: 0.25,
///     tactical_reload_time: 2.0,
///     full_reload_time: 2.5,
///     impact_effects: { "Concrete": "impact_concrete" },
///     trail_effect: Some("bullet_trail"),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GunData {
    /// Unique string identifier for this gun type.
    pub id: String,

    /// Holding the trigger keeps firing.
    #[serde(default = "default_automatic")]
    pub automatic: bool,

    /// Rounds a full magazine holds.
    pub capacity: u32,

    /// Whether one extra round sits in the chamber outside the magazine.
    #[serde(default)]
    pub chamber: bool,

    /// Cadence.
    #[serde(with = "fixed_decimal")]
    pub rounds_per_minute: Fixed,

    /// Damage per hit before bone multipliers.
    #[serde(with = "fixed_decimal")]
    pub damage: Fixed,

    /// Bullet trace length in world units.
    pub max_range: f32,

    /// Hipfire cone half-angle in radians; shrinks to 0 when fully aimed.
    #[serde(with = "fixed_decimal")]
    pub hipfire_spread: Fixed,

    /// Seconds to blend from hip to sights.
    #[serde(with = "fixed_decimal")]
    pub aim_time: Fixed,

    /// Seconds a tactical reload takes.
    #[serde(with = "fixed_decimal")]
    pub tactical_reload_time: Fixed,

    /// Seconds a full reload takes.
    #[serde(with = "fixed_decimal")]
    pub full_reload_time: Fixed,

    /// Aim button toggles instead of being held.
    #[serde(default)]
    pub toggle_aim: bool,

    /// Animation clip names.
    #[serde(default)]
    pub animations: GunAnimations,

    /// Socket names.
    #[serde(default)]
    pub sockets: GunSockets,

    /// Impact effect per physical surface type.
    #[serde(default)]
    pub impact_effects: BTreeMap<String, String>,

    /// Tracer effect spawned at the muzzle for every shot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trail_effect: Option<String>,
}

const fn default_automatic() -> bool {
    true
}

impl GunData {
    /// Parse a gun definition from RON and validate it.
    pub fn from_ron_str(source_name: &str, ron: &str) -> Result<Self> {
        let data: Self = ron::from_str(ron).map_err(|e| GameError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        data.validate()?;
        Ok(data)
    }

    /// Reject definitions the gun state machine cannot run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| GameError::InvalidData {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.capacity == 0 {
            return Err(invalid("capacity must be at least 1"));
        }
        if self.rounds_per_minute <= Fixed::ZERO {
            return Err(invalid("rounds_per_minute must be positive"));
        }
        if self.damage < Fixed::ZERO {
            return Err(invalid("damage must not be negative"));
        }
        if !(self.max_range.is_finite() && self.max_range > 0.0) {
            return Err(invalid("max_range must be positive"));
        }
        if self.hipfire_spread < Fixed::ZERO {
            return Err(invalid("hipfire_spread must not be negative"));
        }
        if self.aim_time <= Fixed::ZERO {
            return Err(invalid("aim_time must be positive"));
        }
        if self.tactical_reload_time < Fixed::ZERO || self.full_reload_time < Fixed::ZERO {
            return Err(invalid("reload times must not be negative"));
        }
        Ok(())
    }

    /// Seconds between shots.
    #[must_use]
    pub fn shot_interval(&self) -> Fixed {
        shot_interval(self.rounds_per_minute)
    }

    /// Rounds held with a full magazine plus the chambered round.
    #[must_use]
    pub fn max_rounds(&self) -> u32 {
        self.capacity + u32::from(self.chamber)
    }

    /// Impact effect for a surface type, if one is mapped.
    #[must_use]
    pub fn impact_effect(&self, surface: &str) -> Option<&str> {
        self.impact_effects.get(surface).map(String::as_str)
    }

    /// Automatic rifle preset.
    #[must_use]
    pub fn rifle() -> Self {
        Self {
            id: "rifle".to_string(),
            automatic: true,
            capacity: 30,
            chamber: true,
            rounds_per_minute: Fixed::from_num(600),
            damage: Fixed::from_num(25),
            max_range: 10_000.0,
            hipfire_spread: Fixed::from_num(0.05),
            aim_time: Fixed::from_num(0.25),
            tactical_reload_time: Fixed::from_num(2),
            full_reload_time: Fixed::from_num(2.5),
            toggle_aim: false,
            animations: GunAnimations::default(),
            sockets: GunSockets::default(),
            impact_effects: BTreeMap::from([
                ("Concrete".to_string(), "impact_concrete".to_string()),
                ("Flesh".to_string(), "impact_flesh".to_string()),
                ("Metal".to_string(), "impact_metal".to_string()),
            ]),
            trail_effect: Some("bullet_trail".to_string()),
        }
    }

    /// Semi-automatic pistol preset.
    #[must_use]
    pub fn pistol() -> Self {
        Self {
            id: "pistol".to_string(),
            automatic: false,
            capacity: 12,
            chamber: true,
            rounds_per_minute: Fixed::from_num(400),
            damage: Fixed::from_num(20),
            max_range: 5_000.0,
            hipfire_spread: Fixed::from_num(0.03),
            aim_time: Fixed::from_num(0.15),
            tactical_reload_time: Fixed::from_num(1.5),
            full_reload_time: Fixed::from_num(1.75),
            ..Self::rifle()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIFLE_RON: &str = r#"
        GunData(
            id: "test_rifle",
            capacity: 30,
            chamber: true,
            rounds_per_minute: 600.0,
            damage: 25.0,
            max_range: 8000.0,
            hipfire_spread: 0.05,
            aim_time: 0.25,
            tactical_reload_time: 2.0,
            full_reload_time: 2.5,
            impact_effects: { "Concrete": "impact_concrete" },
            trail_effect: Some("trail"),
        )
    "#;

    #[test]
    fn test_parse_ron() {
        let gun = GunData::from_ron_str("test", RIFLE_RON).unwrap();
        assert_eq!(gun.id, "test_rifle");
        assert!(gun.automatic, "automatic defaults to true");
        assert_eq!(gun.capacity, 30);
        assert_eq!(gun.damage, Fixed::from_num(25));
        assert_eq!(gun.full_reload_time, Fixed::from_num(2.5));
        assert_eq!(gun.sockets.muzzle, "Muzzle");
        assert_eq!(gun.impact_effect("Concrete"), Some("impact_concrete"));
        assert_eq!(gun.impact_effect("Glass"), None);
    }

    #[test]
    fn test_max_rounds() {
        let mut gun = GunData::rifle();
        assert_eq!(gun.max_rounds(), 31);
        gun.chamber = false;
        assert_eq!(gun.max_rounds(), 30);
    }

    #[test]
    fn test_validation_rejects_zero_rate() {
        let mut gun = GunData::rifle();
        gun.rounds_per_minute = Fixed::ZERO;
        assert!(matches!(
            gun.validate(),
            Err(GameError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_empty_magazine() {
        let mut gun = GunData::pistol();
        gun.capacity = 0;
        assert!(gun.validate().is_err());
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = GunData::from_ron_str("broken.ron", "GunData(").unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(GunData::rifle().validate().is_ok());
        assert!(GunData::pistol().validate().is_ok());
        assert!(!GunData::pistol().automatic);
    }
}
