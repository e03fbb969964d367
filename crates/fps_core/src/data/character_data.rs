//! Character data structures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_decimal, fixed_decimal_map, Fixed};

/// Data-driven character type definition.
///
/// # Example RON
///
/// ```ron
/// CharacterData(
///     id: "soldier",
///     max_health: 100.0,
///     hit_bone_damage_multipliers: { "head": 4.0, "spine_03": 1.25 },
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterData {
    /// Unique string identifier for this character type.
    pub id: String,

    /// Health at spawn.
    #[serde(with = "fixed_decimal")]
    pub max_health: Fixed,

    /// Damage multiplier per struck bone. Bones not listed take 1x.
    #[serde(default, with = "fixed_decimal_map")]
    pub hit_bone_damage_multipliers: BTreeMap<String, Fixed>,

    /// Whether damage can apply at all (e.g. false for training dummies).
    #[serde(default = "default_can_be_damaged")]
    pub can_be_damaged: bool,
}

const fn default_can_be_damaged() -> bool {
    true
}

impl CharacterData {
    /// Parse a character definition from RON and validate it.
    pub fn from_ron_str(source_name: &str, ron: &str) -> Result<Self> {
        let data: Self = ron::from_str(ron).map_err(|e| GameError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        data.validate()?;
        Ok(data)
    }

    /// Reject definitions the character cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.max_health <= Fixed::ZERO {
            return Err(GameError::InvalidData {
                id: self.id.clone(),
                reason: "max_health must be positive".to_string(),
            });
        }
        if let Some((bone, _)) = self
            .hit_bone_damage_multipliers
            .iter()
            .find(|(_, multiplier)| **multiplier < Fixed::ZERO)
        {
            return Err(GameError::InvalidData {
                id: self.id.clone(),
                reason: format!("multiplier for bone '{bone}' must not be negative"),
            });
        }
        Ok(())
    }

    /// Damage multiplier for a struck bone; 1 when unknown or absent.
    #[must_use]
    pub fn multiplier_for(&self, bone: Option<&str>) -> Fixed {
        bone.and_then(|b| self.hit_bone_damage_multipliers.get(b))
            .copied()
            .unwrap_or(Fixed::ONE)
    }

    /// Standard infantry preset.
    #[must_use]
    pub fn soldier() -> Self {
        Self {
            id: "soldier".to_string(),
            max_health: Fixed::from_num(100),
            hit_bone_damage_multipliers: BTreeMap::from([
                ("head".to_string(), Fixed::from_num(4)),
                ("neck".to_string(), Fixed::from_num(2)),
                ("upperarm_l".to_string(), Fixed::from_num(0.75)),
                ("upperarm_r".to_string(), Fixed::from_num(0.75)),
            ]),
            can_be_damaged: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ron() {
        let data = CharacterData::from_ron_str(
            "test",
            r#"CharacterData(
                id: "grunt",
                max_health: 150.0,
                hit_bone_damage_multipliers: { "head": 2.5 },
            )"#,
        )
        .unwrap();
        assert_eq!(data.max_health, Fixed::from_num(150));
        assert_eq!(data.multiplier_for(Some("head")), Fixed::from_num(2.5));
        assert!(data.can_be_damaged);
    }

    #[test]
    fn test_unknown_bone_defaults_to_one() {
        let data = CharacterData::soldier();
        assert_eq!(data.multiplier_for(Some("pelvis")), Fixed::ONE);
        assert_eq!(data.multiplier_for(None), Fixed::ONE);
        assert_eq!(data.multiplier_for(Some("head")), Fixed::from_num(4));
    }

    #[test]
    fn test_rejects_negative_multiplier() {
        let mut data = CharacterData::soldier();
        data.hit_bone_damage_multipliers
            .insert("foot_l".to_string(), Fixed::from_num(-1));
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_rejects_dead_on_arrival() {
        let mut data = CharacterData::soldier();
        data.max_health = Fixed::ZERO;
        assert!(data.validate().is_err());
    }
}
