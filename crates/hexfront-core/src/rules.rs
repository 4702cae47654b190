//! Rules catalog: immutable game definitions loaded once at startup.
//!
//! This module contains:
//! - Catalog entry types (weapons, armors, terrains, movement, unit types)
//! - The [`Rules`] aggregate with id-based lookups
//! - The ruleset payload loader
//!
//! The wire format keys every category by arbitrary string ids; the loaded
//! catalog is re-keyed by each entry's declared integer `id`, which is what
//! tiles and units reference. Catalog data is never mutated after loading.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Sentinel for optional catalog references the server left null
/// (for example a unit type without a secondary weapon).
pub const UNSET: i32 = -1;

/// Error raised when the ruleset payload cannot be loaded.
///
/// A malformed ruleset is a fatal configuration error: the replica cannot
/// interpret tiles or units without a complete catalog, so there is no
/// partial recovery.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("malformed ruleset payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A weapon definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    pub id: i32,
    pub name: String,
    /// Whether the owning unit must be deployed to fire
    pub require_deployed: bool,
    /// Attack power by armor id
    pub power_map: HashMap<i32, i32>,
    /// Power multiplier by firing distance
    pub range_map: HashMap<i32, i32>,
}

/// An armor class referenced by weapon power maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armor {
    pub id: i32,
    pub name: String,
}

/// A unit class (land, sea, air...) referenced by carry rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitClass {
    pub id: i32,
    pub name: String,
}

/// A named flag attached to terrain types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainFlag {
    pub id: i32,
    pub name: String,
}

/// A terrain type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainType {
    pub id: i32,
    pub name: String,
    /// Unit type ids this terrain can build
    pub build_types: HashSet<i32>,
    /// Unit type ids this terrain can repair
    pub repair_types: HashSet<i32>,
    /// Terrain flag ids
    pub flags: HashSet<i32>,
}

/// A movement type with per-terrain movement costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementType {
    pub id: i32,
    pub name: String,
    /// Movement cost by terrain id; [`UNSET`] marks impassable terrain
    /// (null on the wire)
    #[serde(deserialize_with = "int_map_null_to_unset")]
    pub effect_map: HashMap<i32, i32>,
}

/// A named flag attached to unit types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFlag {
    pub id: i32,
    pub name: String,
}

/// A unit type definition with combat and movement stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitType {
    pub id: i32,
    pub name: String,
    pub unit_class: i32,
    pub price: i32,
    /// Weapon id, or [`UNSET`] when the unit has none
    #[serde(default = "unset", deserialize_with = "int_null_to_unset")]
    pub primary_weapon: i32,
    /// Weapon id, or [`UNSET`] when the unit has none
    #[serde(default = "unset", deserialize_with = "int_null_to_unset")]
    pub secondary_weapon: i32,
    pub armor: i32,
    /// Defense by damage type id
    pub defense_map: HashMap<i32, i32>,
    pub movement_type: i32,
    /// Movement points per turn
    pub movement: i32,
    /// Unit class ids this unit can carry
    pub carry_classes: HashSet<i32>,
    /// Carrier capacity
    pub carry_num: i32,
    /// Unit flag ids
    pub flags: HashSet<i32>,
}

/// The complete rules catalog.
///
/// Entries are shared read-only by the entity model; lookups go through the
/// integer ids stored on tiles and units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rules {
    pub weapons: HashMap<i32, Weapon>,
    pub armors: HashMap<i32, Armor>,
    pub unit_classes: HashMap<i32, UnitClass>,
    pub terrain_flags: HashMap<i32, TerrainFlag>,
    pub terrain_types: HashMap<i32, TerrainType>,
    pub movement_types: HashMap<i32, MovementType>,
    pub unit_flags: HashMap<i32, UnitFlag>,
    pub unit_types: HashMap<i32, UnitType>,
}

/// Wire shape of the ruleset: categories keyed by arbitrary string ids.
#[derive(Deserialize)]
struct RulesPayload {
    weapons: HashMap<String, Weapon>,
    armors: HashMap<String, Armor>,
    #[serde(rename = "unitClasses")]
    unit_classes: HashMap<String, UnitClass>,
    #[serde(rename = "terrainFlags")]
    terrain_flags: HashMap<String, TerrainFlag>,
    terrains: HashMap<String, TerrainType>,
    #[serde(rename = "movementTypes")]
    movement_types: HashMap<String, MovementType>,
    #[serde(rename = "unitFlags")]
    unit_flags: HashMap<String, UnitFlag>,
    units: HashMap<String, UnitType>,
}

impl Rules {
    /// Load the catalog from a decoded ruleset payload.
    ///
    /// Fails on any missing or malformed required field; the returned
    /// catalog is keyed by declared entry ids, not the payload's string keys.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, RulesError> {
        let payload: RulesPayload = serde_json::from_value(value.clone())?;
        Ok(Self {
            weapons: by_id(payload.weapons, |e| e.id),
            armors: by_id(payload.armors, |e| e.id),
            unit_classes: by_id(payload.unit_classes, |e| e.id),
            terrain_flags: by_id(payload.terrain_flags, |e| e.id),
            terrain_types: by_id(payload.terrains, |e| e.id),
            movement_types: by_id(payload.movement_types, |e| e.id),
            unit_flags: by_id(payload.unit_flags, |e| e.id),
            unit_types: by_id(payload.units, |e| e.id),
        })
    }

    /// Look up a weapon definition.
    pub fn weapon(&self, id: i32) -> Option<&Weapon> {
        self.weapons.get(&id)
    }

    /// Look up a terrain type definition.
    pub fn terrain_type(&self, id: i32) -> Option<&TerrainType> {
        self.terrain_types.get(&id)
    }

    /// Look up a movement type definition.
    pub fn movement_type(&self, id: i32) -> Option<&MovementType> {
        self.movement_types.get(&id)
    }

    /// Look up a unit type definition.
    pub fn unit_type(&self, id: i32) -> Option<&UnitType> {
        self.unit_types.get(&id)
    }
}

/// Re-key a category from payload string keys to declared integer ids.
fn by_id<T>(entries: HashMap<String, T>, key: fn(&T) -> i32) -> HashMap<i32, T> {
    entries.into_values().map(|e| (key(&e), e)).collect()
}

fn unset() -> i32 {
    UNSET
}

fn int_null_to_unset<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i32>::deserialize(deserializer)?.unwrap_or(UNSET))
}

fn int_map_null_to_unset<'de, D>(deserializer: D) -> Result<HashMap<i32, i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<i32, Option<i32>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or(UNSET)))
        .collect())
}
