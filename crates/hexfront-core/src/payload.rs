//! Wire payload shapes delivered by the server transport.
//!
//! This module contains:
//! - Snapshot payloads (game metadata, tiles, players, nested units)
//! - The [`Action`] enum, decoded once from an event's `content` object
//! - Field-level merge and sentinel helpers
//!
//! The transport hands the replica already-decoded `serde_json::Value`s;
//! everything here turns those into typed values at the boundary so the
//! rest of the crate never touches raw JSON. Partial payloads are the
//! norm: a field that is absent must leave the existing model value
//! untouched, which is why the upsert payloads wrap everything in
//! `Option` (and in `Option<Option<_>>` where the wire distinguishes
//! "absent" from "explicit null").

use crate::model::{GameState, Path};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;

/// Full-state snapshot payload: `{ "game": { ... } }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameDataPayload {
    pub game: GamePayload,
}

/// Game metadata, settings and entity arrays of a snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePayload {
    pub game_id: String,
    pub author_id: String,
    pub name: String,
    pub map_id: String,
    pub state: GameState,
    pub turn_start: i64,
    pub turn_number: i32,
    pub round_number: i32,
    pub in_turn_number: i32,
    pub settings: GameSettingsPayload,
    #[serde(default)]
    pub tiles: Vec<TilePayload>,
    #[serde(default)]
    pub players: Vec<PlayerPayload>,
}

/// Game settings block of a snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettingsPayload {
    #[serde(rename = "public")]
    pub public_game: bool,
    /// Seconds per turn; -1 when the game has no turn limit (null on the wire)
    #[serde(default = "unset_i64", deserialize_with = "i64_null_to_unset")]
    pub turn_length: i64,
    #[serde(default)]
    pub banned_units: HashSet<i32>,
}

/// One tile of a snapshot. Tiles replace wholesale, so every scalar field
/// is required; only the occupying unit is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilePayload {
    pub tile_id: String,
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub terrain: i32,
    pub subtype: i32,
    pub owner: i32,
    pub capture_points: i32,
    pub being_captured: bool,
    /// Occupying unit id; null or absent means unoccupied
    #[serde(default)]
    pub unit_id: Option<String>,
    /// Full payload of the occupying unit, present when `unit_id` is
    #[serde(default)]
    pub unit: Option<UnitPayload>,
}

/// A partial or complete unit description, merged field-by-field into the
/// model. Only `unitId` is required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPayload {
    pub unit_id: String,
    #[serde(default)]
    pub owner: Option<i32>,
    #[serde(default, rename = "type")]
    pub unit_type: Option<i32>,
    /// Absent = keep, null = clear, string = set
    #[serde(default, deserialize_with = "some_string_or_null")]
    pub tile_id: Option<Option<String>>,
    /// Absent = keep, null = clear, string = set
    #[serde(default, deserialize_with = "some_string_or_null")]
    pub carried_by: Option<Option<String>>,
    #[serde(default)]
    pub health: Option<i32>,
    #[serde(default)]
    pub deployed: Option<bool>,
    #[serde(default)]
    pub moved: Option<bool>,
    #[serde(default)]
    pub capturing: Option<bool>,
    /// Nested cargo payloads; each is upserted and appended to the carrier
    #[serde(default)]
    pub carried_units: Option<Vec<UnitPayload>>,
}

/// A partial or complete player description, merged by player number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPayload {
    pub player_number: i32,
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    /// Absent = keep, null = clear, string = set
    #[serde(default, deserialize_with = "some_string_or_null")]
    pub user_id: Option<Option<String>>,
    /// Absent = keep, null = clear, string = set
    #[serde(default, deserialize_with = "some_string_or_null")]
    pub player_name: Option<Option<String>>,
    #[serde(default)]
    pub team_number: Option<i32>,
    /// Only a numeric wire value updates funds; null, strings and absence
    /// all leave the current amount alone
    #[serde(default, deserialize_with = "numeric_or_skip")]
    pub funds: Option<i32>,
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub is_me: Option<bool>,
    #[serde(default)]
    pub settings: Option<PlayerSettingsPayload>,
}

/// Player notification settings block.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSettingsPayload {
    #[serde(default)]
    pub email_notifications: Option<bool>,
    #[serde(default)]
    pub hidden: Option<bool>,
}

/// Reference to a unit inside an event's content object.
///
/// Events embed `{"unit": {"unitId": "..."}}`; any extra fields the server
/// includes are ignored here - transitions re-read state from the model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnitRef {
    #[serde(rename = "unitId")]
    pub unit_id: String,
}

/// Reference to a tile inside an event's content object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TileRef {
    #[serde(rename = "tileId")]
    pub tile_id: String,
}

/// One game event, decoded from the `content` object of an event payload.
///
/// The `action` field tags the variant; every known action is listed here
/// and matched exhaustively by the dispatcher, so a newly added action
/// fails to compile until its transition exists.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Move {
        unit: UnitRef,
        tile: TileRef,
        #[serde(default)]
        path: Path,
    },
    Wait {
        unit: UnitRef,
    },
    Attack {
        attacker: UnitRef,
        target: UnitRef,
        damage: i32,
    },
    Counterattack {
        attacker: UnitRef,
        target: UnitRef,
        /// Older servers omit counterattack damage; -1 stands in and is
        /// applied literally downstream
        #[serde(default = "unset_damage", deserialize_with = "damage_or_unset")]
        damage: i32,
    },
    Capture {
        unit: UnitRef,
        tile: TileRef,
        left: i32,
    },
    Captured {
        unit: UnitRef,
        tile: TileRef,
    },
    Deploy {
        unit: UnitRef,
    },
    Undeploy {
        unit: UnitRef,
    },
    Load {
        unit: UnitRef,
        carrier: UnitRef,
    },
    Unload {
        unit: UnitRef,
        carrier: UnitRef,
        tile: TileRef,
    },
    Destroyed {
        unit: UnitRef,
    },
    #[serde(rename_all = "camelCase")]
    Repair {
        unit: UnitRef,
        new_health: i32,
    },
    Build {
        tile: TileRef,
        /// Full payload of the freshly built unit
        unit: UnitPayload,
    },
    #[serde(rename_all = "camelCase")]
    RegenerateCapturePoints {
        tile: TileRef,
        new_capture_points: i32,
    },
    ProduceFunds {
        tile: TileRef,
    },
    BeginTurn {
        player: i32,
    },
    EndTurn {
        player: i32,
    },
    TurnTimeout {
        player: i32,
    },
    Finished {
        winner: i32,
    },
    Surrender {
        player: i32,
    },
}

impl Action {
    /// Every action name the replica understands, as spelled on the wire.
    pub const KNOWN: [&'static str; 20] = [
        "move",
        "wait",
        "attack",
        "counterattack",
        "capture",
        "captured",
        "deploy",
        "undeploy",
        "load",
        "unload",
        "destroyed",
        "repair",
        "build",
        "regenerateCapturePoints",
        "produceFunds",
        "beginTurn",
        "endTurn",
        "turnTimeout",
        "finished",
        "surrender",
    ];

    /// Whether `name` is an action this replica knows how to apply.
    pub fn is_known(name: &str) -> bool {
        Self::KNOWN.contains(&name)
    }

    /// Decode an event's `content` object into a typed action.
    pub fn from_content(content: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(content.clone())
    }

    /// The wire name of this action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Wait { .. } => "wait",
            Action::Attack { .. } => "attack",
            Action::Counterattack { .. } => "counterattack",
            Action::Capture { .. } => "capture",
            Action::Captured { .. } => "captured",
            Action::Deploy { .. } => "deploy",
            Action::Undeploy { .. } => "undeploy",
            Action::Load { .. } => "load",
            Action::Unload { .. } => "unload",
            Action::Destroyed { .. } => "destroyed",
            Action::Repair { .. } => "repair",
            Action::Build { .. } => "build",
            Action::RegenerateCapturePoints { .. } => "regenerateCapturePoints",
            Action::ProduceFunds { .. } => "produceFunds",
            Action::BeginTurn { .. } => "beginTurn",
            Action::EndTurn { .. } => "endTurn",
            Action::TurnTimeout { .. } => "turnTimeout",
            Action::Finished { .. } => "finished",
            Action::Surrender { .. } => "surrender",
        }
    }
}

fn unset_i64() -> i64 {
    -1
}

fn unset_damage() -> i32 {
    -1
}

fn i64_null_to_unset<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(-1))
}

/// Tri-state string field: wraps the value so the merge code can tell a
/// field that was absent (`None`) from one that was an explicit null
/// (`Some(None)`, meaning "clear").
fn some_string_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Accepts any wire value but only yields an integer when it really was a
/// number; everything else reads as "no update".
fn numeric_or_skip<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64().map(|v| v as i32))
}

/// Counterattack damage: numeric value, or -1 when the server sent null or
/// something unusable.
fn damage_or_unset<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64().map(|v| v as i32).unwrap_or(-1))
}
