//! Entity model for the game replica.
//!
//! This module contains:
//! - Grid coordinates and movement paths
//! - Tile, Unit and Player records
//! - The game lifecycle state
//!
//! Records carry no back-pointers; relations are stored as ids and resolved
//! through the [`Game`](crate::game::Game) collections that own them. All
//! mutation flows through the transition functions on `Game` - nothing else
//! writes to these records once they are loaded.

use serde::{Deserialize, Serialize};

/// Owner value for tiles that belong to no player.
pub const NEUTRAL_PLAYER_NUMBER: i32 = -1;

/// A position on the hex grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An ordered movement path, as reported by the server for `move` events.
pub type Path = Vec<Coord>;

/// Game lifecycle state. Transitions only move forward:
/// pregame -> in progress -> finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    #[serde(rename = "pregame")]
    Pregame,
    #[serde(rename = "inProgress")]
    InProgress,
    #[serde(rename = "finished")]
    Finished,
}

/// A single tile of the map.
///
/// Tiles are permanent for a game's duration: they are created or replaced
/// by snapshot loads and mutated by transitions, but never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Server-assigned opaque id
    pub id: String,
    /// Grid column
    pub x: i32,
    /// Grid row
    pub y: i32,
    /// Terrain type id (rules catalog)
    pub terrain: i32,
    /// Terrain subtype id
    pub subtype: i32,
    /// Owning player number, or [`NEUTRAL_PLAYER_NUMBER`]
    pub owner: i32,
    /// Remaining capture points
    pub capture_points: i32,
    /// Whether a capture is in progress on this tile
    pub being_captured: bool,
    /// Id of the occupying unit, empty when unoccupied
    pub unit_id: String,
}

impl Tile {
    /// Whether some unit currently occupies this tile.
    pub fn is_occupied(&self) -> bool {
        !self.unit_id.is_empty()
    }

    /// Whether this tile sits at the given grid position.
    pub fn is_at(&self, x: i32, y: i32) -> bool {
        self.x == x && self.y == y
    }
}

/// A unit on the map or stowed inside a carrier.
///
/// Invariant: a unit is either placed on exactly one tile (`tile_id` set,
/// `carried_by` empty) or carried by exactly one other unit (`carried_by`
/// set, `tile_id` empty) - never both, never neither, except transiently
/// inside a single transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Server-assigned opaque id
    pub id: String,
    /// Owning player number
    pub owner: i32,
    /// Unit type id (rules catalog)
    pub unit_type: i32,
    /// Tile this unit stands on, empty while carried or in transition
    pub tile_id: String,
    /// Carrier unit id, empty when not carried
    pub carried_by: String,
    /// Current health; the server clamps, the replica applies verbatim
    pub health: i32,
    /// Whether the unit is deployed (siege mode etc.)
    pub deployed: bool,
    /// Whether the unit has acted this turn
    pub moved: bool,
    /// Whether the unit is capturing its tile
    pub capturing: bool,
    /// Ids of carried units, in load order
    pub carried_units: Vec<String>,
}

impl Unit {
    /// A fresh record with sentinel fields, ready for payload merging.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: NEUTRAL_PLAYER_NUMBER,
            unit_type: -1,
            tile_id: String::new(),
            carried_by: String::new(),
            health: 0,
            deployed: false,
            moved: false,
            capturing: false,
            carried_units: Vec::new(),
        }
    }

    /// Whether the unit stands on a tile.
    pub fn is_placed(&self) -> bool {
        !self.tile_id.is_empty()
    }

    /// Whether the unit is stowed inside a carrier.
    pub fn is_carried(&self) -> bool {
        !self.carried_by.is_empty()
    }
}

/// Per-player notification preferences, merged from snapshot payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub email_notifications: bool,
    pub hidden: bool,
}

/// A participant in the game.
///
/// Players are never removed while a game runs; a surrendered player stays
/// in the collection and only loses ownership of units and tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable identity used as the collection key and in events
    pub number: i32,
    /// Internal database id
    pub id: String,
    /// Account id, empty for open slots
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Team number
    pub team: i32,
    /// Current funds
    pub funds: i32,
    /// Score
    pub score: i32,
    /// Whether this player is the local viewer
    pub is_me: bool,
    /// Notification preferences
    pub settings: PlayerSettings,
}

impl Player {
    /// A fresh record for the given player number, ready for payload merging.
    pub fn new(number: i32) -> Self {
        Self {
            number,
            id: String::new(),
            user_id: String::new(),
            name: String::new(),
            team: 0,
            funds: 0,
            score: 0,
            is_me: false,
            settings: PlayerSettings::default(),
        }
    }
}
