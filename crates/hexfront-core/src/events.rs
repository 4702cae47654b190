//! Typed event records broadcast to observers.
//!
//! Every transition emits exactly one [`GameEvent`] describing what the
//! server confirmed, before the model mutation is applied. Records own all
//! of their data (ids are copied in), so observers may keep or queue them
//! for as long as they like - nothing borrows from the triggering payload.

use crate::model::Path;
use serde::{Deserialize, Serialize};

/// One notification emitted on the event channel.
///
/// Variants mirror the server's action set one-to-one, plus [`GameData`]
/// which signals "the snapshot finished loading and the model is fully
/// synchronized". Ids are opaque strings; numbers are plain integers as
/// delivered by the server.
///
/// [`GameData`]: GameEvent::GameData
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A snapshot load completed; observers should rebuild derived state
    GameData,

    /// A unit moved along a path
    Move {
        unit_id: String,
        tile_id: String,
        path: Path,
    },

    /// A unit ended its turn without acting
    Wait { unit_id: String },

    /// A unit attacked another
    Attack {
        attacker_id: String,
        target_id: String,
        damage: i32,
    },

    /// The defender struck back
    Counterattack {
        attacker_id: String,
        target_id: String,
        damage: i32,
    },

    /// A capture attempt progressed, leaving `left` points on the tile
    Capture {
        unit_id: String,
        tile_id: String,
        left: i32,
    },

    /// A capture completed; the tile changes owner
    Captured { unit_id: String, tile_id: String },

    /// A unit deployed
    Deploy { unit_id: String },

    /// A unit undeployed
    Undeploy { unit_id: String },

    /// A unit was loaded into a carrier
    Load { unit_id: String, carrier_id: String },

    /// A unit was unloaded from a carrier onto a tile
    Unload {
        unit_id: String,
        carrier_id: String,
        tile_id: String,
    },

    /// A unit was destroyed (one record per unit, cargo included)
    Destroyed { unit_id: String },

    /// A unit was repaired to a new health value
    Repair { unit_id: String, new_health: i32 },

    /// A new unit appeared on a tile
    Build { tile_id: String, unit_id: String },

    /// A tile's capture points regenerated
    RegenerateCapturePoints {
        tile_id: String,
        new_capture_points: i32,
    },

    /// A property tile produced funds for its owner
    ProduceFunds { tile_id: String },

    /// A player's turn began
    BeginTurn { player: i32 },

    /// A player's turn ended; all moved flags reset
    EndTurn { player: i32 },

    /// The in-turn player ran out of time
    TurnTimeout { player: i32 },

    /// The game ended with a winner
    Finished { winner: i32 },

    /// A player surrendered, losing all units and tiles
    Surrender { player: i32 },
}

impl GameEvent {
    /// Short stable name of this event kind, for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::GameData => "gameData",
            GameEvent::Move { .. } => "move",
            GameEvent::Wait { .. } => "wait",
            GameEvent::Attack { .. } => "attack",
            GameEvent::Counterattack { .. } => "counterattack",
            GameEvent::Capture { .. } => "capture",
            GameEvent::Captured { .. } => "captured",
            GameEvent::Deploy { .. } => "deploy",
            GameEvent::Undeploy { .. } => "undeploy",
            GameEvent::Load { .. } => "load",
            GameEvent::Unload { .. } => "unload",
            GameEvent::Destroyed { .. } => "destroyed",
            GameEvent::Repair { .. } => "repair",
            GameEvent::Build { .. } => "build",
            GameEvent::RegenerateCapturePoints { .. } => "regenerateCapturePoints",
            GameEvent::ProduceFunds { .. } => "produceFunds",
            GameEvent::BeginTurn { .. } => "beginTurn",
            GameEvent::EndTurn { .. } => "endTurn",
            GameEvent::TurnTimeout { .. } => "turnTimeout",
            GameEvent::Finished { .. } => "finished",
            GameEvent::Surrender { .. } => "surrender",
        }
    }
}
