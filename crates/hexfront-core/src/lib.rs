//! Hexfront - client-side replica of a turn-based hex strategy game
//!
//! This crate mirrors the authoritative server state of one game, including:
//! - A full-state snapshot loader and field-level upsert merging
//! - An ordered event stream applied through typed transitions
//! - The rules catalog (weapons, armors, terrains, movement, unit types)
//! - A synchronous observer channel for presentation layers
//!
//! # Architecture
//!
//! The replica never decides game rules; the server already validated every
//! event it sends. What the replica does guarantee is consistency: each
//! event is applied atomically in stream order, observers are notified
//! before the model mutates, and any reference to state the replica does
//! not have is surfaced as a protocol desynchronization error instead of
//! being papered over.
//!
//! # Modules
//!
//! - [`model`]: Tile, unit and player records plus grid coordinates
//! - [`rules`]: The static rules catalog loaded at bootstrap
//! - [`payload`]: Wire payload shapes and the typed [`Action`] decoder
//! - [`events`]: Typed notifications emitted to observers
//! - [`channel`]: Observer registration and synchronous fan-out
//! - [`game`]: The [`Game`] aggregate and all transition functions

pub mod channel;
pub mod events;
pub mod game;
pub mod model;
pub mod payload;
pub mod rules;

// Re-export commonly used types
pub use channel::{EventChannel, GameObserver};
pub use events::GameEvent;
pub use game::{Game, GameError};
pub use model::{Coord, GameState, Path, Player, PlayerSettings, Tile, Unit, NEUTRAL_PLAYER_NUMBER};
pub use payload::{Action, GameDataPayload, PlayerPayload, TilePayload, UnitPayload};
pub use rules::{
    Armor, MovementType, Rules, RulesError, TerrainFlag, TerrainType, UnitClass, UnitFlag,
    UnitType, Weapon,
};
