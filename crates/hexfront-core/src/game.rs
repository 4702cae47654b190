//! The game replica state machine.
//!
//! This module contains the [`Game`] aggregate and all transition logic.
//! The replica mirrors the server's authoritative state: it loads a
//! full-state snapshot, then applies server-confirmed events one at a time,
//! in stream order. It never validates game rules - the server already did -
//! but it does validate that every id an event references exists, because a
//! missing id means the event stream and the model have desynchronized and
//! nothing the replica does can repair that.
//!
//! Every transition follows the same shape: validate referenced ids, emit
//! one typed [`GameEvent`] on the channel, then mutate the model. A failing
//! validation aborts before anything is emitted or changed, so a rejected
//! event leaves the model exactly as it was.

use crate::channel::{EventChannel, GameObserver};
use crate::events::GameEvent;
use crate::model::{GameState, Path, Player, Tile, Unit, NEUTRAL_PLAYER_NUMBER};
use crate::payload::{Action, GameDataPayload, PlayerPayload, TilePayload, UnitPayload};
use crate::rules::{Rules, RulesError};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while ingesting snapshots or events.
///
/// The `Unknown*` variants are protocol desynchronization: the stream
/// referenced state the replica does not have. They are unrecoverable
/// within the core - the transport should drop the session and resync
/// with a fresh snapshot.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("event payload has no content object")]
    MissingContent,

    #[error("event content has no action name")]
    MissingAction,

    #[error("event references unknown unit {0:?}")]
    UnknownUnit(String),

    #[error("event references unknown tile {0:?}")]
    UnknownTile(String),

    #[error("event references unknown player {0}")]
    UnknownPlayer(i32),

    #[error("tile {0:?} declares occupying unit {1:?} but carries no unit payload")]
    MissingTileUnit(String, String),
}

/// The authoritative client-side replica of one game.
///
/// Owns every tile, unit and player record plus the rules catalog; all
/// mutation flows through [`load_snapshot`](Game::load_snapshot) and the
/// event entry points. Presentation layers hold a reference, subscribe for
/// notifications and read state back through the accessors.
#[derive(Debug, Default)]
pub struct Game {
    game_id: String,
    author_id: String,
    name: String,
    map_id: String,
    state: GameState,
    turn_start: i64,
    turn_number: i32,
    round_number: i32,
    in_turn_number: i32,
    public_game: bool,
    turn_length: i64,
    banned_units: HashSet<i32>,
    rules: Rules,
    tiles: HashMap<String, Tile>,
    units: HashMap<String, Unit>,
    players: HashMap<i32, Player>,
    channel: EventChannel,
}

impl Game {
    /// Create an empty replica awaiting a rules catalog and a snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for every event emitted from now on.
    pub fn subscribe(&mut self, observer: impl GameObserver + 'static) {
        self.channel.subscribe(observer);
    }

    // ==================== Ingestion entry points ====================

    /// Load the rules catalog. One-time bootstrap; a malformed ruleset is a
    /// fatal configuration error.
    pub fn load_rules(&mut self, payload: &Value) -> Result<(), RulesError> {
        self.rules = Rules::from_value(payload)?;
        Ok(())
    }

    /// Merge-load a full-state snapshot: game metadata, settings, tiles and
    /// players. Tiles replace wholesale, units and players merge, and units
    /// not mentioned are kept - repeated loads accumulate, they do not
    /// reset. Emits one [`GameEvent::GameData`] once the model is
    /// synchronized.
    pub fn load_snapshot(&mut self, payload: &Value) -> Result<(), GameError> {
        let data: GameDataPayload =
            serde_json::from_value(payload.clone()).map_err(|source| GameError::Malformed {
                kind: "snapshot",
                source,
            })?;
        let game = data.game;

        self.game_id = game.game_id;
        self.author_id = game.author_id;
        self.name = game.name;
        self.map_id = game.map_id;
        self.state = game.state;
        self.turn_start = game.turn_start;
        self.turn_number = game.turn_number;
        self.round_number = game.round_number;
        self.in_turn_number = game.in_turn_number;
        self.public_game = game.settings.public_game;
        self.turn_length = game.settings.turn_length;
        self.banned_units = game.settings.banned_units;

        for tile in &game.tiles {
            self.load_tile(tile)?;
        }
        for player in &game.players {
            self.upsert_player(player);
        }

        self.emit(GameEvent::GameData);
        Ok(())
    }

    /// Apply one event payload by its `content.action` discriminator.
    ///
    /// Unrecognized action names are logged and skipped without touching
    /// the model; a known action with an unusable content object, or one
    /// referencing unknown ids, is an error that leaves the model unchanged.
    pub fn apply_event(&mut self, payload: &Value) -> Result<(), GameError> {
        let content = payload.get("content").ok_or(GameError::MissingContent)?;
        let Some(name) = content.get("action").and_then(Value::as_str) else {
            return Err(GameError::MissingAction);
        };
        if !Action::is_known(name) {
            warn!(action = name, "ignoring unrecognized event action");
            return Ok(());
        }
        let action = Action::from_content(content).map_err(|source| GameError::Malformed {
            kind: "event",
            source,
        })?;
        self.apply_action(action)
    }

    /// Apply an ordered batch of event payloads, strictly in array order.
    ///
    /// Stops at the first failing event; everything before it stays
    /// applied, the failing event itself changes nothing.
    pub fn apply_events(&mut self, payloads: &[Value]) -> Result<(), GameError> {
        for payload in payloads {
            self.apply_event(payload)?;
        }
        Ok(())
    }

    /// Apply one already-decoded action.
    pub fn apply_action(&mut self, action: Action) -> Result<(), GameError> {
        debug!(action = action.name(), "applying event");
        match action {
            Action::Move { unit, tile, path } => self.move_unit(unit.unit_id, tile.tile_id, path),
            Action::Wait { unit } => self.wait_unit(unit.unit_id),
            Action::Attack {
                attacker,
                target,
                damage,
            } => self.attack_unit(attacker.unit_id, target.unit_id, damage),
            Action::Counterattack {
                attacker,
                target,
                damage,
            } => self.counterattack_unit(attacker.unit_id, target.unit_id, damage),
            Action::Capture { unit, tile, left } => {
                self.capture_tile(unit.unit_id, tile.tile_id, left)
            }
            Action::Captured { unit, tile } => self.captured_tile(unit.unit_id, tile.tile_id),
            Action::Deploy { unit } => self.deploy_unit(unit.unit_id),
            Action::Undeploy { unit } => self.undeploy_unit(unit.unit_id),
            Action::Load { unit, carrier } => self.load_unit(unit.unit_id, carrier.unit_id),
            Action::Unload {
                unit,
                carrier,
                tile,
            } => self.unload_unit(unit.unit_id, carrier.unit_id, tile.tile_id),
            Action::Destroyed { unit } => self.destroy_unit(unit.unit_id),
            Action::Repair { unit, new_health } => self.repair_unit(unit.unit_id, new_health),
            Action::Build { tile, unit } => self.build_unit(tile.tile_id, &unit),
            Action::RegenerateCapturePoints {
                tile,
                new_capture_points,
            } => self.regenerate_capture_points(tile.tile_id, new_capture_points),
            Action::ProduceFunds { tile } => self.produce_funds(tile.tile_id),
            Action::BeginTurn { player } => self.begin_turn(player),
            Action::EndTurn { player } => self.end_turn(player),
            Action::TurnTimeout { player } => self.turn_timeout(player),
            Action::Finished { winner } => self.finish_game(winner),
            Action::Surrender { player } => self.surrender_player(player),
        }
    }

    // ==================== Upserts ====================

    /// Create-or-merge a unit record. Only fields present in the payload
    /// change; everything else keeps its current value. Returns the unit id.
    pub fn upsert_unit(&mut self, payload: &UnitPayload) -> String {
        let unit = self
            .units
            .entry(payload.unit_id.clone())
            .or_insert_with(|| Unit::new(payload.unit_id.clone()));

        if let Some(owner) = payload.owner {
            unit.owner = owner;
        }
        if let Some(unit_type) = payload.unit_type {
            unit.unit_type = unit_type;
        }
        if let Some(tile_id) = &payload.tile_id {
            unit.tile_id = tile_id.clone().unwrap_or_default();
        }
        if let Some(carried_by) = &payload.carried_by {
            unit.carried_by = carried_by.clone().unwrap_or_default();
        }
        if let Some(health) = payload.health {
            unit.health = health;
        }
        if let Some(deployed) = payload.deployed {
            unit.deployed = deployed;
        }
        if let Some(moved) = payload.moved {
            unit.moved = moved;
        }
        if let Some(capturing) = payload.capturing {
            unit.capturing = capturing;
        }

        if let Some(carried) = &payload.carried_units {
            // Append, never replace: repeated upserts of the same cargo
            // accumulate duplicate entries.
            let carried_ids: Vec<String> =
                carried.iter().map(|p| self.upsert_unit(p)).collect();
            self.units
                .get_mut(&payload.unit_id)
                .unwrap()
                .carried_units
                .extend(carried_ids);
        }

        payload.unit_id.clone()
    }

    /// Create-or-merge a player record, keyed by player number. Funds only
    /// update from a numeric wire value; settings sub-fields merge
    /// individually. Returns the player number.
    pub fn upsert_player(&mut self, payload: &PlayerPayload) -> i32 {
        let player = self
            .players
            .entry(payload.player_number)
            .or_insert_with(|| Player::new(payload.player_number));

        if let Some(id) = &payload.id {
            player.id = id.clone();
        }
        if let Some(user_id) = &payload.user_id {
            player.user_id = user_id.clone().unwrap_or_default();
        }
        if let Some(name) = &payload.player_name {
            player.name = name.clone().unwrap_or_default();
        }
        if let Some(team) = payload.team_number {
            player.team = team;
        }
        if let Some(funds) = payload.funds {
            player.funds = funds;
        }
        if let Some(score) = payload.score {
            player.score = score;
        }
        if let Some(is_me) = payload.is_me {
            player.is_me = is_me;
        }
        if let Some(settings) = &payload.settings {
            if let Some(email_notifications) = settings.email_notifications {
                player.settings.email_notifications = email_notifications;
            }
            if let Some(hidden) = settings.hidden {
                player.settings.hidden = hidden;
            }
        }

        payload.player_number
    }

    /// Replace one tile from a snapshot payload, upserting its occupying
    /// unit first when it has one.
    fn load_tile(&mut self, payload: &TilePayload) -> Result<(), GameError> {
        let unit_id = payload.unit_id.clone().unwrap_or_default();
        if !unit_id.is_empty() {
            let unit = payload.unit.as_ref().ok_or_else(|| {
                GameError::MissingTileUnit(payload.tile_id.clone(), unit_id.clone())
            })?;
            self.upsert_unit(unit);
        }

        let tile = Tile {
            id: payload.tile_id.clone(),
            x: payload.x,
            y: payload.y,
            terrain: payload.terrain,
            subtype: payload.subtype,
            owner: payload.owner,
            capture_points: payload.capture_points,
            being_captured: payload.being_captured,
            unit_id,
        };
        self.tiles.insert(tile.id.clone(), tile);
        Ok(())
    }

    // ==================== Transition functions ====================

    fn move_unit(&mut self, unit_id: String, tile_id: String, path: Path) -> Result<(), GameError> {
        let previous_tile_id = self.require_unit(&unit_id)?.tile_id.clone();
        if !self.tiles.contains_key(&previous_tile_id) {
            return Err(GameError::UnknownTile(previous_tile_id));
        }
        let destination = self.require_tile(&tile_id)?;
        if destination.is_occupied() && destination.unit_id != unit_id {
            // A unit moving onto its carrier loads next; the back-reference
            // stays with the occupant.
            debug!(
                unit = %unit_id,
                tile = %tile_id,
                occupant = %destination.unit_id,
                "move onto occupied tile"
            );
        }

        self.emit(GameEvent::Move {
            unit_id: unit_id.clone(),
            tile_id: tile_id.clone(),
            path,
        });

        self.tiles.get_mut(&previous_tile_id).unwrap().unit_id.clear();
        let destination = self.tiles.get_mut(&tile_id).unwrap();
        if destination.unit_id.is_empty() {
            destination.unit_id = unit_id.clone();
        }
        self.units.get_mut(&unit_id).unwrap().tile_id = tile_id;
        Ok(())
    }

    fn wait_unit(&mut self, unit_id: String) -> Result<(), GameError> {
        self.require_unit(&unit_id)?;

        self.emit(GameEvent::Wait {
            unit_id: unit_id.clone(),
        });

        self.units.get_mut(&unit_id).unwrap().moved = true;
        Ok(())
    }

    fn attack_unit(
        &mut self,
        attacker_id: String,
        target_id: String,
        damage: i32,
    ) -> Result<(), GameError> {
        self.require_unit(&attacker_id)?;
        self.require_unit(&target_id)?;

        self.emit(GameEvent::Attack {
            attacker_id: attacker_id.clone(),
            target_id: target_id.clone(),
            damage,
        });

        self.units.get_mut(&attacker_id).unwrap().moved = true;
        self.units.get_mut(&target_id).unwrap().health -= damage;
        Ok(())
    }

    fn counterattack_unit(
        &mut self,
        attacker_id: String,
        target_id: String,
        damage: i32,
    ) -> Result<(), GameError> {
        self.require_unit(&attacker_id)?;
        self.require_unit(&target_id)?;

        self.emit(GameEvent::Counterattack {
            attacker_id,
            target_id: target_id.clone(),
            damage,
        });

        // The -1 stand-in for damage-less counterattacks subtracts
        // literally, nudging health up by one.
        self.units.get_mut(&target_id).unwrap().health -= damage;
        Ok(())
    }

    fn capture_tile(&mut self, unit_id: String, tile_id: String, left: i32) -> Result<(), GameError> {
        self.require_unit(&unit_id)?;
        self.require_tile(&tile_id)?;

        self.emit(GameEvent::Capture {
            unit_id: unit_id.clone(),
            tile_id: tile_id.clone(),
            left,
        });

        self.units.get_mut(&unit_id).unwrap().moved = true;
        let tile = self.tiles.get_mut(&tile_id).unwrap();
        tile.capture_points = left;
        tile.being_captured = true;
        Ok(())
    }

    fn captured_tile(&mut self, unit_id: String, tile_id: String) -> Result<(), GameError> {
        let owner = self.require_unit(&unit_id)?.owner;
        self.require_tile(&tile_id)?;

        self.emit(GameEvent::Captured {
            unit_id,
            tile_id: tile_id.clone(),
        });

        let tile = self.tiles.get_mut(&tile_id).unwrap();
        tile.capture_points = 1;
        tile.being_captured = false;
        tile.owner = owner;
        Ok(())
    }

    fn deploy_unit(&mut self, unit_id: String) -> Result<(), GameError> {
        self.require_unit(&unit_id)?;

        self.emit(GameEvent::Deploy {
            unit_id: unit_id.clone(),
        });

        let unit = self.units.get_mut(&unit_id).unwrap();
        unit.moved = true;
        unit.deployed = true;
        Ok(())
    }

    fn undeploy_unit(&mut self, unit_id: String) -> Result<(), GameError> {
        self.require_unit(&unit_id)?;

        self.emit(GameEvent::Undeploy {
            unit_id: unit_id.clone(),
        });

        let unit = self.units.get_mut(&unit_id).unwrap();
        unit.moved = true;
        unit.deployed = false;
        Ok(())
    }

    fn load_unit(&mut self, unit_id: String, carrier_id: String) -> Result<(), GameError> {
        self.require_unit(&unit_id)?;
        self.require_unit(&carrier_id)?;

        self.emit(GameEvent::Load {
            unit_id: unit_id.clone(),
            carrier_id: carrier_id.clone(),
        });

        let unit = self.units.get_mut(&unit_id).unwrap();
        unit.tile_id.clear();
        unit.carried_by = carrier_id.clone();
        unit.moved = true;
        self.units
            .get_mut(&carrier_id)
            .unwrap()
            .carried_units
            .push(unit_id);
        Ok(())
    }

    fn unload_unit(
        &mut self,
        unit_id: String,
        carrier_id: String,
        tile_id: String,
    ) -> Result<(), GameError> {
        self.require_unit(&unit_id)?;
        self.require_unit(&carrier_id)?;
        self.require_tile(&tile_id)?;

        self.emit(GameEvent::Unload {
            unit_id: unit_id.clone(),
            carrier_id: carrier_id.clone(),
            tile_id: tile_id.clone(),
        });

        let unit = self.units.get_mut(&unit_id).unwrap();
        unit.tile_id = tile_id.clone();
        unit.carried_by.clear();
        unit.moved = true;
        self.tiles.get_mut(&tile_id).unwrap().unit_id = unit_id.clone();
        let carrier = self.units.get_mut(&carrier_id).unwrap();
        carrier.moved = true;
        carrier.carried_units.retain(|id| id != &unit_id);
        Ok(())
    }

    fn destroy_unit(&mut self, unit_id: String) -> Result<(), GameError> {
        self.require_unit(&unit_id)?;

        self.emit(GameEvent::Destroyed {
            unit_id: unit_id.clone(),
        });

        // Snapshot placement and cargo before mutating; the recursion below
        // edits the same collection.
        let (tile_id, carried) = {
            let unit = &self.units[&unit_id];
            (unit.tile_id.clone(), unit.carried_units.clone())
        };

        for carried_id in carried {
            // Cargo lists may contain duplicates; each unit dies once.
            if self.units.contains_key(&carried_id) {
                self.destroy_unit(carried_id)?;
            }
        }

        if !tile_id.is_empty() {
            if let Some(tile) = self.tiles.get_mut(&tile_id) {
                tile.unit_id.clear();
            }
        }
        self.units.remove(&unit_id);
        Ok(())
    }

    fn repair_unit(&mut self, unit_id: String, new_health: i32) -> Result<(), GameError> {
        self.require_unit(&unit_id)?;

        self.emit(GameEvent::Repair {
            unit_id: unit_id.clone(),
            new_health,
        });

        self.units.get_mut(&unit_id).unwrap().health = new_health;
        Ok(())
    }

    fn build_unit(&mut self, tile_id: String, payload: &UnitPayload) -> Result<(), GameError> {
        self.require_tile(&tile_id)?;

        let unit_id = self.upsert_unit(payload);
        self.units.get_mut(&unit_id).unwrap().tile_id = tile_id.clone();

        self.emit(GameEvent::Build {
            tile_id: tile_id.clone(),
            unit_id: unit_id.clone(),
        });

        self.tiles.get_mut(&tile_id).unwrap().unit_id = unit_id.clone();
        self.units.get_mut(&unit_id).unwrap().moved = true;
        Ok(())
    }

    fn regenerate_capture_points(
        &mut self,
        tile_id: String,
        new_capture_points: i32,
    ) -> Result<(), GameError> {
        self.require_tile(&tile_id)?;

        self.emit(GameEvent::RegenerateCapturePoints {
            tile_id: tile_id.clone(),
            new_capture_points,
        });

        let tile = self.tiles.get_mut(&tile_id).unwrap();
        tile.capture_points = new_capture_points;
        tile.being_captured = false;
        Ok(())
    }

    fn produce_funds(&mut self, tile_id: String) -> Result<(), GameError> {
        self.require_tile(&tile_id)?;

        // Informational: the server reports the production, funds arrive
        // through player upserts in later snapshots.
        self.emit(GameEvent::ProduceFunds { tile_id });
        Ok(())
    }

    fn begin_turn(&mut self, player: i32) -> Result<(), GameError> {
        self.require_player(player)?;

        self.emit(GameEvent::BeginTurn { player });

        self.in_turn_number = player;
        Ok(())
    }

    fn end_turn(&mut self, player: i32) -> Result<(), GameError> {
        self.emit(GameEvent::EndTurn { player });

        // Every unit in the game, not just the leaving player's.
        for unit in self.units.values_mut() {
            unit.moved = false;
        }
        Ok(())
    }

    fn turn_timeout(&mut self, player: i32) -> Result<(), GameError> {
        self.emit(GameEvent::TurnTimeout { player });
        Ok(())
    }

    fn finish_game(&mut self, winner: i32) -> Result<(), GameError> {
        self.emit(GameEvent::Finished { winner });

        self.state = GameState::Finished;
        Ok(())
    }

    fn surrender_player(&mut self, player: i32) -> Result<(), GameError> {
        self.require_player(player)?;

        self.emit(GameEvent::Surrender { player });

        // Collect ids first: destroying edits the collection, and cargo of
        // a destroyed carrier may already be gone when its turn comes.
        let doomed: Vec<String> = self
            .units
            .values()
            .filter(|unit| unit.owner == player)
            .map(|unit| unit.id.clone())
            .collect();
        for unit_id in doomed {
            if self.units.contains_key(&unit_id) {
                self.destroy_unit(unit_id)?;
            }
        }

        for tile in self.tiles.values_mut() {
            if tile.owner == player {
                tile.owner = NEUTRAL_PLAYER_NUMBER;
            }
        }
        Ok(())
    }

    // ==================== Read accessors ====================

    /// Look up a tile by id.
    pub fn tile(&self, tile_id: &str) -> Option<&Tile> {
        self.tiles.get(tile_id)
    }

    /// Look up a unit by id.
    pub fn unit(&self, unit_id: &str) -> Option<&Unit> {
        self.units.get(unit_id)
    }

    /// Look up a player by number.
    pub fn player(&self, number: i32) -> Option<&Player> {
        self.players.get(&number)
    }

    /// All tiles, keyed by id.
    pub fn tiles(&self) -> &HashMap<String, Tile> {
        &self.tiles
    }

    /// All units, keyed by id.
    pub fn units(&self) -> &HashMap<String, Unit> {
        &self.units
    }

    /// All players, keyed by number.
    pub fn players(&self) -> &HashMap<i32, Player> {
        &self.players
    }

    /// The rules catalog.
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// The player whose turn it is.
    pub fn in_turn_player(&self) -> Option<&Player> {
        self.players.get(&self.in_turn_number)
    }

    /// The tile at a grid position. Linear scan; maps stay small enough
    /// that a spatial index is not worth carrying.
    pub fn tile_at(&self, x: i32, y: i32) -> Option<&Tile> {
        self.tiles.values().find(|tile| tile.is_at(x, y))
    }

    /// Server id of this game.
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Account id of the game's creator.
    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    /// Display name of the game.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the map this game is played on.
    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    /// Lifecycle state.
    pub fn state(&self) -> GameState {
        self.state
    }

    /// Timestamp of the current turn's start.
    pub fn turn_start(&self) -> i64 {
        self.turn_start
    }

    /// Current turn number.
    pub fn turn_number(&self) -> i32 {
        self.turn_number
    }

    /// Current round number.
    pub fn round_number(&self) -> i32 {
        self.round_number
    }

    /// Number of the player whose turn it is.
    pub fn in_turn_number(&self) -> i32 {
        self.in_turn_number
    }

    /// Whether the game is listed publicly.
    pub fn public_game(&self) -> bool {
        self.public_game
    }

    /// Seconds per turn, -1 when unlimited.
    pub fn turn_length(&self) -> i64 {
        self.turn_length
    }

    /// Unit type ids banned from this game.
    pub fn banned_units(&self) -> &HashSet<i32> {
        &self.banned_units
    }

    // ==================== Internals ====================

    fn emit(&mut self, event: GameEvent) {
        self.channel.emit(&event);
    }

    fn require_unit(&self, unit_id: &str) -> Result<&Unit, GameError> {
        self.units
            .get(unit_id)
            .ok_or_else(|| GameError::UnknownUnit(unit_id.to_string()))
    }

    fn require_tile(&self, tile_id: &str) -> Result<&Tile, GameError> {
        self.tiles
            .get(tile_id)
            .ok_or_else(|| GameError::UnknownTile(tile_id.to_string()))
    }

    fn require_player(&self, number: i32) -> Result<&Player, GameError> {
        self.players
            .get(&number)
            .ok_or(GameError::UnknownPlayer(number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn unit_payload(value: serde_json::Value) -> UnitPayload {
        serde_json::from_value(value).unwrap()
    }

    fn player_payload(value: serde_json::Value) -> PlayerPayload {
        serde_json::from_value(value).unwrap()
    }

    /// A game with two tiles, two players and one infantry on t1.
    fn small_game() -> Game {
        let mut game = Game::new();
        game.load_snapshot(&json!({
            "game": {
                "gameId": "g1",
                "authorId": "author",
                "name": "Test game",
                "mapId": "m1",
                "state": "inProgress",
                "turnStart": 1000,
                "turnNumber": 3,
                "roundNumber": 1,
                "inTurnNumber": 1,
                "settings": {"public": true, "turnLength": null, "bannedUnits": []},
                "tiles": [
                    {
                        "tileId": "t1", "x": 0, "y": 0, "type": 2, "subtype": 0,
                        "owner": 1, "capturePoints": 1, "beingCaptured": false,
                        "unitId": "u1",
                        "unit": {"unitId": "u1", "owner": 1, "type": 5, "tileId": "t1", "health": 100}
                    },
                    {
                        "tileId": "t2", "x": 1, "y": 0, "type": 2, "subtype": 0,
                        "owner": -1, "capturePoints": 1, "beingCaptured": false,
                        "unitId": null
                    }
                ],
                "players": [
                    {"playerNumber": 1, "playerName": "Alice", "funds": 500},
                    {"playerNumber": 2, "playerName": "Bob", "funds": 300}
                ]
            }
        }))
        .unwrap();
        game
    }

    #[test]
    fn test_unit_upsert_is_a_pure_merge() {
        let mut game = Game::new();
        game.upsert_unit(&unit_payload(json!({
            "unitId": "u1", "owner": 2, "health": 10
        })));
        game.upsert_unit(&unit_payload(json!({
            "unitId": "u1", "health": 5
        })));

        let unit = game.unit("u1").unwrap();
        assert_eq!(unit.owner, 2);
        assert_eq!(unit.health, 5);
    }

    #[test]
    fn test_unit_upsert_null_clears_tile_link() {
        let mut game = Game::new();
        game.upsert_unit(&unit_payload(json!({
            "unitId": "u1", "tileId": "t1"
        })));
        assert_eq!(game.unit("u1").unwrap().tile_id, "t1");

        // Absent field keeps the link...
        game.upsert_unit(&unit_payload(json!({"unitId": "u1", "health": 3})));
        assert_eq!(game.unit("u1").unwrap().tile_id, "t1");

        // ...explicit null clears it.
        game.upsert_unit(&unit_payload(json!({"unitId": "u1", "tileId": null})));
        assert_eq!(game.unit("u1").unwrap().tile_id, "");
    }

    #[test]
    fn test_carried_units_upsert_appends_duplicates() {
        let mut game = Game::new();
        let payload = unit_payload(json!({
            "unitId": "carrier",
            "owner": 1,
            "carriedUnits": [{"unitId": "cargo", "owner": 1, "carriedBy": "carrier"}]
        }));
        game.upsert_unit(&payload);
        game.upsert_unit(&payload);

        // Append-not-replace is long-standing behavior: the same cargo id
        // shows up once per upsert.
        let carrier = game.unit("carrier").unwrap();
        assert_eq!(carrier.carried_units, vec!["cargo", "cargo"]);
        assert_eq!(game.units().len(), 2);
    }

    #[test]
    fn test_player_upsert_only_updates_numeric_funds() {
        let mut game = Game::new();
        game.upsert_player(&player_payload(json!({
            "playerNumber": 1, "playerName": "Alice", "funds": 1000
        })));
        game.upsert_player(&player_payload(json!({
            "playerNumber": 1, "funds": null
        })));

        let player = game.player(1).unwrap();
        assert_eq!(player.funds, 1000);
        assert_eq!(player.name, "Alice");
    }

    #[test]
    fn test_move_relinks_unit_and_tiles() {
        let mut game = small_game();
        game.apply_action(Action::Move {
            unit: crate::payload::UnitRef {
                unit_id: "u1".into(),
            },
            tile: crate::payload::TileRef {
                tile_id: "t2".into(),
            },
            path: vec![],
        })
        .unwrap();

        assert_eq!(game.tile("t1").unwrap().unit_id, "");
        assert_eq!(game.tile("t2").unwrap().unit_id, "u1");
        assert_eq!(game.unit("u1").unwrap().tile_id, "t2");
    }

    #[test]
    fn test_capture_then_captured_transfers_tile() {
        let mut game = small_game();

        game.apply_event(&json!({
            "content": {
                "action": "capture",
                "unit": {"unitId": "u1"},
                "tile": {"tileId": "t2"},
                "left": 5
            }
        }))
        .unwrap();
        let tile = game.tile("t2").unwrap();
        assert_eq!(tile.capture_points, 5);
        assert!(tile.being_captured);
        assert!(game.unit("u1").unwrap().moved);

        game.apply_event(&json!({
            "content": {
                "action": "captured",
                "unit": {"unitId": "u1"},
                "tile": {"tileId": "t2"}
            }
        }))
        .unwrap();
        let tile = game.tile("t2").unwrap();
        assert_eq!(tile.capture_points, 1);
        assert!(!tile.being_captured);
        assert_eq!(tile.owner, 1);
    }

    #[test]
    fn test_counterattack_sentinel_heals_by_one() {
        let mut game = small_game();
        game.upsert_unit(&unit_payload(json!({
            "unitId": "u2", "owner": 2, "health": 40
        })));

        game.apply_event(&json!({
            "content": {
                "action": "counterattack",
                "attacker": {"unitId": "u2"},
                "target": {"unitId": "u1"}
            }
        }))
        .unwrap();

        // Missing damage decodes as -1 and is subtracted literally.
        assert_eq!(game.unit("u1").unwrap().health, 101);
    }

    #[test]
    fn test_end_turn_clears_every_moved_flag() {
        let mut game = small_game();
        game.upsert_unit(&unit_payload(json!({
            "unitId": "u2", "owner": 2, "moved": true
        })));
        game.apply_event(&json!({
            "content": {"action": "wait", "unit": {"unitId": "u1"}}
        }))
        .unwrap();
        assert!(game.unit("u1").unwrap().moved);

        game.apply_event(&json!({
            "content": {"action": "endTurn", "player": 1}
        }))
        .unwrap();

        assert!(game.units().values().all(|unit| !unit.moved));
    }

    #[test]
    fn test_begin_turn_tracks_in_turn_player() {
        let mut game = small_game();
        game.apply_event(&json!({
            "content": {"action": "beginTurn", "player": 2}
        }))
        .unwrap();
        assert_eq!(game.in_turn_number(), 2);
        assert_eq!(game.in_turn_player().unwrap().name, "Bob");
    }

    #[test]
    fn test_finished_moves_state_forward() {
        let mut game = small_game();
        assert_eq!(game.state(), GameState::InProgress);
        game.apply_event(&json!({
            "content": {"action": "finished", "winner": 2}
        }))
        .unwrap();
        assert_eq!(game.state(), GameState::Finished);
    }

    #[test]
    fn test_unknown_action_is_ignored() {
        let mut game = small_game();
        let before_units = game.units().clone();

        let result = game.apply_event(&json!({
            "content": {"action": "teleport", "unit": {"unitId": "u1"}}
        }));

        assert!(result.is_ok());
        assert_eq!(game.units(), &before_units);
    }

    #[test]
    fn test_unknown_unit_is_a_desync_error() {
        let mut game = small_game();

        let result = game.apply_event(&json!({
            "content": {
                "action": "attack",
                "attacker": {"unitId": "u1"},
                "target": {"unitId": "ghost"},
                "damage": 10
            }
        }));

        assert!(matches!(result, Err(GameError::UnknownUnit(id)) if id == "ghost"));
        // Validation failed before any mutation: the attacker never moved.
        assert!(!game.unit("u1").unwrap().moved);
    }

    #[test]
    fn test_failed_move_leaves_tiles_linked() {
        let mut game = small_game();

        let result = game.apply_event(&json!({
            "content": {
                "action": "move",
                "unit": {"unitId": "u1"},
                "tile": {"tileId": "nowhere"},
                "path": []
            }
        }));

        assert!(matches!(result, Err(GameError::UnknownTile(id)) if id == "nowhere"));
        assert_eq!(game.tile("t1").unwrap().unit_id, "u1");
        assert_eq!(game.unit("u1").unwrap().tile_id, "t1");
    }

    #[test]
    fn test_move_onto_carrier_tile_keeps_carrier_backreference() {
        let mut game = small_game();
        game.upsert_unit(&unit_payload(json!({
            "unitId": "apc", "owner": 1, "type": 9, "tileId": "t2", "health": 100
        })));
        // Mirror the snapshot link by hand: t2 carries the APC.
        game.apply_event(&json!({
            "content": {
                "action": "build",
                "tile": {"tileId": "t2"},
                "unit": {"unitId": "apc"}
            }
        }))
        .unwrap();

        // Move the infantry onto the APC's tile, then load. The tile keeps
        // pointing at the APC throughout.
        game.apply_event(&json!({
            "content": {
                "action": "move",
                "unit": {"unitId": "u1"},
                "tile": {"tileId": "t2"},
                "path": [{"x": 0, "y": 0}, {"x": 1, "y": 0}]
            }
        }))
        .unwrap();
        assert_eq!(game.tile("t2").unwrap().unit_id, "apc");
        assert_eq!(game.unit("u1").unwrap().tile_id, "t2");
        assert_eq!(game.tile("t1").unwrap().unit_id, "");

        game.apply_event(&json!({
            "content": {
                "action": "load",
                "unit": {"unitId": "u1"},
                "carrier": {"unitId": "apc"}
            }
        }))
        .unwrap();

        let infantry = game.unit("u1").unwrap();
        assert_eq!(infantry.tile_id, "");
        assert_eq!(infantry.carried_by, "apc");
        assert!(infantry.moved);
        assert_eq!(game.unit("apc").unwrap().carried_units, vec!["u1"]);
        assert_eq!(game.tile("t2").unwrap().unit_id, "apc");
    }

    #[test]
    fn test_destroy_removes_cargo_recursively() {
        let mut game = small_game();
        game.upsert_unit(&unit_payload(json!({
            "unitId": "carrier", "owner": 2, "tileId": "t2",
            "carriedUnits": [
                {"unitId": "cargo-a", "owner": 2, "carriedBy": "carrier"},
                {"unitId": "cargo-b", "owner": 2, "carriedBy": "carrier"}
            ]
        })));
        // Link the tile the way a snapshot would.
        game.apply_event(&json!({
            "content": {
                "action": "build",
                "tile": {"tileId": "t2"},
                "unit": {"unitId": "carrier"}
            }
        }))
        .unwrap();
        assert_eq!(game.units().len(), 4);

        game.apply_event(&json!({
            "content": {"action": "destroyed", "unit": {"unitId": "carrier"}}
        }))
        .unwrap();

        assert_eq!(game.units().len(), 1);
        assert!(game.unit("u1").is_some());
        assert_eq!(game.tile("t2").unwrap().unit_id, "");
    }

    #[test]
    fn test_surrender_strips_units_and_tiles() {
        let mut game = small_game();
        game.upsert_unit(&unit_payload(json!({
            "unitId": "carrier", "owner": 1, "tileId": "t2",
            "carriedUnits": [{"unitId": "cargo", "owner": 1, "carriedBy": "carrier"}]
        })));

        game.apply_event(&json!({
            "content": {"action": "surrender", "player": 1}
        }))
        .unwrap();

        assert!(game.units().values().all(|unit| unit.owner != 1));
        assert!(game.tiles().values().all(|tile| tile.owner != 1));
        assert_eq!(game.tile("t1").unwrap().owner, NEUTRAL_PLAYER_NUMBER);
        assert!(game.units().is_empty());
    }

    #[test]
    fn test_repair_and_deploy_set_unit_fields() {
        let mut game = small_game();

        game.apply_event(&json!({
            "content": {"action": "deploy", "unit": {"unitId": "u1"}}
        }))
        .unwrap();
        let unit = game.unit("u1").unwrap();
        assert!(unit.deployed);
        assert!(unit.moved);

        game.apply_event(&json!({
            "content": {"action": "repair", "unit": {"unitId": "u1"}, "newHealth": 77}
        }))
        .unwrap();
        assert_eq!(game.unit("u1").unwrap().health, 77);

        game.apply_event(&json!({
            "content": {"action": "undeploy", "unit": {"unitId": "u1"}}
        }))
        .unwrap();
        assert!(!game.unit("u1").unwrap().deployed);
    }

    #[test]
    fn test_tile_at_scans_grid_coordinates() {
        let game = small_game();
        assert_eq!(game.tile_at(1, 0).unwrap().id, "t2");
        assert!(game.tile_at(9, 9).is_none());
    }

    #[test]
    fn test_missing_content_and_action_are_errors() {
        let mut game = small_game();
        assert!(matches!(
            game.apply_event(&json!({"other": 1})),
            Err(GameError::MissingContent)
        ));
        assert!(matches!(
            game.apply_event(&json!({"content": {"player": 1}})),
            Err(GameError::MissingAction)
        ));
    }
}
