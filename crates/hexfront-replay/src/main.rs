//! Hexfront session replay tool.
//!
//! Feeds a recorded session (ruleset, snapshot, event stream) through the
//! client replica exactly as a live transport would, logging every
//! notification and the final state. Useful for inspecting recorded games
//! and for checking that a session still applies cleanly.

use anyhow::{bail, Context};
use hexfront_core::{Game, GameEvent};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod session;

use session::Session;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        bail!("usage: hexfront-replay <session.json>");
    };

    let session = Session::from_file(&path)?;
    info!(
        path = %path.display(),
        events = session.events.len(),
        "replaying session"
    );

    let mut game = Game::new();
    game.load_rules(&session.rules).context("loading ruleset")?;
    game.subscribe(|event: &GameEvent| info!(event = event.kind(), "notified"));
    game.load_snapshot(&session.game_data)
        .context("loading snapshot")?;
    game.apply_events(&session.events)
        .context("applying event stream")?;

    info!(
        game = game.game_id(),
        name = game.name(),
        state = ?game.state(),
        turn = game.turn_number(),
        round = game.round_number(),
        in_turn = game.in_turn_number(),
        tiles = game.tiles().len(),
        units = game.units().len(),
        players = game.players().len(),
        "replay complete"
    );

    Ok(())
}
