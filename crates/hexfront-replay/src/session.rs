//! Recorded session files.
//!
//! A session file is everything the server sent over one connection, in
//! wire order: the ruleset, one full-state snapshot and the event stream.
//! Payloads stay as raw JSON values here; the replica decodes them at its
//! own boundary exactly as it would live traffic.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// One recorded game session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Ruleset payload served at bootstrap
    pub rules: Value,
    /// Full-state snapshot payload
    pub game_data: Value,
    /// Event payloads, in stream order
    #[serde(default)]
    pub events: Vec<Value>,
}

impl Session {
    /// Read and decode a session file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading session file {}", path.display()))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("decoding session file {}", path.display()))?;
        Ok(session)
    }
}
