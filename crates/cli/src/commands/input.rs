//! Reading conversation snapshots from disk.

use ctxweave_core::{InitialState, Message};
use serde::Deserialize;
use std::path::Path;

/// Accepted input shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Messages(Vec<Message>),
    State(Box<InitialState>),
}

/// Parse a snapshot: either a full initial state or a bare message array.
pub fn parse_state(json: &str) -> Result<InitialState, serde_json::Error> {
    Ok(match serde_json::from_str(json)? {
        Snapshot::Messages(messages) => InitialState::from_messages(messages),
        Snapshot::State(state) => *state,
    })
}

pub fn load_state(path: &Path) -> Result<InitialState, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let state =
        parse_state(&raw).map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
    Ok(state)
}
