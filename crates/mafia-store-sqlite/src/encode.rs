//! Encoding helpers between domain types and SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings and
//! structured values compact JSON.

use chrono::{DateTime, Utc};
use mafia_core::{role::Team, snapshot::GameSnapshot, state::State};
use uuid::Uuid;

use crate::{Error, Result};

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_state(state: State) -> Result<String> {
  // A bare JSON string; strip the quotes for a readable column.
  Ok(serde_json::to_string(&state)?.trim_matches('"').to_owned())
}

pub fn encode_team(team: Team) -> String { team.to_string().to_lowercase() }

/// A `games` row as read from SQLite, before decoding.
pub struct RawGame {
  pub game_id:       String,
  pub name:          Option<String>,
  pub created_at:    String,
  pub updated_at:    String,
  pub snapshot_json: String,
}

impl RawGame {
  pub fn decode_snapshot(&self) -> Result<GameSnapshot> {
    Ok(GameSnapshot::from_json(&self.snapshot_json)?)
  }
}
