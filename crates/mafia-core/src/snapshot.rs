//! Point-in-time copies of a game.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  channel::RenameMode,
  config::RolesConfig,
  log::{DayLog, NightLog},
  role::RoleKind,
  roster::Roster,
  state::State,
  timing::Timings,
};

/// A self-contained deep copy of a game. Owns all of its data, so it can be
/// handed to storage or inspected while the game keeps running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
  pub id:                Uuid,
  pub name:              Option<String>,
  pub state:             State,
  pub previous_state:    State,
  pub night_counter:     u32,
  pub roles_config:      Option<RolesConfig>,
  pub roster:            Roster,
  pub night_voting:      Option<RoleKind>,
  pub night_logs:        Vec<NightLog>,
  pub day_logs:          Vec<DayLog>,
  pub vote_ping:         usize,
  pub vote_for_yourself: bool,
  pub rename_mode:       RenameMode,
  pub timings:           Timings,
  pub started_at:        Option<DateTime<Utc>>,
  pub ended_at:          Option<DateTime<Utc>>,
}

impl GameSnapshot {
  pub fn to_json(&self) -> crate::Result<String> {
    Ok(serde_json::to_string(self)?)
  }

  pub fn from_json(json: &str) -> crate::Result<Self> {
    Ok(serde_json::from_str(json)?)
  }
}
