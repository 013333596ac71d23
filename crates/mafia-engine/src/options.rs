//! Game-wide options.

use mafia_core::{channel::RenameMode, timing::Timings};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
  /// How many of a player's most recent nights block re-choosing a target.
  pub vote_ping:         usize,
  pub vote_for_yourself: bool,
  pub rename_mode:       RenameMode,
  pub timings:           Timings,
}

impl Default for GameOptions {
  fn default() -> Self {
    Self {
      vote_ping:         1,
      vote_for_yourself: false,
      rename_mode:       RenameMode::NotRename,
      timings:           Timings::default(),
    }
  }
}
