//! Players and the people behind them.
//!
//! A [`Participant`] is a platform account (tag, nicknames). A [`Player`] is a
//! participant who received an in-game ID and a role at initialisation; it is
//! created once and only ever mutated in place afterwards.

use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::role::RoleKind;

// ─── Identity ────────────────────────────────────────────────────────────────

/// In-game player ID. Small, positive, unique within a game and stable for the
/// player's lifetime.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl fmt::Display for PlayerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl FromStr for PlayerId {
  type Err = ParseIntError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    s.trim().parse().map(PlayerId)
  }
}

/// A platform account taking part in the game, as a player or a spectator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
  /// Account ID on the presentation platform.
  pub tag:         String,
  /// Server nickname, used for mentions.
  pub server_nick: String,
  /// Nickname before the game renamed the account.
  pub old_nick:    String,
  /// Current nickname.
  pub nick:        String,
}

impl Participant {
  pub fn new(
    tag: impl Into<String>,
    username: impl Into<String>,
    server_username: impl Into<String>,
  ) -> Self {
    let username = username.into();
    Self {
      tag:         tag.into(),
      server_nick: server_username.into(),
      old_nick:    username.clone(),
      nick:        username,
    }
  }
}

// ─── Statuses ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
  #[default]
  Alive,
  Dead,
  Spectating,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
  #[default]
  Passed,
  Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadReason {
  KilledAtNight,
  KilledByDayVoting,
}

// ─── Player ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
  pub id:                 PlayerId,
  #[serde(flatten)]
  pub participant:        Participant,
  pub role:               RoleKind,
  /// Every night vote this player is on record for, oldest first. `None` is
  /// an explicit "no target". Grows by one entry per night (two for two-vote
  /// roles) and stays index-aligned with the rest of the role's cohort.
  pub votes:              Vec<Option<PlayerId>>,
  /// Current day's vote; reset every day.
  pub day_vote:           Option<PlayerId>,
  pub life_status:        LifeStatus,
  pub interaction_status: InteractionStatus,
}

impl Player {
  pub fn new(id: PlayerId, participant: Participant, role: RoleKind) -> Self {
    Self {
      id,
      participant,
      role,
      votes: Vec::new(),
      day_vote: None,
      life_status: LifeStatus::Alive,
      interaction_status: InteractionStatus::Passed,
    }
  }

  pub fn is_alive(&self) -> bool { self.life_status == LifeStatus::Alive }

  pub fn is_muted(&self) -> bool {
    self.interaction_status == InteractionStatus::Muted
  }

  /// The entries recorded for the most recent night, or an empty slice if
  /// the player has not been on record yet.
  pub fn last_night_votes(&self) -> &[Option<PlayerId>] {
    let per_night = self.role.votes_per_night();
    let start = self.votes.len().saturating_sub(per_night);
    &self.votes[start..]
  }

  /// Targets chosen during the last `nights` nights. A history shorter than
  /// the window is clamped to what is available.
  pub fn recent_targets(
    &self,
    nights: usize,
  ) -> impl Iterator<Item = PlayerId> + '_ {
    let window = nights * self.role.votes_per_night();
    let start = self.votes.len().saturating_sub(window);
    self.votes[start..].iter().flatten().copied()
  }
}

/// A player who left the active partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadPlayer {
  #[serde(flatten)]
  pub player:     Player,
  pub reason:     DeadReason,
  pub lived_days: u32,
}
