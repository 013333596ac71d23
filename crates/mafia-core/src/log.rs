//! Per-phase logs. Each is produced once, appended to the game history and
//! never changed afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
  player::PlayerId,
  role::{RoleKind, Team},
  roster::Roster,
};

/// Outcome of one night.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightLog {
  pub number: u32,
  /// What each night-acting player is on record for this night: one entry,
  /// or two for two-vote roles.
  pub votes:  BTreeMap<PlayerId, Vec<Option<PlayerId>>>,
  /// Players this night killed.
  pub dead:   BTreeSet<PlayerId>,
}

impl NightLog {
  /// Assemble the log from the votes the night's windows collected, once
  /// every window has closed and every effect has run. Roles whose window
  /// never opened (the night was cut short) have no entry.
  ///
  /// # Panics
  ///
  /// Panics if a role window is still open.
  pub fn assemble(
    number: u32,
    night_voting: Option<RoleKind>,
    votes: BTreeMap<PlayerId, Vec<Option<PlayerId>>>,
    roster: &Roster,
  ) -> Self {
    assert!(
      night_voting.is_none(),
      "night log requested while {} is still voting",
      night_voting.map(|r| r.to_string()).unwrap_or_default(),
    );

    Self {
      number,
      votes,
      dead: roster.marked_dead(),
    }
  }
}

/// Outcome of one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayLog {
  pub number:  u32,
  /// Voter to chosen target.
  pub votes:   BTreeMap<PlayerId, PlayerId>,
  pub kicked:  Option<PlayerId>,
  pub is_skip: bool,
}

/// How the game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishLog {
  pub winner_team:  Option<Team>,
  pub is_fool:      bool,
  pub total_nights: u32,
}

impl FinishLog {
  /// # Panics
  ///
  /// Panics if `team` is not the roster's actual winner.
  pub fn for_team(roster: &Roster, team: Team, total_nights: u32) -> Self {
    let actual = roster.winner_team();
    assert_eq!(
      actual,
      Some(team),
      "{team} is not the winner team, the game can still turn around"
    );
    Self {
      winner_team: Some(team),
      is_fool: false,
      total_nights,
    }
  }

  /// # Panics
  ///
  /// Panics if the fool was not voted out.
  pub fn fool(roster: &Roster, total_nights: u32) -> Self {
    assert!(roster.fool_voted_out(), "fool was not voted out");
    Self {
      winner_team: None,
      is_fool: true,
      total_nights,
    }
  }

  /// Nobody is left alive.
  ///
  /// # Panics
  ///
  /// Panics if anyone is still alive.
  pub fn draw(roster: &Roster, total_nights: u32) -> Self {
    assert_eq!(roster.living_count(), 0, "draw declared with players alive");
    Self {
      winner_team: None,
      is_fool: false,
      total_nights,
    }
  }

  pub fn is_draw(&self) -> bool { self.winner_team.is_none() && !self.is_fool }
}
