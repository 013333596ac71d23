//! Roles configuration: which roles play, and how many of each.

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  role::{RoleKind, Team},
};

/// Largest table a game can seat: in-game IDs are a single byte from 1.
pub const MAX_PLAYERS: usize = u8::MAX as usize;

/// A role combination for a fixed number of players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesConfig {
  pub players_count: usize,
  /// Count of players per role.
  pub roles:         BTreeMap<RoleKind, usize>,
}

impl RolesConfig {
  pub fn new(
    players_count: usize,
    roles: impl IntoIterator<Item = (RoleKind, usize)>,
  ) -> Self {
    Self {
      players_count,
      roles: roles.into_iter().filter(|(_, count)| *count > 0).collect(),
    }
  }

  /// Reject configurations the engine cannot run: empty or oversized ones,
  /// counts that do not add up, and two night roles competing for the same
  /// vote order.
  pub fn validate(&self) -> Result<()> {
    if self.roles.is_empty() || self.players_count == 0 {
      return Err(Error::EmptyConfig);
    }
    if self.players_count > MAX_PLAYERS {
      return Err(Error::TooManyPlayers {
        max:    MAX_PLAYERS,
        actual: self.players_count,
      });
    }
    let sum: usize = self.roles.values().sum();
    if sum != self.players_count {
      return Err(Error::RoleCountMismatch {
        expected: self.players_count,
        sum,
      });
    }
    let mut seen: BTreeMap<u8, RoleKind> = BTreeMap::new();
    for kind in self.roles.keys().copied() {
      let Some(order) = kind.night_vote_order() else {
        continue;
      };
      if let Some(other) = seen.insert(order, kind) {
        return Err(Error::DuplicateNightVoteOrder(other, kind));
      }
    }
    Ok(())
  }

  /// One role per player, shuffled. Per-role counts are preserved.
  pub fn get_shuffled_roles_config<R: Rng + ?Sized>(
    &self,
    rng: &mut R,
  ) -> Vec<RoleKind> {
    let mut roles: Vec<RoleKind> = self
      .roles
      .iter()
      .flat_map(|(kind, count)| std::iter::repeat_n(*kind, *count))
      .collect();
    roles.shuffle(rng);
    roles
  }

  /// Roles that act at night, ascending by night vote order. Ties (rejected
  /// by [`validate`](Self::validate)) fall back to catalog order.
  pub fn get_order_to_vote(&self) -> Vec<RoleKind> {
    let mut order: Vec<RoleKind> = self
      .roles
      .keys()
      .copied()
      .filter(|kind| kind.acts_at_night())
      .collect();
    order.sort_by_key(|kind| (kind.night_vote_order(), *kind));
    order
  }

  pub fn teams(&self) -> Vec<Team> {
    self
      .roles
      .keys()
      .map(|kind| kind.team())
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  pub fn players_count_by_team(&self, team: Team) -> usize {
    self
      .roles
      .iter()
      .filter(|(kind, _)| kind.team() == team)
      .map(|(_, count)| count)
      .sum()
  }

  pub fn has_role(&self, kind: RoleKind) -> bool {
    self.roles.contains_key(&kind)
  }

  /// Built-in combinations for `players_count` players.
  pub fn presets(players_count: usize) -> Vec<RolesConfig> {
    use RoleKind::*;

    let combos: &[&[(RoleKind, usize)]] = match players_count {
      5 => &[
        &[(Peaceful, 3), (Doctor, 1), (Mafia, 1)],
        &[(Peaceful, 4), (Mafia, 1)],
      ],
      6 => &[
        &[(Peaceful, 4), (Doctor, 1), (Mafia, 1)],
        &[(Peaceful, 4), (Detective, 1), (Mafia, 1)],
        &[(Peaceful, 4), (Whore, 1), (Mafia, 1)],
      ],
      7 => &[
        &[(Peaceful, 4), (Doctor, 1), (Mafia, 1), (Don, 1)],
        &[(Peaceful, 4), (Detective, 1), (Mafia, 1), (Don, 1)],
        &[(Peaceful, 3), (Doctor, 1), (Detective, 1), (Mafia, 1), (Don, 1)],
        &[(Peaceful, 3), (Doctor, 1), (Whore, 1), (Mafia, 1), (Don, 1)],
      ],
      8 => &[
        &[(Peaceful, 3), (Doctor, 1), (Detective, 1), (Mafia, 1), (Don, 1), (Fool, 1)],
        &[(Peaceful, 3), (Doctor, 1), (Whore, 1), (Mafia, 1), (Don, 1), (Maniac, 1)],
      ],
      9 => &[&[
        (Peaceful, 2),
        (Doctor, 1),
        (Whore, 1),
        (Detective, 1),
        (Citizen, 1),
        (Mafia, 1),
        (Don, 1),
        (Maniac, 1),
      ]],
      _ => &[],
    };

    combos
      .iter()
      .map(|combo| RolesConfig::new(players_count, combo.iter().copied()))
      .collect()
  }

  pub fn preset(players_count: usize, index: usize) -> Option<RolesConfig> {
    Self::presets(players_count).into_iter().nth(index)
  }
}
