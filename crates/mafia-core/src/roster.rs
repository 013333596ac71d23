//! The roster: every participant of a game, partitioned by life status.
//!
//! A player sits in exactly one partition at a time and moves between them
//! only through [`Roster::to_dead`].

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  config::{MAX_PLAYERS, RolesConfig},
  player::{
    DeadPlayer, DeadReason, InteractionStatus, LifeStatus, Participant,
    Player, PlayerId,
  },
  role::{RoleKind, Team},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
  /// Everyone registered to play, in registration order.
  pub start_players: Vec<Participant>,
  /// Players still in the game, keyed by in-game ID.
  pub active:        BTreeMap<PlayerId, Player>,
  pub dead:          Vec<DeadPlayer>,
  /// Participants watching without playing.
  pub spectators:    Vec<Participant>,
}

impl Roster {
  /// Deal shuffled roles to the registered participants. IDs run from 1 in
  /// registration order.
  pub fn deal<R: Rng + ?Sized>(
    start_players: Vec<Participant>,
    spectators: Vec<Participant>,
    config: &RolesConfig,
    rng: &mut R,
  ) -> Result<Self> {
    if start_players.len() != config.players_count {
      return Err(Error::PlayersCountMismatch {
        expected: config.players_count,
        actual:   start_players.len(),
      });
    }
    if start_players.len() > MAX_PLAYERS {
      return Err(Error::TooManyPlayers {
        max:    MAX_PLAYERS,
        actual: start_players.len(),
      });
    }
    let roles = config.get_shuffled_roles_config(rng);
    let active = start_players
      .iter()
      .cloned()
      .zip(roles)
      .enumerate()
      .map(|(index, (participant, role))| {
        // At most MAX_PLAYERS entries, so the ID fits.
        let id = PlayerId(index as u8 + 1);
        (id, Player::new(id, participant, role))
      })
      .collect();

    Ok(Self {
      start_players,
      active,
      dead: Vec::new(),
      spectators,
    })
  }

  // ── Lookup ────────────────────────────────────────────────────────────────

  pub fn get(&self, id: PlayerId) -> Option<&Player> { self.active.get(&id) }

  pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
    self.active.get_mut(&id)
  }

  /// Resolve a player reference as supplied by the presentation layer:
  /// either a platform tag or an in-game ID.
  pub fn search(&self, reference: &str, is_server_id: bool) -> Option<&Player> {
    if is_server_id {
      self.active.values().find(|p| p.participant.tag == reference)
    } else {
      reference.parse().ok().and_then(|id| self.get(id))
    }
  }

  /// Living players currently holding `role`, ordered by ID.
  pub fn living_with_role(
    &self,
    role: RoleKind,
  ) -> impl Iterator<Item = &Player> + '_ {
    self.living().filter(move |p| p.role == role)
  }

  pub fn living(&self) -> impl Iterator<Item = &Player> + '_ {
    self.active.values().filter(|p| p.is_alive())
  }

  pub fn living_count(&self) -> usize { self.living().count() }

  pub fn living_team_count(&self, team: Team) -> usize {
    self.living().filter(|p| p.role.team() == team).count()
  }

  pub fn dead_count(&self) -> usize { self.dead.len() }

  pub fn find_dead(&self, id: PlayerId) -> Option<&DeadPlayer> {
    self.dead.iter().find(|d| d.player.id == id)
  }

  /// Players the current night marked dead but who have not been moved out
  /// of the active partition yet.
  pub fn marked_dead(&self) -> BTreeSet<PlayerId> {
    self
      .active
      .values()
      .filter(|p| p.life_status == LifeStatus::Dead)
      .map(|p| p.id)
      .collect()
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Move a player from the active partition to the dead one. Returns `None`
  /// if no active player has that ID.
  pub fn to_dead(
    &mut self,
    id: PlayerId,
    reason: DeadReason,
    lived_days: u32,
  ) -> Option<&DeadPlayer> {
    let mut player = self.active.remove(&id)?;
    player.life_status = LifeStatus::Dead;
    player.interaction_status = InteractionStatus::Passed;
    self.dead.push(DeadPlayer {
      player,
      reason,
      lived_days,
    });
    self.dead.last()
  }

  /// Mark the given dead players as spectators of the rest of the game.
  pub fn dead_to_spectating(&mut self, ids: &BTreeSet<PlayerId>) {
    for dead in self.dead.iter_mut().filter(|d| ids.contains(&d.player.id)) {
      dead.player.life_status = LifeStatus::Spectating;
    }
  }

  pub fn reset_interaction_statuses(&mut self) {
    for player in self.active.values_mut() {
      player.interaction_status = InteractionStatus::Passed;
    }
  }

  pub fn clear_day_votes(&mut self) {
    for player in self.active.values_mut() {
      player.day_vote = None;
    }
  }

  // ── Win evaluation ────────────────────────────────────────────────────────

  /// The team every living player belongs to, if there is exactly one.
  /// A roster split across teams, or with nobody alive, has no winner.
  pub fn winner_team(&self) -> Option<Team> {
    let mut teams = self.living().map(|p| p.role.team());
    let first = teams.next()?;
    teams.all(|team| team == first).then_some(first)
  }

  /// Whether the fool was eliminated by the day vote.
  pub fn fool_voted_out(&self) -> bool {
    self.dead.iter().any(|d| {
      d.player.role == RoleKind::Fool && d.reason == DeadReason::KilledByDayVoting
    })
  }
}
