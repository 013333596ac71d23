//! Vote ballots and the stateless vote validator.
//!
//! A ballot names its voter and target(s) the way the presentation layer
//! knows them: either a platform tag or an in-game ID, flagged per reference.
//! [`VoteContext`] resolves a ballot against a roster and returns either the
//! resolved vote or the first rule it breaks. Nothing here mutates state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  player::{Player, PlayerId},
  role::RoleKind,
  roster::Roster,
  state::State,
};

/// Target string meaning "no target".
pub const EMPTY_VOTE: &str = "-1";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Why a vote was rejected. The game is unchanged after any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteError {
  #[error("game is not started")]
  GameNotStarted,

  #[error("voting player not found")]
  VoterNotFound,

  #[error("voting player is not alive")]
  VoterNotAlive,

  #[error("voting player is muted")]
  VoterMuted,

  #[error("vote target not found")]
  IncorrectVoteTarget,

  #[error("vote target is not alive")]
  TargetNotAlive,

  #[error("incorrect vote time")]
  IncorrectVoteTime,

  #[error("it is not this role's turn to vote")]
  WrongVotingRole,

  #[error("ballot shape does not match the role")]
  WrongBallotShape,

  #[error("player already chose this target recently")]
  VotePing,

  #[error("cannot vote for yourself")]
  SelfVote,

  #[error("both votes must be either blank or not blank")]
  TwoVotesOneEmpty,

  #[error("votes are similar")]
  TwoVotesSimilar,

  #[error("voting is closed")]
  VotingClosed,
}

// ─── Ballots ─────────────────────────────────────────────────────────────────

/// A reference to a player: a platform tag when `is_server_id`, otherwise an
/// in-game ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
  pub id:           String,
  pub is_server_id: bool,
}

impl PlayerRef {
  pub fn server(tag: impl Into<String>) -> Self {
    Self {
      id:           tag.into(),
      is_server_id: true,
    }
  }

  pub fn in_game(id: PlayerId) -> Self {
    Self {
      id:           id.to_string(),
      is_server_id: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneVote {
  pub voter:               PlayerRef,
  /// Target reference, or [`EMPTY_VOTE`].
  pub target:              String,
  pub target_is_server_id: bool,
}

impl OneVote {
  pub fn new(voter: PlayerRef, target: Option<PlayerRef>) -> Self {
    match target {
      Some(target) => Self {
        voter,
        target: target.id,
        target_is_server_id: target.is_server_id,
      },
      None => Self::empty(voter),
    }
  }

  pub fn empty(voter: PlayerRef) -> Self {
    Self {
      voter,
      target: EMPTY_VOTE.to_owned(),
      target_is_server_id: false,
    }
  }

  pub fn is_empty(&self) -> bool { self.target == EMPTY_VOTE }
}

/// A ballot for roles that pick two players per night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoVote {
  pub voter:                  PlayerRef,
  pub first:                  String,
  pub second:                 String,
  pub targets_are_server_ids: bool,
}

impl TwoVote {
  pub fn new(voter: PlayerRef, targets: Option<(PlayerRef, PlayerRef)>) -> Self {
    match targets {
      Some((first, second)) => Self {
        voter,
        targets_are_server_ids: first.is_server_id,
        first: first.id,
        second: second.id,
      },
      None => Self {
        voter,
        first: EMPTY_VOTE.to_owned(),
        second: EMPTY_VOTE.to_owned(),
        targets_are_server_ids: false,
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ballot {
  One(OneVote),
  Two(TwoVote),
}

impl Ballot {
  pub fn voter(&self) -> &PlayerRef {
    match self {
      Self::One(vote) => &vote.voter,
      Self::Two(vote) => &vote.voter,
    }
  }
}

/// A ballot that passed validation, with every reference resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVote {
  pub voter:   PlayerId,
  pub role:    RoleKind,
  /// One entry per vote the role casts; `None` is an explicit "no target".
  pub targets: Vec<Option<PlayerId>>,
}

impl ResolvedVote {
  pub fn is_empty(&self) -> bool { self.targets.iter().all(Option::is_none) }
}

// ─── Validator ───────────────────────────────────────────────────────────────

/// Everything the validator reads. Borrowed from the game while its lock is
/// held.
#[derive(Debug, Clone, Copy)]
pub struct VoteContext<'a> {
  pub state:             State,
  /// Role whose night window is open, if any.
  pub night_voting:      Option<RoleKind>,
  pub roster:            &'a Roster,
  pub vote_ping:         usize,
  pub vote_for_yourself: bool,
}

impl<'a> VoteContext<'a> {
  /// Validate a single-target night vote.
  pub fn validate_night(&self, vote: &OneVote) -> Result<ResolvedVote, VoteError> {
    let voter = self.basic(&vote.voter)?;
    let target = self.target(&vote.target, vote.target_is_server_id)?;
    self.night_turn(voter)?;
    if voter.role.is_two_votes() {
      return Err(VoteError::WrongBallotShape);
    }
    if let Some(target) = target {
      self.not_self(voter, target)?;
      self.not_pinged(voter, target)?;
    }
    Ok(ResolvedVote {
      voter:   voter.id,
      role:    voter.role,
      targets: vec![target],
    })
  }

  /// Validate a two-target night vote.
  pub fn validate_night_two(
    &self,
    vote: &TwoVote,
  ) -> Result<ResolvedVote, VoteError> {
    let voter = self.basic(&vote.voter)?;
    let targets = match (vote.first == EMPTY_VOTE, vote.second == EMPTY_VOTE) {
      (true, true) => None,
      (true, false) | (false, true) => return Err(VoteError::TwoVotesOneEmpty),
      (false, false) => {
        if vote.first == vote.second {
          return Err(VoteError::TwoVotesSimilar);
        }
        let first = self.target(&vote.first, vote.targets_are_server_ids)?;
        let second = self.target(&vote.second, vote.targets_are_server_ids)?;
        match (first, second) {
          (Some(first), Some(second)) if first == second => {
            return Err(VoteError::TwoVotesSimilar);
          }
          (Some(first), Some(second)) => Some((first, second)),
          _ => return Err(VoteError::IncorrectVoteTarget),
        }
      }
    };
    self.night_turn(voter)?;
    if !voter.role.is_two_votes() {
      return Err(VoteError::WrongBallotShape);
    }
    let Some((first, second)) = targets else {
      return Ok(ResolvedVote {
        voter:   voter.id,
        role:    voter.role,
        targets: vec![None, None],
      });
    };
    for target in [first, second] {
      self.not_self(voter, target)?;
      self.not_pinged(voter, target)?;
    }
    Ok(ResolvedVote {
      voter:   voter.id,
      role:    voter.role,
      targets: vec![Some(first), Some(second)],
    })
  }

  /// Validate a day vote. Day votes are not subject to vote ping.
  pub fn validate_day(&self, vote: &OneVote) -> Result<ResolvedVote, VoteError> {
    let voter = self.basic(&vote.voter)?;
    let target = self.target(&vote.target, vote.target_is_server_id)?;
    if self.state != State::Day {
      return Err(VoteError::IncorrectVoteTime);
    }
    if let Some(target) = target {
      self.not_self(voter, target)?;
    }
    Ok(ResolvedVote {
      voter:   voter.id,
      role:    voter.role,
      targets: vec![target],
    })
  }

  // ── Checks ────────────────────────────────────────────────────────────────

  fn basic(&self, voter: &PlayerRef) -> Result<&'a Player, VoteError> {
    if !self.state.is_running() {
      return Err(VoteError::GameNotStarted);
    }
    let player = self
      .roster
      .search(&voter.id, voter.is_server_id)
      .ok_or(VoteError::VoterNotFound)?;
    if !player.is_alive() {
      return Err(VoteError::VoterNotAlive);
    }
    if player.is_muted() {
      return Err(VoteError::VoterMuted);
    }
    Ok(player)
  }

  /// Resolve a target reference. `Ok(None)` is the empty vote.
  fn target(
    &self,
    reference: &str,
    is_server_id: bool,
  ) -> Result<Option<PlayerId>, VoteError> {
    if reference == EMPTY_VOTE {
      return Ok(None);
    }
    let target = self
      .roster
      .search(reference, is_server_id)
      .ok_or(VoteError::IncorrectVoteTarget)?;
    if !target.is_alive() {
      return Err(VoteError::TargetNotAlive);
    }
    Ok(Some(target.id))
  }

  fn night_turn(&self, voter: &Player) -> Result<(), VoteError> {
    if self.state != State::Night {
      return Err(VoteError::IncorrectVoteTime);
    }
    match self.night_voting {
      None => Err(VoteError::VotingClosed),
      Some(role) if role != voter.role => Err(VoteError::WrongVotingRole),
      Some(_) => Ok(()),
    }
  }

  fn not_self(&self, voter: &Player, target: PlayerId) -> Result<(), VoteError> {
    if !self.vote_for_yourself && voter.id == target {
      return Err(VoteError::SelfVote);
    }
    Ok(())
  }

  fn not_pinged(&self, voter: &Player, target: PlayerId) -> Result<(), VoteError> {
    if voter.recent_targets(self.vote_ping).any(|t| t == target) {
      return Err(VoteError::VotePing);
    }
    Ok(())
  }
}
