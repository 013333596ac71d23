//! Error types for `mafia-core`.

use thiserror::Error;

use crate::role::RoleKind;

/// Configuration errors. Raised at initialisation; any of them aborts startup.
#[derive(Debug, Error)]
pub enum Error {
  #[error("empty roles config")]
  EmptyConfig,

  #[error("config expects {expected} players, got {actual}")]
  PlayersCountMismatch { expected: usize, actual: usize },

  #[error("at most {max} players fit in one game, got {actual}")]
  TooManyPlayers { max: usize, actual: usize },

  #[error("config role counts sum to {sum}, expected {expected}")]
  RoleCountMismatch { expected: usize, sum: usize },

  #[error("roles {0} and {1} share the same night vote order")]
  DuplicateNightVoteOrder(RoleKind, RoleKind),

  #[error("no role channel registered for {0}")]
  MissingRoleChannel(RoleKind),

  #[error("role channel for {0} is already registered")]
  DuplicateRoleChannel(RoleKind),

  #[error("no main channel registered")]
  MissingMainChannel,

  #[error("rename mode requires a rename provider")]
  MissingRenameProvider,

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
