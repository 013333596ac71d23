//! Error type for `mafia-engine`.

use mafia_core::channel::SinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("config error: {0}")]
  Config(#[from] mafia_core::Error),

  #[error("delivery error: {0}")]
  Delivery(#[from] SinkError),

  #[error("storage error: {0}")]
  Storage(Box<dyn std::error::Error + Send + Sync>),

  #[error("game is already started")]
  AlreadyStarted,

  #[error("game is not initialised")]
  NotInitialised,

  #[error("game task panicked: {0}")]
  Panicked(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
