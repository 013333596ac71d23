//! Game phases and their legal order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a game. Transitions are linear except Night and Day, which
/// alternate until a winner is known; Finish is terminal.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum State {
  #[default]
  NonDefined,
  Register,
  Init,
  Starting,
  Night,
  Day,
  Finish,
}

impl State {
  /// The state the automatic progression moves to next, or `None` from
  /// Finish.
  pub fn next(self) -> Option<State> {
    match self {
      Self::NonDefined => Some(Self::Register),
      Self::Register => Some(Self::Init),
      Self::Init => Some(Self::Starting),
      Self::Starting => Some(Self::Night),
      Self::Night => Some(Self::Day),
      Self::Day => Some(Self::Night),
      Self::Finish => None,
    }
  }

  pub fn is_running(self) -> bool { matches!(self, Self::Night | Self::Day) }

  pub fn is_finished(self) -> bool { self == Self::Finish }
}

impl fmt::Display for State {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Self::NonDefined => "is full raw (nothing is known)",
      Self::Register => "is waiting for registration",
      Self::Init => "is being initialised",
      Self::Starting => "is prepared for starting",
      Self::Night => "is in night state",
      Self::Day => "is in day state",
      Self::Finish => "is finished",
    };
    f.write_str(text)
  }
}
