//! Interfaces to the presentation layer: where messages go and how
//! participants are relabelled. Implemented by the host, called by the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A delivery or relabelling failure. Never aborts a round; the engine
/// forwards it as an error signal.
#[derive(Debug, Error)]
pub enum SinkError {
  #[error("write to channel {channel} failed: {reason}")]
  Write { channel: String, reason: String },

  #[error("rename of {tag} failed: {reason}")]
  Rename { tag: String, reason: String },
}

/// A logical channel the engine writes announcements to: the main chat or one
/// role's private chat.
pub trait MessageSink: Send + Sync {
  fn write(&self, message: &str) -> Result<(), SinkError>;

  /// The channel's ID on the presentation platform.
  fn server_id(&self) -> &str;
}

/// Relabels a participant on the platform.
pub trait RenameProvider: Send + Sync {
  /// Give `tag` the nickname `nick`. `channel` scopes the rename to one
  /// channel; `None` renames across the whole server.
  fn rename(
    &self,
    channel: Option<&str>,
    tag: &str,
    nick: &str,
  ) -> Result<(), SinkError>;
}

/// Where participants are renamed when the game starts (and renamed back when
/// it ends).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RenameMode {
  #[default]
  NotRename,
  InGuild,
  OnlyInMainChannel,
  InAllChannels,
}

/// Nickname a player carries during the game.
pub fn in_game_nick(id: crate::player::PlayerId, nick: &str) -> String {
  format!("{id}. {nick}")
}

pub fn spectator_nick(nick: &str) -> String { format!("(spectator) {nick}") }
