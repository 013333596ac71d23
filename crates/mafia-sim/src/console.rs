//! Terminal stand-ins for the chat platform.

use mafia_core::channel::{MessageSink, RenameProvider, SinkError};

/// A channel that prints every message with its name as a prefix.
pub struct ConsoleChannel {
  name: String,
}

impl ConsoleChannel {
  pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }
}

impl MessageSink for ConsoleChannel {
  fn write(&self, message: &str) -> Result<(), SinkError> {
    for line in message.lines() {
      println!("[{}] {line}", self.name);
    }
    Ok(())
  }

  fn server_id(&self) -> &str { &self.name }
}

/// Logs renames instead of performing them.
pub struct ConsoleRename;

impl RenameProvider for ConsoleRename {
  fn rename(
    &self,
    channel: Option<&str>,
    tag: &str,
    nick: &str,
  ) -> Result<(), SinkError> {
    tracing::info!(channel = channel.unwrap_or("*"), tag, nick, "rename");
    Ok(())
  }
}
