//! The outbound signal bus.
//!
//! One producer (the game), any number of subscribers. The bus has an
//! explicit closed state: after a fatal signal or the finish signal nothing
//! more is sent, and every subscriber sees the stream end once it has
//! drained what was already queued.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use mafia_core::{role::RoleKind, state::State};
use tokio::sync::broadcast;

use crate::Error;

const CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Signal {
  pub at:   DateTime<Utc>,
  pub kind: SignalKind,
}

#[derive(Debug, Clone)]
pub enum SignalKind {
  SwitchState {
    night_counter: u32,
    previous:      State,
    new:           State,
  },
  /// A night role window opened (`Some`) or the night's voting ended
  /// (`None`).
  SwitchVotingRole { role: Option<RoleKind> },
  Finish,
  Error(Arc<Error>),
  /// Closes the bus.
  Fatal(Arc<Error>),
}

impl Signal {
  pub fn now(kind: SignalKind) -> Self {
    Self {
      at: Utc::now(),
      kind,
    }
  }
}

#[derive(Debug)]
pub(crate) struct SignalBus {
  sender: Mutex<Option<broadcast::Sender<Signal>>>,
}

impl SignalBus {
  pub fn new() -> Self {
    let (sender, _) = broadcast::channel(CAPACITY);
    Self {
      sender: Mutex::new(Some(sender)),
    }
  }

  /// A new receiver. Subscribing to a closed bus yields a stream that is
  /// already over.
  pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
    match self.lock().as_ref() {
      Some(sender) => sender.subscribe(),
      None => broadcast::channel(1).1,
    }
  }

  pub fn emit(&self, kind: SignalKind) {
    if let Some(sender) = self.lock().as_ref() {
      // No subscribers is fine.
      let _ = sender.send(Signal::now(kind));
    }
  }

  pub fn error(&self, error: impl Into<Error>) {
    let error = error.into();
    tracing::warn!(%error, "game error");
    self.emit(SignalKind::Error(Arc::new(error)));
  }

  pub fn fatal(&self, error: impl Into<Error>) {
    let error = error.into();
    tracing::error!(%error, "fatal game error");
    self.emit(SignalKind::Fatal(Arc::new(error)));
    self.close();
  }

  pub fn close(&self) { self.lock().take(); }

  pub fn is_closed(&self) -> bool { self.lock().is_none() }

  fn lock(
    &self,
  ) -> std::sync::MutexGuard<'_, Option<broadcast::Sender<Signal>>> {
    // A panic while holding this lock cannot leave the sender half-updated.
    self.sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}
