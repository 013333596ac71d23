//! Bounded waits. Every wait in the game ends on a deadline or on
//! cancellation; voting windows can also end early when a vote is accepted.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Why a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
  Accepted,
  Deadline,
  Cancelled,
}

/// Wait for `duration`, or less if `cancel` fires.
pub async fn sleep(duration: Duration, cancel: &CancellationToken) -> Wake {
  tokio::select! {
    _ = cancel.cancelled() => Wake::Cancelled,
    _ = tokio::time::sleep(duration) => Wake::Deadline,
  }
}

/// Hold a voting window open until a vote is accepted, the deadline passes or
/// the game is cancelled. Exactly one of the three ends the wait.
pub async fn window(
  accepted: oneshot::Receiver<()>,
  deadline: Duration,
  cancel: &CancellationToken,
) -> Wake {
  let wake = tokio::select! {
    biased;
    _ = cancel.cancelled() => Wake::Cancelled,
    Ok(()) = accepted => Wake::Accepted,
    _ = tokio::time::sleep(deadline) => Wake::Deadline,
  };
  tracing::debug!(?wake, "voting window closed");
  wake
}
