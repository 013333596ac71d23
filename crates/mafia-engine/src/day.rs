//! The day orchestrator and its tally.

use std::collections::BTreeMap;

use mafia_core::{
  log::DayLog,
  player::PlayerId,
  state::State,
  storage::GameStorage,
  timing::calculate_day_deadline,
  vote::{OneVote, VoteError},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Game, messenger};

/// A committed day vote on its way to the tally.
pub(crate) type DayBallot = (PlayerId, Option<PlayerId>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DayOutcome {
  Kick(PlayerId),
  Skip,
}

/// Running count of the day's votes.
///
/// A target reaching the threshold is kicked at once. Once every living
/// player has voted without that happening, the plurality decides, and a tie
/// among the leaders kicks nobody.
#[derive(Debug)]
pub(crate) struct DayTally {
  votes:     BTreeMap<PlayerId, Option<PlayerId>>,
  counts:    BTreeMap<PlayerId, usize>,
  living:    usize,
  threshold: usize,
}

impl DayTally {
  pub fn new(living: usize, threshold: usize) -> Self {
    Self {
      votes: BTreeMap::new(),
      counts: BTreeMap::new(),
      living,
      threshold: threshold.max(1),
    }
  }

  /// Count a vote, replacing the voter's previous one. Returns the outcome
  /// once the vote is decided.
  pub fn record(
    &mut self,
    voter: PlayerId,
    target: Option<PlayerId>,
  ) -> Option<DayOutcome> {
    if let Some(Some(previous)) = self.votes.insert(voter, target)
      && let Some(count) = self.counts.get_mut(&previous)
    {
      *count -= 1;
      if *count == 0 {
        self.counts.remove(&previous);
      }
    }

    if let Some(target) = target {
      let count = self.counts.entry(target).or_default();
      *count += 1;
      if *count >= self.threshold {
        return Some(DayOutcome::Kick(target));
      }
    }

    (self.votes.len() >= self.living).then(|| self.plurality())
  }

  fn plurality(&self) -> DayOutcome {
    let Some(max) = self.counts.values().max().copied() else {
      return DayOutcome::Skip;
    };
    let mut leaders = self.counts.iter().filter(|(_, count)| **count == max);
    match (leaders.next(), leaders.next()) {
      (Some((target, _)), None) => DayOutcome::Kick(*target),
      _ => DayOutcome::Skip,
    }
  }

  pub fn into_log(self, number: u32, outcome: DayOutcome) -> DayLog {
    let kicked = match outcome {
      DayOutcome::Kick(id) => Some(id),
      DayOutcome::Skip => None,
    };
    DayLog {
      number,
      votes: self
        .votes
        .into_iter()
        .filter_map(|(voter, target)| Some((voter, target?)))
        .collect(),
      kicked,
      is_skip: kicked.is_none(),
    }
  }
}

impl<S: GameStorage> Game<S> {
  /// Submit a day vote.
  pub async fn set_day_vote(&self, vote: OneVote) -> Result<(), VoteError> {
    let mut guard = self.inner.write().await;
    let inner = &mut *guard;
    let resolved = self.vote_context(inner).validate_day(&vote)?;
    let target = resolved.targets.first().copied().flatten();
    inner
      .day_voting
      .as_ref()
      .ok_or(VoteError::VotingClosed)?
      .send((resolved.voter, target))
      .map_err(|_| VoteError::VotingClosed)?;
    if let Some(player) = inner.roster.get_mut(resolved.voter) {
      player.day_vote = target;
    }
    tracing::debug!(voter = %resolved.voter, ?target, "day vote accepted");
    Ok(())
  }

  /// Run one day vote. Ends on an early quorum, once everybody voted, on the
  /// deadline (a skip) or on cancellation (also a skip).
  pub(crate) async fn day(&self, cancel: &CancellationToken) -> DayLog {
    let timings = &self.options.timings;
    let (mut ballots, number, deadline, threshold, living) = {
      let mut guard = self.inner.write().await;
      let inner = &mut *guard;
      inner.roster.clear_day_votes();
      let (sender, receiver) = mpsc::unbounded_channel();
      inner.day_voting = Some(sender);
      self.set_state(inner, State::Day);

      let living = inner.roster.living_count();
      let deadline = calculate_day_deadline(
        inner.night_counter,
        inner.roster.dead_count(),
        inner.roster.start_players.len(),
      );
      let threshold = timings.break_down_day_players_count(living);
      (receiver, inner.night_counter, deadline, threshold, living)
    };
    self
      .announce(messenger::day_started(number, deadline, threshold))
      .await;

    let mut tally = DayTally::new(living, threshold);
    let timeout = tokio::time::sleep(deadline);
    tokio::pin!(timeout);
    let outcome = loop {
      tokio::select! {
        _ = cancel.cancelled() => break DayOutcome::Skip,
        _ = &mut timeout => {
          tracing::debug!(day = number, "day deadline passed");
          break DayOutcome::Skip;
        }
        Some((voter, target)) = ballots.recv() => {
          if let Some(outcome) = tally.record(voter, target) {
            break outcome;
          }
        }
      }
    };
    tracing::info!(day = number, ?outcome, "day vote closed");

    let mut inner = self.inner.write().await;
    inner.day_voting = None;
    let log = tally.into_log(number, outcome);
    inner.day_logs.push(log.clone());
    log
  }
}
