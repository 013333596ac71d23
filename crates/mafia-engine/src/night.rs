//! The night orchestrator.
//!
//! Roles vote one at a time in global night vote order. Each role gets a
//! window bounded by the voting deadline; the first non-empty ballot closes
//! it early. The chosen target(s) are then copied into every cohort member's
//! history so the cohort stays index-aligned, urgent effects fire, and once
//! all windows are closed the deferred effects resolve.

use std::collections::BTreeSet;

use mafia_core::{
  log::NightLog,
  player::PlayerId,
  role::RoleKind,
  state::State,
  storage::GameStorage,
  vote::{OneVote, ResolvedVote, TwoVote, VoteError},
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{
  Game, effects, messenger,
  signal::SignalKind,
  timer::{self, Wake},
};

/// The one role window open right now.
#[derive(Debug)]
pub(crate) struct NightWindow {
  pub role:     RoleKind,
  /// Cohort members allowed to vote (alive and not muted).
  pub eligible: BTreeSet<PlayerId>,
  pub ballots:  Vec<ResolvedVote>,
  /// Fired once to end the wait early.
  pub accepted: Option<oneshot::Sender<()>>,
}

impl NightWindow {
  /// Record a ballot. A non-empty ballot ends the window, as does the last
  /// eligible voter abstaining.
  fn accept(&mut self, vote: ResolvedVote) {
    let decisive = !vote.is_empty();
    self.ballots.push(vote);
    let everyone_voted = self
      .eligible
      .iter()
      .all(|id| self.ballots.iter().any(|b| b.voter == *id));
    if (decisive || everyone_voted)
      && let Some(accepted) = self.accepted.take()
    {
      let _ = accepted.send(());
    }
  }

  /// The target(s) the whole cohort goes on record for: the first non-empty
  /// ballot, or an explicit "no target" from the first cohort member.
  fn designate(
    &self,
    cohort: &[PlayerId],
  ) -> Option<(PlayerId, Vec<Option<PlayerId>>)> {
    if let Some(ballot) = self.ballots.iter().find(|b| !b.is_empty()) {
      return Some((ballot.voter, ballot.targets.clone()));
    }
    let first = *cohort.first()?;
    Some((first, vec![None; self.role.votes_per_night()]))
  }
}

impl<S: GameStorage> Game<S> {
  // ── Vote submission ───────────────────────────────────────────────────────

  /// Submit a single-target night vote for the role whose window is open.
  pub async fn set_night_vote(&self, vote: OneVote) -> Result<(), VoteError> {
    let mut guard = self.inner.write().await;
    let inner = &mut *guard;
    let resolved = self.vote_context(inner).validate_night(&vote)?;
    tracing::debug!(voter = %resolved.voter, targets = ?resolved.targets, "night vote accepted");
    inner
      .night_voting
      .as_mut()
      .ok_or(VoteError::VotingClosed)?
      .accept(resolved);
    Ok(())
  }

  /// Submit a two-target night vote.
  pub async fn set_night_two_vote(&self, vote: TwoVote) -> Result<(), VoteError> {
    let mut guard = self.inner.write().await;
    let inner = &mut *guard;
    let resolved = self.vote_context(inner).validate_night_two(&vote)?;
    tracing::debug!(voter = %resolved.voter, targets = ?resolved.targets, "night two-vote accepted");
    inner
      .night_voting
      .as_mut()
      .ok_or(VoteError::VotingClosed)?
      .accept(resolved);
    Ok(())
  }

  // ── Orchestration ─────────────────────────────────────────────────────────

  /// Run one night. On cancellation the remaining windows and the deferred
  /// effects are skipped; the log holds whatever was collected.
  pub(crate) async fn night(&self, cancel: &CancellationToken) -> NightLog {
    let (order, number) = {
      let mut guard = self.inner.write().await;
      let inner = &mut *guard;
      inner.night_counter += 1;
      inner.night_votes.clear();
      self.set_state(inner, State::Night);
      let order = inner
        .roles_config
        .as_ref()
        .map(|config| config.get_order_to_vote())
        .unwrap_or_default();
      (order, inner.night_counter)
    };
    self.announce(messenger::night_started(number)).await;

    for role in order.iter().copied() {
      if cancel.is_cancelled() {
        break;
      }
      self.role_window(role, cancel).await;
    }

    let mut guard = self.inner.write().await;
    let inner = &mut *guard;
    self.signals.emit(SignalKind::SwitchVotingRole { role: None });
    if !cancel.is_cancelled() {
      let killed = effects::apply_deferred(&order, &mut inner.roster);
      tracing::info!(night = number, ?killed, "night effects resolved");
    }
    let log = NightLog::assemble(
      number,
      inner.night_voting.as_ref().map(|w| w.role),
      std::mem::take(&mut inner.night_votes),
      &inner.roster,
    );
    inner.night_logs.push(log.clone());
    log
  }

  /// Open, wait on and close one role's window.
  async fn role_window(&self, role: RoleKind, cancel: &CancellationToken) {
    let timings = &self.options.timings;

    let (accepted, cohort, invite) = {
      let mut guard = self.inner.write().await;
      let inner = &mut *guard;
      let cohort: Vec<PlayerId> =
        inner.roster.living_with_role(role).map(|p| p.id).collect();
      let eligible: BTreeSet<PlayerId> = inner
        .roster
        .living_with_role(role)
        .filter(|p| !p.is_muted())
        .map(|p| p.id)
        .collect();
      let invite = (!eligible.is_empty()).then(|| {
        messenger::invite(role, inner.roster.living(), timings.voting_deadline())
      });

      let (sender, receiver) = oneshot::channel();
      inner.night_voting = Some(NightWindow {
        role,
        eligible,
        ballots: Vec::new(),
        accepted: Some(sender),
      });
      self.signals.emit(SignalKind::SwitchVotingRole { role: Some(role) });
      (receiver, cohort, invite)
    };
    tracing::info!(%role, cohort = cohort.len(), "night window opened");

    let wake = match invite {
      Some(invite) => {
        self.announce_role(role, invite).await;
        timer::window(accepted, timings.voting_deadline(), cancel).await
      }
      None => {
        // No eligible voters: hold a fake window of random length.
        let fake = timings.fake_voting_duration(&mut rand::thread_rng());
        tracing::debug!(%role, ?fake, "no eligible voters");
        timer::sleep(fake, cancel).await
      }
    };

    let reveal = {
      let mut guard = self.inner.write().await;
      let inner = &mut *guard;
      let Some(window) = inner.night_voting.take() else {
        return;
      };
      let Some((voter, targets)) = window.designate(&cohort) else {
        return;
      };
      for id in &cohort {
        if let Some(player) = inner.roster.get_mut(*id) {
          player.votes.extend_from_slice(&targets);
          inner.night_votes.insert(*id, targets.clone());
        }
      }
      tracing::debug!(%role, %voter, ?targets, "cohort vote recorded");
      if wake == Wake::Cancelled {
        return;
      }
      effects::apply_urgent(role, &targets, &mut inner.roster)
    };
    if let Some(reveal) = reveal {
      self.announce_role(role, reveal).await;
    }
  }
}
