//! The game loop and the finish paths.

use std::{any::Any, sync::Arc};

use chrono::Utc;
use mafia_core::{
  log::{DayLog, FinishLog, NightLog},
  player::DeadReason,
  role::RoleKind,
  state::State,
  storage::GameStorage,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
  Error, Game, messenger, reincarnation,
  signal::SignalKind,
  timer::{self, Wake},
};

impl<S: GameStorage + 'static> Game<S> {
  /// Start the game loop on its own task.
  ///
  /// The returned handle resolves to the finish log, or `None` if the game
  /// was stopped (cancelled, failed or never started). A panic in the loop is
  /// caught here and turned into an error signal followed by the
  /// finish-anyway path.
  pub fn run(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<Option<FinishLog>> {
    let game = Arc::clone(self);
    tokio::spawn(async move {
      if let Err(error) = game.claim_run().await {
        game.signals.fatal(error);
        return None;
      }

      let play = tokio::spawn(Arc::clone(&game).play(cancel));
      match play.await {
        Ok(outcome) => outcome,
        Err(join) => {
          let message = if join.is_panic() {
            panic_message(join.into_panic())
          } else {
            "game task was aborted".to_owned()
          };
          game.signals.error(Error::Panicked(message));
          game.finish_anyway().await
        }
      }
    })
  }

  async fn claim_run(&self) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    if inner.running || inner.state.is_running() || inner.state.is_finished() {
      return Err(Error::AlreadyStarted);
    }
    if inner.state != State::Starting {
      return Err(Error::NotInitialised);
    }
    inner.running = true;
    Ok(())
  }

  async fn play(self: Arc<Self>, cancel: CancellationToken) -> Option<FinishLog> {
    let timings = &self.options.timings;
    if let Some(config) = self.roles_config().await {
      self
        .announce(messenger::start(&config, timings.role_info()))
        .await;
    }
    if timer::sleep(timings.role_info(), &cancel).await == Wake::Cancelled {
      return self.finish_anyway().await;
    }

    loop {
      let night = self.night(&cancel).await;
      if cancel.is_cancelled() {
        return self.finish_anyway().await;
      }
      self.affect_night(&night, &cancel).await;
      self.save_night_log(night).await;
      if let Some(log) = self.check_finish().await {
        return self.finish_by_log(log).await;
      }

      let day = self.day(&cancel).await;
      if cancel.is_cancelled() {
        return self.finish_anyway().await;
      }
      self.affect_day(&day).await;
      self.save_day_log(day).await;
      if let Some(log) = self.check_finish().await {
        return self.finish_by_log(log).await;
      }
    }
  }

  // ── Phase aftermath ───────────────────────────────────────────────────────

  /// Apply a night's outcome: lift mutes, move the killed to the dead,
  /// promote roles, announce. The newly dead become spectators after their
  /// last word, unless the game has finished by then.
  async fn affect_night(self: &Arc<Self>, log: &NightLog, cancel: &CancellationToken) {
    let (message, promoted) = {
      let mut guard = self.inner.write().await;
      let inner = &mut *guard;
      let night = inner.night_counter;
      inner.roster.reset_interaction_statuses();

      let mut dead = Vec::new();
      for &id in &log.dead {
        if let Some(player) = inner.roster.to_dead(id, DeadReason::KilledAtNight, night) {
          tracing::info!(night, player = %id, role = %player.player.role, "killed at night");
          dead.push((id, player.player.participant.nick.clone()));
        }
      }

      let promoted: Vec<String> = match inner.roles_config.as_ref() {
        Some(config) => reincarnation::reincarnate(&mut inner.roster, config)
          .into_iter()
          .filter_map(|id| inner.roster.get(id))
          .inspect(|player| tracing::info!(player = %player.id, "don promoted to mafia"))
          .map(messenger::reincarnated)
          .collect(),
        None => Vec::new(),
      };
      (messenger::after_night(night, &dead), promoted)
    };

    self.announce(message).await;
    for message in promoted {
      self.announce_role(RoleKind::Mafia, message).await;
    }

    if !log.dead.is_empty() {
      let game = Arc::clone(self);
      let dead = log.dead.clone();
      let cancel = cancel.clone();
      let last_word = self.options.timings.last_word();
      tokio::spawn(async move {
        if timer::sleep(last_word, &cancel).await != Wake::Deadline {
          return;
        }
        let mut inner = game.inner.write().await;
        // A finished game keeps its dead as they fell.
        if !inner.state.is_finished() {
          inner.roster.dead_to_spectating(&dead);
        }
      });
    }
  }

  /// Apply a day's outcome: move the kicked player to the dead, announce.
  async fn affect_day(&self, log: &DayLog) {
    let message = {
      let mut guard = self.inner.write().await;
      let inner = &mut *guard;
      let night = inner.night_counter;
      let kicked = log
        .kicked
        .and_then(|id| inner.roster.to_dead(id, DeadReason::KilledByDayVoting, night));
      let message = match kicked {
        Some(dead) => {
          tracing::info!(day = night, player = %dead.player.id, role = %dead.player.role, "voted out");
          messenger::kicked(&dead.player)
        }
        None => messenger::skipped(),
      };
      inner.roster.clear_day_votes();
      message
    };
    self.announce(message).await;
  }

  /// The win evaluator. A fool voted out wins outright; otherwise a single
  /// living team wins, and an empty table is a draw.
  async fn check_finish(&self) -> Option<FinishLog> {
    let inner = self.inner.read().await;
    let roster = &inner.roster;
    let nights = inner.night_counter;
    if roster.fool_voted_out() {
      return Some(FinishLog::fool(roster, nights));
    }
    if let Some(team) = roster.winner_team() {
      return Some(FinishLog::for_team(roster, team, nights));
    }
    (roster.living_count() == 0).then(|| FinishLog::draw(roster, nights))
  }

  // ── Storage ───────────────────────────────────────────────────────────────

  async fn save_night_log(&self, log: NightLog) {
    let snapshot = self.snapshot().await;
    if let Err(error) = self.storage.save_night_log(snapshot, log).await {
      self.signals.error(Error::Storage(Box::new(error)));
    }
  }

  async fn save_day_log(&self, log: DayLog) {
    let snapshot = self.snapshot().await;
    if let Err(error) = self.storage.save_day_log(snapshot, log).await {
      self.signals.error(Error::Storage(Box::new(error)));
    }
  }

  // ── Finish ────────────────────────────────────────────────────────────────

  /// Finish with a result. Shares its run-once guard with
  /// [`finish_anyway`](Self::finish_anyway): whichever runs first wins and
  /// the other returns the first outcome.
  async fn finish_by_log(&self, log: FinishLog) -> Option<FinishLog> {
    self
      .finished
      .get_or_init(|| async move {
        tracing::info!(
          game = %self.id,
          winner = ?log.winner_team,
          fool = log.is_fool,
          nights = log.total_nights,
          "game finished"
        );
        self.announce(messenger::finished(&log)).await;
        self.enter_finish().await;
        let snapshot = self.snapshot().await;
        if let Err(error) = self.storage.save_finish_log(snapshot, log.clone()).await {
          self.signals.error(Error::Storage(Box::new(error)));
        }
        self.cleanup().await;
        Some(log)
      })
      .await
      .clone()
  }

  /// Finish without a result.
  pub(crate) async fn finish_anyway(&self) -> Option<FinishLog> {
    self
      .finished
      .get_or_init(|| async {
        tracing::info!(game = %self.id, "game stopped");
        self.announce(messenger::suspended()).await;
        self.enter_finish().await;
        self.cleanup().await;
        None
      })
      .await
      .clone()
  }

  async fn enter_finish(&self) {
    let mut guard = self.inner.write().await;
    let inner = &mut *guard;
    inner.night_voting = None;
    inner.day_voting = None;
    inner.ended_at = Some(Utc::now());
    self.set_state(inner, State::Finish);
  }

  /// Rename everybody back, emit the finish signal and close the bus.
  async fn cleanup(&self) {
    let renames = self.plan_renames(&mut *self.inner.write().await, true);
    self.apply_renames(renames);
    self.signals.emit(SignalKind::Finish);
    self.signals.close();
  }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
  payload
    .downcast_ref::<&str>()
    .map(|s| (*s).to_owned())
    .or_else(|| payload.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown panic".to_owned())
}
