//! The `Game` aggregate: registration, initialisation, getters and the
//! plumbing every phase shares.
//!
//! All mutable state sits in one [`Inner`] behind a single `RwLock`. The
//! orchestration task and external vote submissions both go through it; no
//! lock is held across a message delivery, a rename or a storage call.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use mafia_core::{
  channel::{
    MessageSink, RenameMode, RenameProvider, in_game_nick, spectator_nick,
  },
  config::RolesConfig,
  log::{DayLog, NightLog},
  player::{DeadPlayer, Participant, Player, PlayerId},
  role::RoleKind,
  roster::Roster,
  snapshot::GameSnapshot,
  state::State,
  storage::{GameStorage, NoStorage},
  vote::VoteContext,
};
use tokio::sync::{OnceCell, RwLock, broadcast, mpsc};
use uuid::Uuid;

use crate::{
  Error, Result,
  day::DayBallot,
  night::NightWindow,
  options::GameOptions,
  signal::{Signal, SignalBus, SignalKind},
};

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// One game from registration to finish. Share it as `Arc<Game<S>>`: the
/// orchestration task runs on one clone, vote submissions arrive on others.
pub struct Game<S = NoStorage> {
  pub(crate) id:       Uuid,
  pub(crate) options:  GameOptions,
  pub(crate) storage:  S,
  pub(crate) rename:   Option<Arc<dyn RenameProvider>>,
  pub(crate) inner:    RwLock<Inner>,
  pub(crate) signals:  SignalBus,
  /// Run-once guard for the finish sequence.
  pub(crate) finished: OnceCell<Option<mafia_core::log::FinishLog>>,
}

#[derive(Default)]
pub(crate) struct Inner {
  pub state:          State,
  pub previous_state: State,
  pub night_counter:  u32,
  pub name:           Option<String>,
  pub roles_config:   Option<RolesConfig>,
  pub roster:         Roster,
  /// Open night window; `Some` only while one role is voting.
  pub night_voting:   Option<NightWindow>,
  /// What tonight's closed windows put on record, by voter.
  pub night_votes:    BTreeMap<PlayerId, Vec<Option<PlayerId>>>,
  /// Feed into the day tally; `Some` only while the day vote is open.
  pub day_voting:     Option<mpsc::UnboundedSender<DayBallot>>,
  pub night_logs:     Vec<NightLog>,
  pub day_logs:       Vec<DayLog>,
  pub main_channel:   Option<Arc<dyn MessageSink>>,
  pub role_channels:  BTreeMap<RoleKind, Arc<dyn MessageSink>>,
  pub started_at:     Option<DateTime<Utc>>,
  pub ended_at:       Option<DateTime<Utc>>,
  /// Set once a run task has claimed the game.
  pub running:        bool,
}

/// One nickname change for the rename provider; `scope` of `None` is
/// guild-wide.
pub(crate) struct Rename {
  scope: Option<String>,
  tag:   String,
  nick:  String,
}

impl Game<NoStorage> {
  pub fn new(options: GameOptions) -> Self {
    Self::with_storage(options, NoStorage)
  }
}

impl<S: GameStorage> Game<S> {
  pub fn with_storage(options: GameOptions, storage: S) -> Self {
    Self {
      id: Uuid::new_v4(),
      options,
      storage,
      rename: None,
      inner: RwLock::new(Inner::default()),
      signals: SignalBus::new(),
      finished: OnceCell::new(),
    }
  }

  pub fn with_rename_provider(mut self, provider: Arc<dyn RenameProvider>) -> Self {
    self.rename = Some(provider);
    self
  }

  pub fn id(&self) -> Uuid { self.id }

  pub fn options(&self) -> &GameOptions { &self.options }

  /// Subscribe to the signal stream. Subscribe before [`run`](Self::run) to
  /// see every signal.
  pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
    self.signals.subscribe()
  }

  // ── Registration ──────────────────────────────────────────────────────────

  pub async fn set_main_channel(&self, sink: Arc<dyn MessageSink>) -> Result<()> {
    let mut inner = self.inner.write().await;
    self.registering(&mut inner)?;
    inner.main_channel = Some(sink);
    Ok(())
  }

  pub async fn set_role_channel(
    &self,
    role: RoleKind,
    sink: Arc<dyn MessageSink>,
  ) -> Result<()> {
    let mut inner = self.inner.write().await;
    self.registering(&mut inner)?;
    if inner.role_channels.contains_key(&role) {
      return Err(mafia_core::Error::DuplicateRoleChannel(role).into());
    }
    inner.role_channels.insert(role, sink);
    Ok(())
  }

  pub async fn set_start_players(&self, players: Vec<Participant>) -> Result<()> {
    let mut inner = self.inner.write().await;
    self.registering(&mut inner)?;
    inner.roster.start_players = players;
    Ok(())
  }

  pub async fn set_spectators(&self, spectators: Vec<Participant>) -> Result<()> {
    let mut inner = self.inner.write().await;
    self.registering(&mut inner)?;
    inner.roster.spectators = spectators;
    Ok(())
  }

  fn registering(&self, inner: &mut Inner) -> Result<()> {
    match inner.state {
      State::NonDefined => {
        self.set_state(inner, State::Register);
        Ok(())
      }
      State::Register => Ok(()),
      _ => Err(Error::AlreadyStarted),
    }
  }

  // ── Initialisation ────────────────────────────────────────────────────────

  /// Validate the registration against `config`, deal roles and rename the
  /// players. Moves the game `Register → Init → Starting`.
  pub async fn init(&self, config: RolesConfig) -> Result<()> {
    let renames = {
      let mut guard = self.inner.write().await;
      let inner = &mut *guard;
      match inner.state {
        State::Register => {}
        State::NonDefined => {
          return Err(mafia_core::Error::MissingMainChannel.into());
        }
        _ => return Err(Error::AlreadyStarted),
      }

      config.validate()?;
      if inner.main_channel.is_none() {
        return Err(mafia_core::Error::MissingMainChannel.into());
      }
      if let Some(role) = config
        .get_order_to_vote()
        .into_iter()
        .find(|role| !inner.role_channels.contains_key(role))
      {
        return Err(mafia_core::Error::MissingRoleChannel(role).into());
      }
      if self.options.rename_mode != RenameMode::NotRename
        && self.rename.is_none()
      {
        return Err(mafia_core::Error::MissingRenameProvider.into());
      }

      let roster = Roster::deal(
        inner.roster.start_players.clone(),
        inner.roster.spectators.clone(),
        &config,
        &mut rand::thread_rng(),
      )?;

      self.set_state(inner, State::Init);
      inner.roster = roster;
      inner.roles_config = Some(config);
      inner.started_at = Some(Utc::now());
      let renames = self.plan_renames(inner, false);
      self.set_state(inner, State::Starting);
      tracing::info!(
        game = %self.id,
        players = inner.roster.active.len(),
        "game initialised"
      );
      renames
    };
    self.apply_renames(renames);

    let snapshot = self.snapshot().await;
    if let Err(error) = self.storage.init_new_game(snapshot).await {
      self.signals.error(Error::Storage(Box::new(error)));
    }
    Ok(())
  }

  /// Work out the renames for every player (and, guild-wide, every
  /// spectator), either into the game or back to their original nicknames.
  /// Nicknames in the roster are updated here; the provider is called later
  /// through [`apply_renames`](Self::apply_renames), once the lock is gone.
  pub(crate) fn plan_renames(&self, inner: &mut Inner, back: bool) -> Vec<Rename> {
    if self.rename.is_none() {
      return Vec::new();
    }
    let mode = self.options.rename_mode;
    let main = inner.main_channel.as_ref().map(|c| c.server_id().to_owned());
    let role_channels: BTreeMap<RoleKind, String> = inner
      .role_channels
      .iter()
      .map(|(role, sink)| (*role, sink.server_id().to_owned()))
      .collect();

    let scopes = |role: RoleKind| -> Vec<Option<String>> {
      match mode {
        RenameMode::NotRename => vec![],
        RenameMode::InGuild => vec![None],
        RenameMode::OnlyInMainChannel => vec![main.clone()],
        RenameMode::InAllChannels => role_channels
          .get(&role)
          .cloned()
          .into_iter()
          .chain(main.clone())
          .map(Some)
          .collect(),
      }
    };

    let mut renames = Vec::new();
    let roster = &mut inner.roster;
    let players = roster
      .active
      .values_mut()
      .chain(roster.dead.iter_mut().map(|dead| &mut dead.player));
    for player in players {
      let participant = &mut player.participant;
      let nick = if back {
        participant.old_nick.clone()
      } else {
        in_game_nick(player.id, &participant.old_nick)
      };
      for scope in scopes(player.role) {
        renames.push(Rename {
          scope,
          tag: participant.tag.clone(),
          nick: nick.clone(),
        });
      }
      participant.nick = nick;
    }

    if mode == RenameMode::InGuild {
      for spectator in &mut roster.spectators {
        let nick = if back {
          spectator.old_nick.clone()
        } else {
          spectator_nick(&spectator.old_nick)
        };
        renames.push(Rename {
          scope: None,
          tag:   spectator.tag.clone(),
          nick:  nick.clone(),
        });
        spectator.nick = nick;
      }
    }
    renames
  }

  /// Hand planned renames to the provider. Failures become error signals.
  pub(crate) fn apply_renames(&self, renames: Vec<Rename>) {
    let Some(provider) = self.rename.as_deref() else {
      return;
    };
    for rename in renames {
      if let Err(error) =
        provider.rename(rename.scope.as_deref(), &rename.tag, &rename.nick)
      {
        self.signals.error(error);
      }
    }
  }

  /// Give the game a human-readable name and pass it on to storage.
  pub async fn set_name(&self, name: impl Into<String>) {
    let name = name.into();
    self.inner.write().await.name = Some(name.clone());
    if let Err(error) = self.storage.name_game(self.id, name).await {
      self.signals.error(Error::Storage(Box::new(error)));
    }
  }

  // ── Shared plumbing ───────────────────────────────────────────────────────

  /// Record the prior state and switch. Emits the switch signal while the
  /// caller still holds the lock, so subscribers reacting to it observe the
  /// new phase fully set up.
  pub(crate) fn set_state(&self, inner: &mut Inner, new: State) {
    inner.previous_state = inner.state;
    inner.state = new;
    tracing::info!(
      game = %self.id,
      night = inner.night_counter,
      previous = ?inner.previous_state,
      new = ?new,
      "game {new}"
    );
    self.signals.emit(SignalKind::SwitchState {
      night_counter: inner.night_counter,
      previous:      inner.previous_state,
      new,
    });
  }

  pub(crate) fn vote_context<'a>(&self, inner: &'a Inner) -> VoteContext<'a> {
    VoteContext {
      state:             inner.state,
      night_voting:      inner.night_voting.as_ref().map(|w| w.role),
      roster:            &inner.roster,
      vote_ping:         self.options.vote_ping,
      vote_for_yourself: self.options.vote_for_yourself,
    }
  }

  /// Write to the main channel. Delivery failures become error signals.
  pub(crate) async fn announce(&self, message: String) {
    let sink = self.inner.read().await.main_channel.clone();
    self.deliver(sink, &message);
  }

  /// Write to one role's channel.
  pub(crate) async fn announce_role(&self, role: RoleKind, message: String) {
    let sink = self.inner.read().await.role_channels.get(&role).cloned();
    self.deliver(sink, &message);
  }

  fn deliver(&self, sink: Option<Arc<dyn MessageSink>>, message: &str) {
    let Some(sink) = sink else {
      return;
    };
    if let Err(error) = sink.write(message) {
      self.signals.error(error);
    }
  }

  // ── Getters ───────────────────────────────────────────────────────────────

  pub async fn state(&self) -> State { self.inner.read().await.state }

  pub async fn previous_state(&self) -> State {
    self.inner.read().await.previous_state
  }

  pub async fn night_counter(&self) -> u32 {
    self.inner.read().await.night_counter
  }

  /// The role whose night window is open, if any.
  pub async fn night_voting(&self) -> Option<RoleKind> {
    self.inner.read().await.night_voting.as_ref().map(|w| w.role)
  }

  pub async fn active_players(&self) -> Vec<Player> {
    self.inner.read().await.roster.active.values().cloned().collect()
  }

  pub async fn dead_players(&self) -> Vec<DeadPlayer> {
    self.inner.read().await.roster.dead.clone()
  }

  pub async fn spectators(&self) -> Vec<Participant> {
    self.inner.read().await.roster.spectators.clone()
  }

  pub async fn start_players(&self) -> Vec<Participant> {
    self.inner.read().await.roster.start_players.clone()
  }

  pub async fn roles_config(&self) -> Option<RolesConfig> {
    self.inner.read().await.roles_config.clone()
  }

  pub fn vote_ping(&self) -> usize { self.options.vote_ping }

  pub async fn started_at(&self) -> Option<DateTime<Utc>> {
    self.inner.read().await.started_at
  }

  pub async fn ended_at(&self) -> Option<DateTime<Utc>> {
    self.inner.read().await.ended_at
  }

  pub async fn night_logs(&self) -> Vec<NightLog> {
    self.inner.read().await.night_logs.clone()
  }

  pub async fn day_logs(&self) -> Vec<DayLog> {
    self.inner.read().await.day_logs.clone()
  }

  /// A deep, self-contained copy of the game as it is right now.
  pub async fn snapshot(&self) -> GameSnapshot {
    let inner = self.inner.read().await;
    self.snapshot_of(&inner)
  }

  pub(crate) fn snapshot_of(&self, inner: &Inner) -> GameSnapshot {
    GameSnapshot {
      id:                self.id,
      name:              inner.name.clone(),
      state:             inner.state,
      previous_state:    inner.previous_state,
      night_counter:     inner.night_counter,
      roles_config:      inner.roles_config.clone(),
      roster:            inner.roster.clone(),
      night_voting:      inner.night_voting.as_ref().map(|w| w.role),
      night_logs:        inner.night_logs.clone(),
      day_logs:          inner.day_logs.clone(),
      vote_ping:         self.options.vote_ping,
      vote_for_yourself: self.options.vote_for_yourself,
      rename_mode:       self.options.rename_mode,
      timings:           self.options.timings.clone(),
      started_at:        inner.started_at,
      ended_at:          inner.ended_at,
    }
  }
}
