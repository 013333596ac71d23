//! Engine tests. Every async test runs on a paused clock, so deadlines and
//! fake windows elapse instantly once all tasks are idle.

use std::{
  collections::BTreeMap,
  convert::Infallible,
  sync::{Arc, Mutex, OnceLock, Weak},
  time::Duration,
};

use mafia_core::{
  channel::{MessageSink, RenameMode, RenameProvider, SinkError},
  config::RolesConfig,
  log::{DayLog, FinishLog, NightLog},
  player::{
    DeadReason, InteractionStatus, LifeStatus, Participant, Player, PlayerId,
  },
  role::{RoleKind, Team},
  roster::Roster,
  snapshot::GameSnapshot,
  state::State,
  storage::GameStorage,
  vote::{Ballot, OneVote, PlayerRef, TwoVote, VoteError},
};
use tokio::{
  sync::broadcast::{self, error::RecvError},
  task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  Error, Game, GameOptions, Signal, SignalKind,
  day::{DayOutcome, DayTally},
  reincarnation::reincarnate,
};

use RoleKind::*;

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
  id:       String,
  fail:     bool,
  messages: Mutex<Vec<String>>,
}

impl RecordingSink {
  fn new(id: &str) -> Arc<Self> {
    Arc::new(Self {
      id: id.to_owned(),
      ..Self::default()
    })
  }

  fn failing(id: &str) -> Arc<Self> {
    Arc::new(Self {
      id: id.to_owned(),
      fail: true,
      ..Self::default()
    })
  }

  fn messages(&self) -> Vec<String> { self.messages.lock().unwrap().clone() }
}

impl MessageSink for RecordingSink {
  fn write(&self, message: &str) -> Result<(), SinkError> {
    if self.fail {
      return Err(SinkError::Write {
        channel: self.id.clone(),
        reason:  "offline".into(),
      });
    }
    self.messages.lock().unwrap().push(message.to_owned());
    Ok(())
  }

  fn server_id(&self) -> &str { &self.id }
}

#[derive(Default)]
struct RecordingRename {
  renames: Mutex<Vec<(Option<String>, String, String)>>,
}

impl RenameProvider for RecordingRename {
  fn rename(
    &self,
    channel: Option<&str>,
    tag: &str,
    nick: &str,
  ) -> Result<(), SinkError> {
    self.renames.lock().unwrap().push((
      channel.map(str::to_owned),
      tag.to_owned(),
      nick.to_owned(),
    ));
    Ok(())
  }
}

/// Records whether the game state was free to lock at each rename.
#[derive(Default)]
struct LockWatchingRename {
  game:     OnceLock<Weak<Game>>,
  unlocked: Mutex<Vec<bool>>,
}

impl RenameProvider for LockWatchingRename {
  fn rename(&self, _: Option<&str>, _: &str, _: &str) -> Result<(), SinkError> {
    if let Some(game) = self.game.get().and_then(Weak::upgrade) {
      let free = game.inner.try_write().is_ok();
      self.unlocked.lock().unwrap().push(free);
    }
    Ok(())
  }
}

#[derive(Default)]
struct MemoryStorage {
  events: Mutex<Vec<String>>,
}

impl MemoryStorage {
  fn push(&self, event: String) { self.events.lock().unwrap().push(event); }

  fn events(&self) -> Vec<String> { self.events.lock().unwrap().clone() }
}

impl GameStorage for MemoryStorage {
  type Error = Infallible;

  async fn init_new_game(&self, game: GameSnapshot) -> Result<(), Infallible> {
    self.push(format!("init {:?}", game.state));
    Ok(())
  }

  async fn save_night_log(
    &self,
    _: GameSnapshot,
    log: NightLog,
  ) -> Result<(), Infallible> {
    self.push(format!("night {}", log.number));
    Ok(())
  }

  async fn save_day_log(
    &self,
    _: GameSnapshot,
    log: DayLog,
  ) -> Result<(), Infallible> {
    self.push(format!("day {}", log.number));
    Ok(())
  }

  async fn save_finish_log(
    &self,
    game: GameSnapshot,
    _: FinishLog,
  ) -> Result<(), Infallible> {
    self.push(format!("finish {:?}", game.state));
    Ok(())
  }

  async fn name_game(&self, _: Uuid, name: String) -> Result<(), Infallible> {
    self.push(format!("name {name}"));
    Ok(())
  }
}

struct PanickingStorage;

impl GameStorage for PanickingStorage {
  type Error = Infallible;

  async fn init_new_game(&self, _: GameSnapshot) -> Result<(), Infallible> {
    Ok(())
  }

  async fn save_night_log(
    &self,
    _: GameSnapshot,
    _: NightLog,
  ) -> Result<(), Infallible> {
    panic!("disk on fire");
  }

  async fn save_day_log(&self, _: GameSnapshot, _: DayLog) -> Result<(), Infallible> {
    Ok(())
  }

  async fn save_finish_log(
    &self,
    _: GameSnapshot,
    _: FinishLog,
  ) -> Result<(), Infallible> {
    Ok(())
  }

  async fn name_game(&self, _: Uuid, _: String) -> Result<(), Infallible> {
    Ok(())
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

struct Table<S: GameStorage> {
  game:  Arc<Game<S>>,
  main:  Arc<RecordingSink>,
  roles: BTreeMap<RoleKind, Arc<RecordingSink>>,
}

fn participants(count: usize) -> Vec<Participant> {
  (1..=count)
    .map(|i| Participant::new(format!("tag{i}"), format!("user{i}"), format!("srv{i}")))
    .collect()
}

async fn register<S: GameStorage>(game: Game<S>, config: &RolesConfig) -> Table<S> {
  let game = Arc::new(game);
  let main = RecordingSink::new("main");
  game.set_main_channel(main.clone()).await.unwrap();
  let mut roles = BTreeMap::new();
  for role in config.get_order_to_vote() {
    let sink = RecordingSink::new(&role.to_string());
    game.set_role_channel(role, sink.clone()).await.unwrap();
    roles.insert(role, sink);
  }
  game
    .set_start_players(participants(config.players_count))
    .await
    .unwrap();
  Table { game, main, roles }
}

async fn table(config: RolesConfig) -> Table<mafia_core::storage::NoStorage> {
  let t = register(Game::new(GameOptions::default()), &config).await;
  t.game.init(config).await.unwrap();
  t
}

async fn with_role<S: GameStorage>(game: &Game<S>, role: RoleKind) -> Vec<PlayerId> {
  game
    .active_players()
    .await
    .into_iter()
    .filter(|p| p.role == role)
    .map(|p| p.id)
    .collect()
}

async fn player<S: GameStorage>(game: &Game<S>, id: PlayerId) -> Player {
  game
    .active_players()
    .await
    .into_iter()
    .find(|p| p.id == id)
    .expect("active player")
}

fn vote(voter: PlayerId, target: PlayerId) -> OneVote {
  OneVote::new(PlayerRef::in_game(voter), Some(PlayerRef::in_game(target)))
}

async fn wait_for(
  signals: &mut broadcast::Receiver<Signal>,
  matches: impl Fn(&SignalKind) -> bool,
) -> Signal {
  loop {
    match signals.recv().await {
      Ok(signal) if matches(&signal.kind) => return signal,
      Ok(_) | Err(RecvError::Lagged(_)) => continue,
      Err(RecvError::Closed) => panic!("signal stream closed"),
    }
  }
}

fn is_day(kind: &SignalKind) -> bool {
  matches!(kind, SignalKind::SwitchState { new: State::Day, .. })
}

/// Submit scripted votes as windows open. Returns every signal seen until
/// the stream closes.
fn spawn_bot<S: GameStorage + 'static>(
  game: &Arc<Game<S>>,
  night: BTreeMap<RoleKind, Ballot>,
  day: Vec<OneVote>,
) -> JoinHandle<Vec<Signal>> {
  let game = Arc::clone(game);
  let mut signals = game.subscribe();
  tokio::spawn(async move {
    let mut seen = Vec::new();
    loop {
      let signal = match signals.recv().await {
        Ok(signal) => signal,
        Err(RecvError::Lagged(_)) => continue,
        Err(RecvError::Closed) => break,
      };
      match &signal.kind {
        SignalKind::SwitchVotingRole { role: Some(role) } => {
          let _ = match night.get(role) {
            Some(Ballot::One(v)) => game.set_night_vote(v.clone()).await,
            Some(Ballot::Two(v)) => game.set_night_two_vote(v.clone()).await,
            None => Ok(()),
          };
        }
        kind if is_day(kind) => {
          for v in &day {
            let _ = game.set_day_vote(v.clone()).await;
          }
        }
        _ => {}
      }
      seen.push(signal);
    }
    seen
  })
}

// ─── Day tally ───────────────────────────────────────────────────────────────

#[test]
fn tally_kicks_on_early_quorum() {
  let mut tally = DayTally::new(7, 4);
  for voter in 1..=3 {
    assert_eq!(tally.record(PlayerId(voter), Some(PlayerId(7))), None);
  }
  assert_eq!(
    tally.record(PlayerId(4), Some(PlayerId(7))),
    Some(DayOutcome::Kick(PlayerId(7)))
  );
}

#[test]
fn tally_replaces_previous_vote() {
  let mut tally = DayTally::new(5, 3);
  tally.record(PlayerId(1), Some(PlayerId(5)));
  tally.record(PlayerId(2), Some(PlayerId(5)));
  // Voter 1 changes their mind; player 5 is back to one vote.
  assert_eq!(tally.record(PlayerId(1), Some(PlayerId(4))), None);
  assert_eq!(tally.record(PlayerId(3), Some(PlayerId(5))), None);
  assert_eq!(
    tally.record(PlayerId(4), Some(PlayerId(5))),
    Some(DayOutcome::Kick(PlayerId(5)))
  );
}

#[test]
fn tally_plurality_once_everybody_voted() {
  let mut tally = DayTally::new(4, 3);
  tally.record(PlayerId(1), Some(PlayerId(2)));
  tally.record(PlayerId(2), Some(PlayerId(1)));
  tally.record(PlayerId(3), Some(PlayerId(2)));
  let outcome = tally.record(PlayerId(4), None);
  assert_eq!(outcome, Some(DayOutcome::Kick(PlayerId(2))));

  let log = tally.into_log(1, DayOutcome::Kick(PlayerId(2)));
  assert_eq!(log.kicked, Some(PlayerId(2)));
  assert!(!log.is_skip);
  assert_eq!(log.votes.len(), 3);
}

#[test]
fn tally_tie_is_a_skip() {
  let mut tally = DayTally::new(4, 3);
  tally.record(PlayerId(1), Some(PlayerId(2)));
  tally.record(PlayerId(2), Some(PlayerId(1)));
  tally.record(PlayerId(3), Some(PlayerId(2)));
  assert_eq!(
    tally.record(PlayerId(4), Some(PlayerId(1))),
    Some(DayOutcome::Skip)
  );
  let log = tally.into_log(1, DayOutcome::Skip);
  assert!(log.is_skip);
  assert_eq!(log.kicked, None);
}

#[test]
fn tally_all_abstain_is_a_skip() {
  let mut tally = DayTally::new(2, 1);
  assert_eq!(tally.record(PlayerId(1), None), None);
  assert_eq!(tally.record(PlayerId(2), None), Some(DayOutcome::Skip));
}

// ─── Registration & init ─────────────────────────────────────────────────────

#[tokio::test]
async fn first_registration_moves_to_register() {
  let game = Game::new(GameOptions::default());
  assert_eq!(game.state().await, State::NonDefined);
  game.set_spectators(participants(1)).await.unwrap();
  assert_eq!(game.state().await, State::Register);
}

#[tokio::test]
async fn init_deals_roles_and_reaches_starting() {
  let config = RolesConfig::preset(7, 0).unwrap();
  let t = table(config.clone()).await;
  assert_eq!(t.game.state().await, State::Starting);
  assert_eq!(t.game.previous_state().await, State::Init);
  assert!(t.game.started_at().await.is_some());

  let players = t.game.active_players().await;
  let ids: Vec<_> = players.iter().map(|p| p.id.0).collect();
  assert_eq!(ids, (1..=7).collect::<Vec<u8>>());
  assert_eq!(with_role(&t.game, Peaceful).await.len(), 4);
  assert_eq!(with_role(&t.game, Don).await.len(), 1);
}

#[tokio::test]
async fn init_requires_every_night_role_channel() {
  let config = RolesConfig::preset(7, 0).unwrap();
  let game = Game::new(GameOptions::default());
  game.set_main_channel(RecordingSink::new("main")).await.unwrap();
  game.set_role_channel(Mafia, RecordingSink::new("m")).await.unwrap();
  game.set_start_players(participants(7)).await.unwrap();
  let err = game.init(config).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Config(mafia_core::Error::MissingRoleChannel(Don))
  ));
  assert_eq!(game.state().await, State::Register);
}

#[tokio::test]
async fn init_rejects_player_count_mismatch() {
  let config = RolesConfig::preset(5, 0).unwrap();
  let t = register(Game::new(GameOptions::default()), &config).await;
  t.game.set_start_players(participants(4)).await.unwrap();
  let err = t.game.init(config).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Config(mafia_core::Error::PlayersCountMismatch { expected: 5, actual: 4 })
  ));
}

#[tokio::test]
async fn init_needs_rename_provider_when_renaming() {
  let config = RolesConfig::preset(5, 1).unwrap();
  let options = GameOptions {
    rename_mode: RenameMode::InGuild,
    ..GameOptions::default()
  };
  let t = register(Game::new(options), &config).await;
  let err = t.game.init(config).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Config(mafia_core::Error::MissingRenameProvider)
  ));
}

#[tokio::test]
async fn registration_closes_after_init() {
  let config = RolesConfig::preset(5, 1).unwrap();
  let t = table(config.clone()).await;
  assert!(matches!(
    t.game.set_spectators(vec![]).await,
    Err(Error::AlreadyStarted)
  ));
  assert!(matches!(t.game.init(config).await, Err(Error::AlreadyStarted)));
}

#[tokio::test]
async fn duplicate_role_channel_is_rejected() {
  let game = Game::new(GameOptions::default());
  game.set_role_channel(Mafia, RecordingSink::new("a")).await.unwrap();
  let err = game
    .set_role_channel(Mafia, RecordingSink::new("b"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Config(mafia_core::Error::DuplicateRoleChannel(Mafia))
  ));
}

#[tokio::test]
async fn votes_before_start_are_rejected() {
  let t = table(RolesConfig::preset(5, 1).unwrap()).await;
  let mafia = with_role(&t.game, Mafia).await[0];
  let peaceful = with_role(&t.game, Peaceful).await[0];
  assert_eq!(
    t.game.set_night_vote(vote(mafia, peaceful)).await,
    Err(VoteError::GameNotStarted)
  );
}

// ─── Night ───────────────────────────────────────────────────────────────────

async fn seven_player_night(protect_victim: bool) -> (NightLog, Table<mafia_core::storage::NoStorage>) {
  let t = table(RolesConfig::preset(7, 0).unwrap()).await;
  let game = &t.game;
  let mafia = with_role(game, Mafia).await[0];
  let doctor = with_role(game, Doctor).await[0];
  let don = with_role(game, Don).await[0];
  let peaceful = with_role(game, Peaceful).await;
  let (victim, other) = (peaceful[0], peaceful[1]);

  let healed = if protect_victim { victim } else { other };
  let night = BTreeMap::from([
    (Mafia, Ballot::One(vote(mafia, victim))),
    (Doctor, Ballot::One(vote(doctor, healed))),
    (Don, Ballot::One(OneVote::empty(PlayerRef::in_game(don)))),
  ]);
  let _bot = spawn_bot(game, night, vec![]);
  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());

  wait_for(&mut signals, is_day).await;
  let log = game.night_logs().await.remove(0);
  cancel.cancel();
  assert_eq!(handle.await.unwrap(), None);
  (log, t)
}

#[tokio::test(start_paused = true)]
async fn unprotected_target_dies() {
  let (log, t) = seven_player_night(false).await;
  assert_eq!(log.number, 1);
  assert_eq!(log.dead.len(), 1);

  let dead = t.game.dead_players().await;
  assert_eq!(dead.len(), 1);
  assert_eq!(dead[0].reason, DeadReason::KilledAtNight);
  assert_eq!(dead[0].lived_days, 1);
  assert!(log.dead.contains(&dead[0].player.id));
}

#[tokio::test(start_paused = true)]
async fn protected_target_survives() {
  let (log, t) = seven_player_night(true).await;
  assert!(log.dead.is_empty());
  assert!(t.game.dead_players().await.is_empty());
  assert_eq!(log.votes.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn night_votes_stay_index_aligned() {
  let config = RolesConfig::new(6, [(Peaceful, 2), (Detective, 1), (Mafia, 3)]);
  let t = table(config).await;
  let game = &t.game;
  let mafia = with_role(game, Mafia).await;
  let detective = with_role(game, Detective).await[0];
  let peaceful = with_role(game, Peaceful).await;

  let night = BTreeMap::from([
    (Mafia, Ballot::One(vote(mafia[1], peaceful[0]))),
    (
      Detective,
      Ballot::Two(TwoVote::new(
        PlayerRef::in_game(detective),
        Some((PlayerRef::in_game(peaceful[1]), PlayerRef::in_game(mafia[0]))),
      )),
    ),
  ]);
  let _bot = spawn_bot(game, night, vec![]);
  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());
  wait_for(&mut signals, is_day).await;

  for id in &mafia {
    assert_eq!(player(game, *id).await.votes, vec![Some(peaceful[0])]);
  }
  assert_eq!(player(game, detective).await.votes.len(), 2);

  let reveals = t.roles[&Detective].messages();
  assert!(reveals.iter().any(|m| m.contains("different teams")));

  cancel.cancel();
  handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn muted_player_defers_to_cohort() {
  let config = RolesConfig::new(6, [(Peaceful, 3), (Whore, 1), (Mafia, 2)]);
  let t = table(config).await;
  let game = &t.game;
  let whore = with_role(game, Whore).await[0];
  let mafia = with_role(game, Mafia).await;
  let victim = with_role(game, Peaceful).await[0];

  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());

  wait_for(&mut signals, |k| {
    matches!(k, SignalKind::SwitchVotingRole { role: Some(Whore) })
  })
  .await;
  game.set_night_vote(vote(whore, mafia[0])).await.unwrap();

  wait_for(&mut signals, |k| {
    matches!(k, SignalKind::SwitchVotingRole { role: Some(Mafia) })
  })
  .await;
  let muted = player(game, mafia[0]).await;
  assert_eq!(muted.interaction_status, InteractionStatus::Muted);
  assert_eq!(
    game.set_night_vote(vote(mafia[0], victim)).await,
    Err(VoteError::VoterMuted)
  );
  game.set_night_vote(vote(mafia[1], victim)).await.unwrap();

  wait_for(&mut signals, is_day).await;
  for id in &mafia {
    let p = player(game, *id).await;
    assert_eq!(p.votes, vec![Some(victim)]);
    // Mutes last one night.
    assert_eq!(p.interaction_status, InteractionStatus::Passed);
  }
  assert!(game.night_logs().await[0].dead.contains(&victim));

  cancel.cancel();
  handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn fully_muted_role_holds_a_fake_window() {
  let config = RolesConfig::new(5, [(Peaceful, 3), (Whore, 1), (Mafia, 1)]);
  let t = table(config).await;
  let game = &t.game;
  let whore = with_role(game, Whore).await[0];
  let mafia = with_role(game, Mafia).await[0];

  let night = BTreeMap::from([(Whore, Ballot::One(vote(whore, mafia)))]);
  let _bot = spawn_bot(game, night, vec![]);
  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());

  wait_for(&mut signals, |k| {
    matches!(k, SignalKind::SwitchVotingRole { role: Some(Mafia) })
  })
  .await;
  let opened = tokio::time::Instant::now();
  wait_for(&mut signals, |k| {
    matches!(k, SignalKind::SwitchVotingRole { role: None })
  })
  .await;
  let held = opened.elapsed();
  assert!(held >= Duration::from_secs(5) && held <= Duration::from_secs(36));

  wait_for(&mut signals, is_day).await;
  assert_eq!(player(game, mafia).await.votes, vec![None]);
  assert!(game.night_logs().await[0].dead.is_empty());
  assert!(t.roles[&Mafia].messages().is_empty());

  cancel.cancel();
  handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn wrong_role_vote_is_rejected_during_window() {
  let t = table(RolesConfig::preset(7, 0).unwrap()).await;
  let game = &t.game;
  let doctor = with_role(game, Doctor).await[0];
  let peaceful = with_role(game, Peaceful).await[0];

  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());
  wait_for(&mut signals, |k| {
    matches!(k, SignalKind::SwitchVotingRole { role: Some(Don) })
  })
  .await;
  assert_eq!(game.night_voting().await, Some(Don));
  assert_eq!(
    game.set_night_vote(vote(doctor, peaceful)).await,
    Err(VoteError::WrongVotingRole)
  );

  cancel.cancel();
  handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelled_night_logs_only_its_own_windows() {
  let t = table(RolesConfig::preset(7, 0).unwrap()).await;
  let game = &t.game;
  let doctor = with_role(game, Doctor).await[0];
  let don = with_role(game, Don).await[0];
  let healed = with_role(game, Peaceful).await[0];

  let night = BTreeMap::from([(Doctor, Ballot::One(vote(doctor, healed)))]);
  let _bot = spawn_bot(game, night, vec![]);
  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());

  wait_for(&mut signals, is_day).await;
  // Night 2 is cut short before the doctor's window opens.
  wait_for(&mut signals, |k| {
    matches!(k, SignalKind::SwitchVotingRole { role: Some(Mafia) })
  })
  .await;
  cancel.cancel();
  assert_eq!(handle.await.unwrap(), None);

  let logs = game.night_logs().await;
  assert_eq!(logs.len(), 2);
  assert_eq!(logs[0].votes[&doctor], vec![Some(healed)]);
  assert_eq!(logs[1].number, 2);
  assert!(!logs[1].votes.contains_key(&doctor));
  assert_eq!(logs[1].votes[&don], vec![None]);
}

#[tokio::test(start_paused = true)]
async fn night_victim_spectates_after_last_word() {
  let t = table(RolesConfig::preset(7, 0).unwrap()).await;
  let game = &t.game;
  let mafia = with_role(game, Mafia).await[0];
  let victim = with_role(game, Peaceful).await[0];

  let night = BTreeMap::from([(Mafia, Ballot::One(vote(mafia, victim)))]);
  let _bot = spawn_bot(game, night, vec![]);
  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());

  wait_for(&mut signals, is_day).await;
  let dead = game.dead_players().await;
  assert_eq!(dead[0].player.id, victim);
  assert_eq!(dead[0].player.life_status, LifeStatus::Dead);

  let last_word = GameOptions::default().timings.last_word();
  tokio::time::sleep(last_word + Duration::from_secs(1)).await;
  let dead = game.dead_players().await;
  assert_eq!(dead[0].player.life_status, LifeStatus::Spectating);

  cancel.cancel();
  handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_night_finishes_promptly() {
  let t = table(RolesConfig::preset(9, 0).unwrap()).await;
  let game = &t.game;
  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());

  wait_for(&mut signals, |k| {
    matches!(k, SignalKind::SwitchVotingRole { role: Some(_) })
  })
  .await;
  cancel.cancel();

  let outcome = tokio::time::timeout(Duration::from_millis(1), handle)
    .await
    .expect("run returns without waiting on any deadline")
    .unwrap();
  assert_eq!(outcome, None);
  assert_eq!(game.state().await, State::Finish);
  assert!(game.night_voting().await.is_none());
  assert!(game.ended_at().await.is_some());
  wait_for(&mut signals, |k| matches!(k, SignalKind::Finish)).await;
}

// ─── Whole games ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn peaceful_team_wins_by_day_vote() {
  let config = RolesConfig::preset(5, 1).unwrap();
  let storage = Arc::new(MemoryStorage::default());
  let t = register(
    Game::with_storage(GameOptions::default(), Arc::clone(&storage)),
    &config,
  )
  .await;
  t.game.init(config).await.unwrap();
  let game = &t.game;
  let mafia = with_role(game, Mafia).await[0];
  let peaceful = with_role(game, Peaceful).await;

  let night = BTreeMap::from([(Mafia, Ballot::One(vote(mafia, peaceful[0])))]);
  let day = vec![
    vote(peaceful[1], mafia),
    vote(peaceful[2], mafia),
    vote(peaceful[3], mafia),
  ];
  let bot = spawn_bot(game, night, day);
  let cancel = CancellationToken::new();

  let log = game.run(cancel.clone()).await.unwrap().expect("finish log");
  assert_eq!(log.winner_team, Some(Team::Peaceful));
  assert!(!log.is_fool);
  assert_eq!(log.total_nights, 1);

  let day_log = &game.day_logs().await[0];
  assert_eq!(day_log.kicked, Some(mafia));
  assert_eq!(day_log.votes.len(), 2);

  let dead = game.dead_players().await;
  assert_eq!(dead.len(), 2);
  assert_eq!(dead[1].reason, DeadReason::KilledByDayVoting);
  assert_eq!(game.state().await, State::Finish);

  let signals = bot.await.unwrap();
  let finishes = signals
    .iter()
    .filter(|s| matches!(s.kind, SignalKind::Finish))
    .count();
  assert_eq!(finishes, 1);

  // The finish sequence runs once; later attempts see the first outcome.
  cancel.cancel();
  assert_eq!(game.finish_anyway().await, Some(log));
  assert_eq!(storage.events(), vec![
    "init Starting",
    "night 1",
    "day 1",
    "finish Finish",
  ]);
}

#[tokio::test(start_paused = true)]
async fn fool_wins_when_voted_out() {
  let config = RolesConfig::new(5, [(Peaceful, 3), (Fool, 1), (Mafia, 1)]);
  let t = table(config).await;
  let game = &t.game;
  let mafia = with_role(game, Mafia).await[0];
  let fool = with_role(game, Fool).await[0];
  let peaceful = with_role(game, Peaceful).await;

  let night = BTreeMap::from([(
    Mafia,
    Ballot::One(OneVote::empty(PlayerRef::in_game(mafia))),
  )]);
  let day = peaceful.iter().map(|p| vote(*p, fool)).collect();
  let _bot = spawn_bot(game, night, day);

  let log = game
    .run(CancellationToken::new())
    .await
    .unwrap()
    .expect("finish log");
  assert!(log.is_fool);
  assert_eq!(log.winner_team, None);
  assert!(t.main.messages().iter().any(|m| m.contains("fool")));
}

#[tokio::test(start_paused = true)]
async fn nobody_voting_keeps_the_game_going() {
  let t = table(RolesConfig::preset(5, 1).unwrap()).await;
  let game = &t.game;
  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());

  // Two full rounds pass on deadlines alone.
  for _ in 0..3 {
    wait_for(&mut signals, |k| {
      matches!(k, SignalKind::SwitchState { new: State::Night, .. })
    })
    .await;
  }
  assert_eq!(game.night_counter().await, 3);
  let days = game.day_logs().await;
  assert_eq!(days.len(), 2);
  assert!(days.iter().all(|d| d.is_skip && d.kicked.is_none()));
  assert!(game.dead_players().await.is_empty());

  cancel.cancel();
  assert_eq!(handle.await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn finished_game_keeps_its_dead_as_dead() {
  let t = table(RolesConfig::preset(5, 1).unwrap()).await;
  let game = &t.game;
  let mafia = with_role(game, Mafia).await[0];
  let peaceful = with_role(game, Peaceful).await;

  let night = BTreeMap::from([(Mafia, Ballot::One(vote(mafia, peaceful[0])))]);
  let day = peaceful[1..].iter().map(|p| vote(*p, mafia)).collect();
  let _bot = spawn_bot(game, night, day);

  let log = game
    .run(CancellationToken::new())
    .await
    .unwrap()
    .expect("finish log");
  assert_eq!(log.winner_team, Some(Team::Peaceful));

  // The night victim's last word runs out after the finish.
  tokio::time::sleep(GameOptions::default().timings.last_word() * 2).await;
  let dead = game.dead_players().await;
  assert_eq!(dead[0].player.id, peaceful[0]);
  assert_eq!(dead[0].player.life_status, LifeStatus::Dead);
}

// ─── Reincarnation ───────────────────────────────────────────────────────────

fn seated(roles: &[RoleKind]) -> Roster {
  let mut roster = Roster::default();
  for (i, (participant, role)) in participants(roles.len()).into_iter().zip(roles).enumerate() {
    let id = PlayerId(i as u8 + 1);
    roster.active.insert(id, Player::new(id, participant, *role));
  }
  roster
}

#[test]
fn don_is_promoted_once_the_family_is_down_to_one() {
  let config = RolesConfig::new(4, [(Peaceful, 2), (Mafia, 1), (Don, 1)]);
  let mut roster = seated(&[Peaceful, Peaceful, Mafia, Don]);
  let (mafia, don) = (PlayerId(3), PlayerId(4));

  assert!(reincarnate(&mut roster, &config).is_empty());
  assert_eq!(roster.get(don).unwrap().role, Don);

  roster.to_dead(mafia, DeadReason::KilledByDayVoting, 1);
  assert_eq!(reincarnate(&mut roster, &config), vec![don]);
  assert_eq!(roster.get(don).unwrap().role, Mafia);

  assert!(reincarnate(&mut roster, &config).is_empty());
  assert_eq!(roster.get(don).unwrap().role, Mafia);
}

#[test]
fn lone_don_stays_don_without_mafia_in_the_config() {
  let config = RolesConfig::new(3, [(Peaceful, 2), (Don, 1)]);
  let mut roster = seated(&[Peaceful, Peaceful, Don]);
  assert!(reincarnate(&mut roster, &config).is_empty());
  assert_eq!(roster.get(PlayerId(3)).unwrap().role, Don);
}

// ─── Failure paths ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn run_before_init_is_fatal() {
  let game = Arc::new(Game::new(GameOptions::default()));
  let mut signals = game.subscribe();
  assert_eq!(game.run(CancellationToken::new()).await.unwrap(), None);
  let fatal = wait_for(&mut signals, |k| matches!(k, SignalKind::Fatal(_))).await;
  assert!(matches!(
    fatal.kind,
    SignalKind::Fatal(ref e) if matches!(**e, Error::NotInitialised)
  ));
  assert!(matches!(signals.recv().await, Err(RecvError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn running_twice_is_fatal() {
  let t = table(RolesConfig::preset(5, 1).unwrap()).await;
  let game = &t.game;
  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let first = game.run(cancel.clone());
  wait_for(&mut signals, |k| {
    matches!(k, SignalKind::SwitchState { new: State::Night, .. })
  })
  .await;

  assert_eq!(game.run(cancel.clone()).await.unwrap(), None);
  let fatal = wait_for(&mut signals, |k| matches!(k, SignalKind::Fatal(_))).await;
  assert!(matches!(
    fatal.kind,
    SignalKind::Fatal(ref e) if matches!(**e, Error::AlreadyStarted)
  ));

  cancel.cancel();
  assert_eq!(first.await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn delivery_failures_are_signalled_not_fatal() {
  let config = RolesConfig::preset(5, 1).unwrap();
  let game = Arc::new(Game::new(GameOptions::default()));
  game.set_main_channel(RecordingSink::failing("main")).await.unwrap();
  game.set_role_channel(Mafia, RecordingSink::new("m")).await.unwrap();
  game.set_start_players(participants(5)).await.unwrap();
  game.init(config).await.unwrap();

  let mut signals = game.subscribe();
  let cancel = CancellationToken::new();
  let handle = game.run(cancel.clone());
  let error = wait_for(&mut signals, |k| matches!(k, SignalKind::Error(_))).await;
  assert!(matches!(
    error.kind,
    SignalKind::Error(ref e) if matches!(**e, Error::Delivery(_))
  ));
  wait_for(&mut signals, is_day).await;

  cancel.cancel();
  handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn panicking_game_task_finishes_anyway() {
  let config = RolesConfig::preset(5, 1).unwrap();
  let t = register(
    Game::with_storage(GameOptions::default(), PanickingStorage),
    &config,
  )
  .await;
  t.game.init(config).await.unwrap();
  let mut signals = t.game.subscribe();

  let outcome = t.game.run(CancellationToken::new()).await.unwrap();
  assert_eq!(outcome, None);
  assert_eq!(t.game.state().await, State::Finish);

  let error = wait_for(&mut signals, |k| matches!(k, SignalKind::Error(_))).await;
  assert!(matches!(
    error.kind,
    SignalKind::Error(ref e) if matches!(&**e, Error::Panicked(m) if m.contains("disk on fire"))
  ));
}

// ─── Renaming & storage ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn players_are_renamed_and_restored() {
  let config = RolesConfig::preset(5, 1).unwrap();
  let rename = Arc::new(RecordingRename::default());
  let options = GameOptions {
    rename_mode: RenameMode::OnlyInMainChannel,
    ..GameOptions::default()
  };
  let game = Game::new(options).with_rename_provider(rename.clone());
  let t = register(game, &config).await;
  t.game.init(config).await.unwrap();

  let first = t.game.active_players().await.remove(0);
  assert_eq!(first.participant.nick, "1. user1");
  assert!(rename.renames.lock().unwrap().contains(&(
    Some("main".to_owned()),
    "tag1".to_owned(),
    "1. user1".to_owned()
  )));

  let cancel = CancellationToken::new();
  cancel.cancel();
  assert_eq!(t.game.run(cancel).await.unwrap(), None);

  let renames = rename.renames.lock().unwrap();
  assert_eq!(renames.len(), 10);
  assert_eq!(
    renames.last().unwrap(),
    &(Some("main".to_owned()), "tag5".to_owned(), "user5".to_owned())
  );
}

#[tokio::test(start_paused = true)]
async fn renames_run_without_the_state_lock() {
  let config = RolesConfig::preset(5, 1).unwrap();
  let rename = Arc::new(LockWatchingRename::default());
  let options = GameOptions {
    rename_mode: RenameMode::InGuild,
    ..GameOptions::default()
  };
  let game = Game::new(options).with_rename_provider(rename.clone());
  let t = register(game, &config).await;
  assert!(rename.game.set(Arc::downgrade(&t.game)).is_ok());
  t.game.init(config).await.unwrap();

  let cancel = CancellationToken::new();
  cancel.cancel();
  t.game.run(cancel).await.unwrap();

  let unlocked = rename.unlocked.lock().unwrap();
  assert_eq!(unlocked.len(), 10);
  assert!(unlocked.iter().all(|free| *free));
}

#[tokio::test]
async fn naming_reaches_storage() {
  let storage = Arc::new(MemoryStorage::default());
  let game = Game::with_storage(GameOptions::default(), Arc::clone(&storage));
  game.set_name("friday night").await;
  assert_eq!(game.snapshot().await.name.as_deref(), Some("friday night"));
  assert_eq!(storage.events(), vec!["name friday night"]);
}

#[tokio::test]
async fn snapshot_is_detached() {
  let t = table(RolesConfig::preset(5, 1).unwrap()).await;
  let snapshot = t.game.snapshot().await;
  assert_eq!(snapshot.id, t.game.id());
  assert_eq!(snapshot.state, State::Starting);
  assert_eq!(snapshot.roster.active.len(), 5);
  assert!(snapshot.roles_config.is_some());
}
