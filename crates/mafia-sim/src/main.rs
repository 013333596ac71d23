//! `mafia-sim`: plays one full game of mafia in the terminal with random bots.
//!
//! Reads `mafia.toml` (or the path given with `--config`) plus `MAFIA_`
//! environment variables, prints every channel to stdout and optionally
//! records the game history in SQLite.
//!
//! # Usage
//!
//! ```
//! mafia-sim --players 8 --preset 1 --store games.sqlite
//! ```

mod bots;
mod console;
mod settings;


use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use mafia_core::{
  channel::RenameMode, config::RolesConfig, log::FinishLog,
  player::Participant, storage::GameStorage,
};
use mafia_engine::Game;
use mafia_store_sqlite::SqliteStore;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use console::{ConsoleChannel, ConsoleRename};
use settings::Settings;

#[derive(Parser)]
#[command(author, version, about = "Plays a game of mafia with random bots")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "mafia.toml")]
  config: PathBuf,

  /// Number of players; overrides the config file.
  #[arg(short, long)]
  players: Option<usize>,

  /// Preset index for the player count; overrides the config file.
  #[arg(long)]
  preset: Option<usize>,

  /// SQLite file to record the game in.
  #[arg(long, env = "MAFIA_STORE")]
  store: Option<PathBuf>,

  /// List the presets for the player count and exit.
  #[arg(long)]
  list_presets: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut settings = Settings::load(cli.config)?;
  if let Some(players) = cli.players {
    settings.players = players;
  }
  if let Some(preset) = cli.preset {
    settings.preset = preset;
  }
  if cli.store.is_some() {
    settings.store_path = cli.store;
  }

  if cli.list_presets {
    for (index, preset) in RolesConfig::presets(settings.players).iter().enumerate() {
      let roles: Vec<String> = preset
        .roles
        .iter()
        .map(|(kind, count)| format!("{count}x {kind}"))
        .collect();
      println!("#{index}: {}", roles.join(", "));
    }
    return Ok(());
  }

  let roles = settings.roles_config()?;

  let outcome = match &settings.store_path {
    Some(path) => {
      let store = SqliteStore::open(path)
        .await
        .with_context(|| format!("failed to open store at {path:?}"))?;
      let store = Arc::new(store);
      let game = Game::with_storage(settings.game.clone(), Arc::clone(&store));
      let outcome = play(game, &settings, roles).await?;
      report_history(&store).await?;
      outcome
    }
    None => play(Game::new(settings.game.clone()), &settings, roles).await?,
  };

  match outcome {
    Some(log) if log.is_fool => tracing::info!(nights = log.total_nights, "the fool won"),
    Some(log) => match log.winner_team {
      Some(team) => tracing::info!(%team, nights = log.total_nights, "game won"),
      None => tracing::info!(nights = log.total_nights, "draw"),
    },
    None => tracing::info!("game stopped before a winner was known"),
  }
  Ok(())
}

/// Register console channels and bots, then run the game to the end.
async fn play<S: GameStorage + 'static>(
  game: Game<S>,
  settings: &Settings,
  roles: RolesConfig,
) -> anyhow::Result<Option<FinishLog>> {
  let game = if settings.game.rename_mode == RenameMode::NotRename {
    game
  } else {
    game.with_rename_provider(Arc::new(ConsoleRename))
  };
  let game = Arc::new(game);

  game
    .set_main_channel(Arc::new(ConsoleChannel::new("town")))
    .await?;
  for role in roles.get_order_to_vote() {
    let channel = ConsoleChannel::new(role.to_string().to_lowercase());
    game.set_role_channel(role, Arc::new(channel)).await?;
  }
  let players = (1..=settings.players)
    .map(|n| Participant::new(format!("bot-{n}"), format!("bot{n}"), format!("Bot {n}")))
    .collect();
  game.set_start_players(players).await?;

  game.init(roles).await.context("failed to initialise the game")?;
  if let Some(name) = &settings.name {
    game.set_name(name.clone()).await;
  }
  tracing::info!(game_id = %game.id(), players = settings.players, "game ready");

  let bots = bots::spawn(Arc::clone(&game));

  let cancel = CancellationToken::new();
  let on_ctrl_c = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::info!("interrupted, stopping the game");
      on_ctrl_c.cancel();
    }
  });

  let outcome = game.run(cancel).await.context("game task failed")?;
  bots.await.context("bot task failed")?;
  Ok(outcome)
}

async fn report_history(store: &SqliteStore) -> anyhow::Result<()> {
  for game in store.list_games().await? {
    let nights = store.night_logs(game.id).await?.len();
    let days = store.day_logs(game.id).await?.len();
    tracing::info!(
      game_id = %game.id,
      name = game.name.as_deref().unwrap_or("-"),
      state = ?game.state,
      nights,
      days,
      "stored game",
    );
  }
  Ok(())
}
