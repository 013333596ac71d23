//! The `GameStorage` trait: an optional history sink.
//!
//! Every method receives an owned snapshot, so backends never observe the game
//! mid-mutation. Failures are reported by the engine as error signals and
//! never hold up the game.

use std::{convert::Infallible, future::Future, sync::Arc};

use uuid::Uuid;

use crate::{
  log::{DayLog, FinishLog, NightLog},
  snapshot::GameSnapshot,
};

pub trait GameStorage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Called once after initialisation.
  fn init_new_game(
    &self,
    game: GameSnapshot,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_night_log(
    &self,
    game: GameSnapshot,
    log: NightLog,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_day_log(
    &self,
    game: GameSnapshot,
    log: DayLog,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_finish_log(
    &self,
    game: GameSnapshot,
    log: FinishLog,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Attach a human-readable name to a stored game.
  fn name_game(
    &self,
    game_id: Uuid,
    name: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Storage that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStorage;

impl GameStorage for NoStorage {
  type Error = Infallible;

  async fn init_new_game(&self, _: GameSnapshot) -> Result<(), Infallible> {
    Ok(())
  }

  async fn save_night_log(
    &self,
    _: GameSnapshot,
    _: NightLog,
  ) -> Result<(), Infallible> {
    Ok(())
  }

  async fn save_day_log(
    &self,
    _: GameSnapshot,
    _: DayLog,
  ) -> Result<(), Infallible> {
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

impl<S: GameStorage> GameStorage for Arc<S> {
  type Error = S::Error;

  fn init_new_game(
    &self,
    game: GameSnapshot,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    (**self).init_new_game(game)
  }

  fn save_night_log(
    &self,
    game: GameSnapshot,
    log: NightLog,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    (**self).save_night_log(game, log)
  }

  fn save_day_log(
    &self,
    game: GameSnapshot,
    log: DayLog,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    (**self).save_day_log(game, log)
  }

  fn save_finish_log(
    &self,
    game: GameSnapshot,
    log: FinishLog,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    (**self).save_finish_log(game, log)
  }

  fn name_game(
    &self,
    game_id: Uuid,
    name: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    (**self).name_game(game_id, name)
  }
}
