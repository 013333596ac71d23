//! The orchestration engine for the mafia rules.
//!
//! [`Game`] owns one game from registration to finish. After [`Game::init`],
//! [`Game::run`] drives alternating nights and days on a background task
//! while the host submits votes through [`Game::set_night_vote`],
//! [`Game::set_night_two_vote`] and [`Game::set_day_vote`], and follows the
//! game through the signal stream from [`Game::subscribe`].

mod day;
mod effects;
mod game;
mod messenger;
mod night;
mod reincarnation;
mod run;
mod timer;

pub mod error;
pub mod options;
pub mod signal;

pub use error::{Error, Result};
pub use game::Game;
pub use options::GameOptions;
pub use signal::{Signal, SignalKind};

#[cfg(test)]
mod tests;
