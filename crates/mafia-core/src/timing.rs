//! Deadlines and durations.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tunable durations. Seconds on the wire, [`Duration`] in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
  /// How long one role's night voting window stays open.
  pub voting_deadline_secs:          u64,
  /// Pause after the start message so players can read their roles.
  pub role_info_secs:                u64,
  /// Band for the fake window of a role nobody can vote for.
  pub fake_voting_min_secs:          u64,
  pub fake_voting_max_secs:          u64,
  /// Delay before the newly dead become spectators.
  pub last_word_secs:                u64,
  /// Share of living players whose agreement ends the day vote early.
  pub day_percentage_to_next_stage: u32,
}

impl Default for Timings {
  fn default() -> Self {
    Self {
      voting_deadline_secs:          40,
      role_info_secs:                10,
      fake_voting_min_secs:          5,
      fake_voting_max_secs:          36,
      last_word_secs:                60,
      day_percentage_to_next_stage: 50,
    }
  }
}

impl Timings {
  pub fn voting_deadline(&self) -> Duration {
    Duration::from_secs(self.voting_deadline_secs)
  }

  pub fn role_info(&self) -> Duration {
    Duration::from_secs(self.role_info_secs)
  }

  pub fn last_word(&self) -> Duration {
    Duration::from_secs(self.last_word_secs)
  }

  /// A random duration inside the fake voting band, millisecond precision.
  pub fn fake_voting_duration<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
    let min = self.fake_voting_min_secs * 1000;
    let max = (self.fake_voting_max_secs * 1000).max(min);
    Duration::from_millis(rng.gen_range(min..=max))
  }

  /// Votes a single target needs to end the day early:
  /// `ceil(percentage × living / 100)`.
  pub fn break_down_day_players_count(&self, living: usize) -> usize {
    (self.day_percentage_to_next_stage as usize * living).div_ceil(100)
  }
}

/// Length of the day's discussion and vote. Grows with the round number, the
/// number of dead and the table size; rounded up to whole minutes.
pub fn calculate_day_deadline(
  night_counter: u32,
  dead_count: usize,
  total_players: usize,
) -> Duration {
  const NIGHT_COUNTER_WEIGHT: f64 = 0.61;
  const DEAD_COUNT_WEIGHT: f64 = 0.68;
  const TOTAL_PLAYERS_WEIGHT: f64 = 0.27;

  let minutes = NIGHT_COUNTER_WEIGHT * f64::from(night_counter)
    + DEAD_COUNT_WEIGHT * dead_count as f64
    + TOTAL_PLAYERS_WEIGHT * total_players as f64;
  Duration::from_secs(minutes.ceil() as u64 * 60)
}
