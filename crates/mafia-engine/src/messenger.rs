//! Announcement texts. Plain text; presentation layers restyle as they like.

use std::{fmt::Write as _, time::Duration};

use mafia_core::{
  config::RolesConfig,
  log::FinishLog,
  player::{Player, PlayerId},
  role::RoleKind,
};

pub fn start(config: &RolesConfig, role_info: Duration) -> String {
  let mut message = String::from("The game begins. Roles in play:\n");
  for (kind, count) in &config.roles {
    let role = kind.role();
    let _ = writeln!(message, "  {} × {}: {}", role.name, count, role.description);
  }
  let _ = write!(
    message,
    "Check your role. The first night falls in {} seconds.",
    role_info.as_secs()
  );
  message
}

pub fn night_started(night: u32) -> String {
  format!("Night {night} falls. The town goes to sleep.")
}

/// Invitation written to a role channel when its window opens.
pub fn invite<'a>(
  role: RoleKind,
  candidates: impl Iterator<Item = &'a Player>,
  deadline: Duration,
) -> String {
  let votes = if role.is_two_votes() { "two players" } else { "a player" };
  let mut message = format!(
    "{}, choose {votes} within {} seconds:\n",
    role.role().name,
    deadline.as_secs()
  );
  for player in candidates {
    let _ = writeln!(message, "  {}. {}", player.id, player.participant.nick);
  }
  message
}

pub fn muted(target: &Player) -> String {
  format!("{} will not act tonight.", target.participant.nick)
}

pub fn detective_search(target: &Player, found: bool) -> String {
  if found {
    format!("{} is the detective.", target.participant.nick)
  } else {
    format!("{} is not the detective.", target.participant.nick)
  }
}

pub fn compare_teams(first: &Player, second: &Player, same: bool) -> String {
  let verdict = if same { "play for the same team" } else { "play for different teams" };
  format!(
    "{} and {} {verdict}.",
    first.participant.nick, second.participant.nick
  )
}

pub fn after_night(night: u32, dead: &[(PlayerId, String)]) -> String {
  if dead.is_empty() {
    return format!("Night {night} is over. Everybody survived.");
  }
  let mut message = format!("Night {night} is over. The town lost:\n");
  for (id, nick) in dead {
    let _ = writeln!(message, "  {id}. {nick}");
  }
  message
}

pub fn reincarnated(player: &Player) -> String {
  format!(
    "{}, you are the last of your family and take over as mafia. Don't \
     reveal yourself.",
    player.participant.nick
  )
}

pub fn day_started(day: u32, deadline: Duration, threshold: usize) -> String {
  format!(
    "Day {day}. Discuss and vote within {} minutes; {threshold} votes for \
     one player end the vote early.",
    deadline.as_secs() / 60
  )
}

pub fn kicked(player: &Player) -> String {
  format!("The town voted out {}. {}.", player.id, player.participant.nick)
}

pub fn skipped() -> String {
  "The town could not agree. Nobody leaves today.".to_owned()
}

pub fn finished(log: &FinishLog) -> String {
  match (log.winner_team, log.is_fool) {
    (_, true) => format!(
      "The fool fooled everyone and wins after {} nights.",
      log.total_nights
    ),
    (Some(team), false) => format!(
      "Team {team} wins after {} nights.",
      log.total_nights
    ),
    (None, false) => format!(
      "Nobody is left. The game ends in a draw after {} nights.",
      log.total_nights
    ),
  }
}

pub fn suspended() -> String { "The game was stopped.".to_owned() }
