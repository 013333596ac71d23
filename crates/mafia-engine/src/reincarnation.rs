//! Role changes after a night.

use mafia_core::{
  config::RolesConfig,
  player::PlayerId,
  role::{RoleKind, Team},
  roster::Roster,
};

/// Promote a living Don who is the last of the mafia team to Mafia, so the
/// family's kill window keeps a voter. Only applies when Mafia is part of the
/// configuration. Idempotent: a promoted player is no longer a Don.
pub(crate) fn reincarnate(roster: &mut Roster, config: &RolesConfig) -> Vec<PlayerId> {
  if !config.has_role(RoleKind::Mafia) {
    return Vec::new();
  }
  let dons: Vec<PlayerId> =
    roster.living_with_role(RoleKind::Don).map(|p| p.id).collect();

  let mut promoted = Vec::new();
  for id in dons {
    if roster.living_team_count(Team::Mafia) > 1 {
      continue;
    }
    if let Some(player) = roster.get_mut(id) {
      player.role = RoleKind::Mafia;
      promoted.push(id);
    }
  }
  promoted
}
