//! Night effects. Urgent ones fire as soon as their role's window closes;
//! deferred ones resolve together after the last window, protections first.

use std::collections::BTreeSet;

use mafia_core::{
  player::{InteractionStatus, LifeStatus, PlayerId},
  role::{NightAction, RoleKind},
  roster::Roster,
};

use crate::messenger;

/// Apply an urgent role's effect. Returns the reveal for the role's channel.
pub(crate) fn apply_urgent(
  role: RoleKind,
  targets: &[Option<PlayerId>],
  roster: &mut Roster,
) -> Option<String> {
  if !role.role().urgent_calculation {
    return None;
  }
  match role.role().action {
    NightAction::Mute => {
      let player = roster.get_mut((*targets.first()?)?)?;
      player.interaction_status = InteractionStatus::Muted;
      tracing::debug!(target = %player.id, "muted");
      Some(messenger::muted(player))
    }
    NightAction::FindDetective => {
      let player = roster.get((*targets.first()?)?)?;
      Some(messenger::detective_search(
        player,
        player.role == RoleKind::Detective,
      ))
    }
    NightAction::CompareTeams => {
      let &[Some(first), Some(second)] = targets else {
        return None;
      };
      let (first, second) = (roster.get(first)?, roster.get(second)?);
      Some(messenger::compare_teams(
        first,
        second,
        first.role.team() == second.role.team(),
      ))
    }
    NightAction::None | NightAction::Protect | NightAction::Kill => None,
  }
}

/// Resolve the deferred effects of every role in `order`, ascending by
/// calculation order. Killed players are marked dead in place and returned.
pub(crate) fn apply_deferred(
  order: &[RoleKind],
  roster: &mut Roster,
) -> Vec<PlayerId> {
  let mut deferred: Vec<RoleKind> = order
    .iter()
    .copied()
    .filter(|role| role.role().is_deferred())
    .collect();
  deferred.sort_by_key(|role| (role.role().calculation_order, role.night_vote_order()));

  let mut protected = BTreeSet::new();
  let mut killed = Vec::new();
  for role in deferred {
    let Some(target) = cohort_target(roster, role) else {
      continue;
    };
    match role.role().action {
      NightAction::Protect => {
        protected.insert(target);
      }
      NightAction::Kill if protected.contains(&target) => {
        tracing::debug!(%role, %target, "kill prevented");
      }
      NightAction::Kill => {
        if let Some(player) = roster.get_mut(target) {
          player.life_status = LifeStatus::Dead;
          killed.push(target);
        }
      }
      _ => {}
    }
  }
  killed
}

/// Tonight's target of a role's cohort. Every member of the cohort is on
/// record for the same target, and players killed earlier in this resolution
/// still count.
fn cohort_target(roster: &Roster, role: RoleKind) -> Option<PlayerId> {
  roster
    .active
    .values()
    .filter(|p| p.role == role)
    .find_map(|p| p.last_night_votes().first().copied())
    .flatten()
}
