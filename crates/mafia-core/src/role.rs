//! The static role catalog.
//!
//! Roles are interned: a player holds a [`RoleKind`] and the immutable
//! [`Role`] description is looked up in a side table. Equality and map keys
//! always go through the kind, never through the table entry.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

// ─── Teams ───────────────────────────────────────────────────────────────────

/// A win grouping. All living players on one team means that team won.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Team {
  Peaceful,
  Mafia,
  Maniac,
}

// ─── Night actions ───────────────────────────────────────────────────────────

/// What a role does with the target(s) its cohort settled on for the night.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightAction {
  /// No night window at all.
  None,
  /// Silences the target for the rest of the night.
  Mute,
  /// Learns whether the target is the detective.
  FindDetective,
  /// Learns whether two targets play for the same team.
  CompareTeams,
  /// Shields the target from kills this night.
  Protect,
  /// Kills the target unless someone protected them.
  Kill,
}

// ─── Role kind ───────────────────────────────────────────────────────────────

/// Interned handle into the role catalog.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
pub enum RoleKind {
  Peaceful,
  Fool,
  Whore,
  Don,
  Mafia,
  Maniac,
  Detective,
  Citizen,
  Doctor,
}

impl RoleKind {
  /// The immutable catalog entry for this kind.
  pub fn role(self) -> &'static Role { &CATALOG[self as usize] }

  pub fn team(self) -> Team { self.role().team }

  pub fn night_vote_order(self) -> Option<u8> { self.role().night_vote_order }

  pub fn is_two_votes(self) -> bool { self.role().is_two_votes }

  /// Number of vote entries a player of this role records per night.
  pub fn votes_per_night(self) -> usize {
    if self.is_two_votes() { 2 } else { 1 }
  }

  pub fn acts_at_night(self) -> bool { self.night_vote_order().is_some() }

  /// Parse a role by name, case-insensitively.
  pub fn parse(name: &str) -> crate::Result<Self> {
    RoleKind::iter()
      .find(|kind| kind.role().name.eq_ignore_ascii_case(name.trim()))
      .ok_or_else(|| crate::Error::UnknownRole(name.to_owned()))
  }

  /// All roles that open a voting window at night, in catalog order.
  pub fn night_roles() -> impl Iterator<Item = RoleKind> {
    RoleKind::iter().filter(|kind| kind.acts_at_night())
  }
}

// ─── Role ────────────────────────────────────────────────────────────────────

/// Immutable catalog entry. Never copied into players, never mutated.
#[derive(Debug)]
pub struct Role {
  pub kind:               RoleKind,
  pub name:               &'static str,
  pub team:               Team,
  /// Position in the global night voting sequence; `None` means the role
  /// never opens a window.
  pub night_vote_order:   Option<u8>,
  /// Apply the effect as soon as the window closes instead of after all
  /// roles have voted.
  pub urgent_calculation: bool,
  /// Position among deferred effects; `0` means no deferred effect.
  pub calculation_order:  u8,
  pub is_two_votes:       bool,
  pub action:             NightAction,
  pub description:        &'static str,
}

impl Role {
  pub fn is_deferred(&self) -> bool {
    self.calculation_order > 0 && !self.urgent_calculation
  }
}

/// The catalog, indexed by `RoleKind` discriminant. Night vote orders are
/// unique across the table.
pub static CATALOG: [Role; 9] = [
  Role {
    kind:               RoleKind::Peaceful,
    name:               "Peaceful",
    team:               Team::Peaceful,
    night_vote_order:   None,
    urgent_calculation: false,
    calculation_order:  0,
    is_two_votes:       false,
    action:             NightAction::None,
    description:        "An ordinary resident. Sleeps at night, votes by day.",
  },
  Role {
    kind:               RoleKind::Fool,
    name:               "Fool",
    team:               Team::Peaceful,
    night_vote_order:   None,
    urgent_calculation: false,
    calculation_order:  0,
    is_two_votes:       false,
    action:             NightAction::None,
    description:        "Wins alone if the town votes them out during the day.",
  },
  Role {
    kind:               RoleKind::Whore,
    name:               "Whore",
    team:               Team::Peaceful,
    night_vote_order:   Some(1),
    urgent_calculation: true,
    calculation_order:  0,
    is_two_votes:       false,
    action:             NightAction::Mute,
    description:        "Visits a player at night; the visited player cannot act until morning.",
  },
  Role {
    kind:               RoleKind::Don,
    name:               "Don",
    team:               Team::Mafia,
    night_vote_order:   Some(2),
    urgent_calculation: true,
    calculation_order:  0,
    is_two_votes:       false,
    action:             NightAction::FindDetective,
    description:        "Leads the mafia and hunts for the detective every night.",
  },
  Role {
    kind:               RoleKind::Mafia,
    name:               "Mafia",
    team:               Team::Mafia,
    night_vote_order:   Some(3),
    urgent_calculation: false,
    calculation_order:  2,
    is_two_votes:       false,
    action:             NightAction::Kill,
    description:        "Chooses a victim together with the rest of the family.",
  },
  Role {
    kind:               RoleKind::Maniac,
    name:               "Maniac",
    team:               Team::Maniac,
    night_vote_order:   Some(4),
    urgent_calculation: false,
    calculation_order:  2,
    is_two_votes:       false,
    action:             NightAction::Kill,
    description:        "Plays alone and kills one player every night.",
  },
  Role {
    kind:               RoleKind::Detective,
    name:               "Detective",
    team:               Team::Peaceful,
    night_vote_order:   Some(5),
    urgent_calculation: true,
    calculation_order:  0,
    is_two_votes:       true,
    action:             NightAction::CompareTeams,
    description:        "Picks two players each night and learns whether they share a team.",
  },
  Role {
    kind:               RoleKind::Citizen,
    name:               "Citizen",
    team:               Team::Peaceful,
    night_vote_order:   Some(6),
    urgent_calculation: false,
    calculation_order:  1,
    is_two_votes:       false,
    action:             NightAction::Protect,
    description:        "Stands guard over one player during the night.",
  },
  Role {
    kind:               RoleKind::Doctor,
    name:               "Doctor",
    team:               Team::Peaceful,
    night_vote_order:   Some(7),
    urgent_calculation: false,
    calculation_order:  1,
    is_two_votes:       false,
    action:             NightAction::Protect,
    description:        "Heals one player each night, undoing any kill on them.",
  },
];
