//! Simulator settings: a TOML file overlaid with `MAFIA_` environment
//! variables, then with command-line flags.

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context as _, bail};
use mafia_core::{config::RolesConfig, role::RoleKind};
use mafia_engine::GameOptions;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub players:    usize,
  /// Index into the built-in presets for `players`.
  pub preset:     usize,
  /// Role name to count. Overrides the preset when non-empty.
  pub roles:      BTreeMap<String, usize>,
  pub name:       Option<String>,
  /// Persist the game history here when set.
  pub store_path: Option<PathBuf>,
  pub game:       GameOptions,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      players:    7,
      preset:     0,
      roles:      BTreeMap::new(),
      name:       None,
      store_path: None,
      game:       GameOptions::default(),
    }
  }
}

impl Settings {
  pub fn load(path: PathBuf) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("MAFIA")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  /// The role combination to play: the custom `roles` table if present,
  /// otherwise the chosen preset.
  pub fn roles_config(&self) -> anyhow::Result<RolesConfig> {
    let config = if self.roles.is_empty() {
      match RolesConfig::preset(self.players, self.preset) {
        Some(config) => config,
        None => bail!(
          "no preset #{} for {} players ({} available)",
          self.preset,
          self.players,
          RolesConfig::presets(self.players).len(),
        ),
      }
    } else {
      let roles = self
        .roles
        .iter()
        .map(|(name, count)| Ok((RoleKind::parse(name)?, *count)))
        .collect::<mafia_core::Result<Vec<_>>>()?;
      RolesConfig::new(self.players, roles)
    };
    config.validate().context("invalid roles configuration")?;
    Ok(config)
  }
}
