//! Per-profile mod enablement.
//!
//! Stored as JSON keyed by profile, then by lower-cased mod identifier:
//!
//! ```json
//! {
//!   "default": { "minimap": false },
//!   "pvp": { "zoom": false }
//! }
//! ```
//!
//! A mod missing from the file is enabled. Only explicit `false` entries
//! disable anything, so upgrading the loader never silently drops mods.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct EnabledFile {
    profiles: BTreeMap<String, BTreeMap<String, bool>>,
}

/// Session filter supplied on the command line.
#[derive(Debug, Clone)]
struct SessionFilter {
    profile: String,
    identifiers: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EnabledSet {
    path: Option<PathBuf>,
    profiles: BTreeMap<String, BTreeMap<String, bool>>,
    filter: Option<SessionFilter>,
}

impl EnabledSet {
    /// An empty, unbacked set. Everything is enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. Missing or malformed files yield an empty set bound to
    /// `path`, so a broken file never disables mods.
    pub fn load(path: &Path) -> Self {
        let mut set = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };

        if !path.exists() {
            return set;
        }

        match fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| Ok(serde_json::from_str::<EnabledFile>(&content)?))
        {
            Ok(file) => {
                set.profiles = file
                    .profiles
                    .into_iter()
                    .map(|(profile, mods)| {
                        let mods = mods
                            .into_iter()
                            .map(|(id, enabled)| (id.to_lowercase(), enabled))
                            .collect();
                        (profile, mods)
                    })
                    .collect();
            }
            Err(e) => {
                log::warn!(
                    "Error reading enabled mods list {}, using defaults: {}",
                    path.display(),
                    e
                );
            }
        }

        set
    }

    /// Restrict this session to `identifiers` for `profile`.
    ///
    /// While a filter is active nothing is persisted, so a one-off command line
    /// selection never overwrites the saved choices.
    pub fn apply_filter(&mut self, profile: &str, identifiers: Option<&[String]>) {
        self.filter = identifiers.map(|ids| SessionFilter {
            profile: profile.to_string(),
            identifiers: ids.iter().map(|id| id.to_lowercase()).collect(),
        });

        if let Some(filter) = &self.filter {
            log::info!(
                "Mod filter active for profile '{}': {:?}",
                filter.profile,
                filter.identifiers
            );
        }
    }

    pub fn save_allowed(&self) -> bool {
        self.filter.is_none()
    }

    /// Whether `identifier` is enabled under `profile`. Unknown mods are enabled.
    pub fn is_enabled(&self, profile: &str, identifier: &str) -> bool {
        let identifier = identifier.to_lowercase();

        if let Some(filter) = &self.filter {
            if filter.profile == profile {
                return filter.identifiers.contains(&identifier);
            }
        }

        self.profiles
            .get(profile)
            .and_then(|mods| mods.get(&identifier))
            .copied()
            .unwrap_or(true)
    }

    /// Record an explicit choice. Returns whether the stored value changed.
    pub fn set_enabled(&mut self, profile: &str, identifier: &str, enabled: bool) -> bool {
        let previous = self
            .profiles
            .entry(profile.to_string())
            .or_default()
            .insert(identifier.to_lowercase(), enabled);
        previous != Some(enabled)
    }

    /// Profiles with at least one recorded choice.
    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Write the set back to its file, atomically.
    pub fn save(&self) -> Result<()> {
        if !self.save_allowed() {
            log::warn!("Not saving enabled mods list, a session filter is active");
            return Ok(());
        }

        let path = self
            .path
            .as_ref()
            .context("Enabled mods list has no backing file")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create enabled mods directory")?;
        }

        let file = EnabledFile {
            profiles: self.profiles.clone(),
        };
        let content =
            serde_json::to_string_pretty(&file).context("Failed to serialize enabled mods")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Load, apply `mutate`, and store in one step.
    pub fn update<F>(path: &Path, mutate: F) -> Result<Self>
    where
        F: FnOnce(&mut EnabledSet),
    {
        let mut set = Self::load(path);
        mutate(&mut set);
        set.save()?;
        Ok(set)
    }
}
