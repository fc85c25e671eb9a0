//! Mod Loader
//!
//! Discovers extension packages, stages their hooks, injects them into the
//! host class loader and walks the host through its startup phases.
//!
//! # Overview
//!
//! Loading happens in the phases of [`startup::StartupState`], driven by
//! [`bootstrap::LoaderCore`]:
//!
//! 1. **PREPARE** - create the config folder and open the persistent log.
//! 2. **PREINIT** - load the enabled set, discover packages, resolve version
//!    conflicts and queue tweaks and transformers with the host.
//! 3. **BEGINGAME** - the host starts; hooks are now live.
//! 4. **INIT** - inject winning packages and discover extension classes.
//! 5. **POSTINIT** / **DONE** - record what was loaded.
//!
//! # Package Layout
//!
//! A package is an archive (`.ext`, optionally `.jar` / `.zip`) or a directory:
//!
//! ```text
//! minimap-3.2.ext
//! ├── extension.json          # Descriptor: name, revision, formatVersion, hooks
//! ├── META-INF/MANIFEST.MF    # Optional: TweakClass, TweakOrder, Class-Path
//! └── com/example/ModMinimap.class
//! ```
//!
//! # Folders
//!
//! Everything lives under the game directory, see [`LoaderPaths`]:
//!
//! ```text
//! <game>/mods/                 # Packages for every host version
//! <game>/mods/1.7.2/           # Packages pinned to one host version
//! <game>/modconfig/modkit.log
//! <game>/modconfig/modkit.properties
//! <game>/modconfig/modkit.profiles.json
//! ```

pub mod bootstrap;
pub mod classes;
pub mod discovery;
pub mod enabled;
pub mod error;
pub mod hooks;
pub mod manifest;
pub mod package;
pub mod properties;
pub mod startup;
pub mod version;

use std::path::{Path, PathBuf};

use version::VersionRecord;

pub use bootstrap::{LoaderCore, LoaderSnapshot};
pub use discovery::{Discoverer, DiscoverySettings};
pub use enabled::EnabledSet;
pub use package::{ExtensionPackage, PackageOrigin};

/// Locations derived from the game directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderPaths {
    pub game_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub versioned_mods_dir: PathBuf,
    pub config_dir: PathBuf,
    pub log_file: PathBuf,
    pub properties_file: PathBuf,
    pub enabled_file: PathBuf,
}

impl LoaderPaths {
    /// Derive every location for `game_dir` and the host release of `version`.
    pub fn new(game_dir: &Path, version: &VersionRecord) -> Self {
        let mods_dir = game_dir.join("mods");
        let config_dir = game_dir.join("modconfig");

        Self {
            game_dir: game_dir.to_path_buf(),
            versioned_mods_dir: mods_dir.join(version.host_version),
            mods_dir,
            log_file: config_dir.join("modkit.log"),
            properties_file: config_dir.join("modkit.properties"),
            enabled_file: config_dir.join("modkit.profiles.json"),
            config_dir,
        }
    }
}

/// Launch arguments supplied by the host.
#[derive(Debug, Clone)]
pub struct LaunchEnvironment {
    pub game_dir: PathBuf,
    /// Profile that enablement choices are recorded under
    pub profile: String,
    /// Host class path, in order
    pub class_path: Vec<PathBuf>,
    /// Where the loader's own classes were loaded from, if known
    pub code_source: Option<PathBuf>,
    /// Command-line mod filter; restricts the session to these identifiers
    pub mod_filter: Option<Vec<String>>,
    /// Whether tweaks may be queued at all
    pub load_tweaks: bool,
    /// Loader release to behave as
    pub version: VersionRecord,
}

impl LaunchEnvironment {
    pub fn new(game_dir: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            game_dir: game_dir.into(),
            profile: profile.into(),
            class_path: Vec::new(),
            code_source: None,
            mod_filter: None,
            load_tweaks: true,
            version: *VersionRecord::current(),
        }
    }

    pub fn with_class_path(mut self, class_path: Vec<PathBuf>) -> Self {
        self.class_path = class_path;
        self
    }

    pub fn with_code_source(mut self, code_source: impl Into<PathBuf>) -> Self {
        self.code_source = Some(code_source.into());
        self
    }

    pub fn with_mod_filter(mut self, mods: Vec<String>) -> Self {
        self.mod_filter = Some(mods);
        self
    }

    pub fn with_version(mut self, version: VersionRecord) -> Self {
        self.version = version;
        self
    }

    pub fn paths(&self) -> LoaderPaths {
        LoaderPaths::new(&self.game_dir, &self.version)
    }
}
