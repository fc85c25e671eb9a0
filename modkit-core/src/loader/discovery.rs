//! Package and Class Discovery
//!
//! Discovery runs in two passes:
//!
//! 1. [`Discoverer::discover_packages`] (PREINIT) scans the class path for hook
//!    providers, then the mods folder and the versioned mods folder for
//!    packages. Packages sharing an identifier are resolved to a single winner
//!    and the hooks of enabled winners are staged for the host queue.
//! 2. [`Discoverer::discover_classes`] (INIT) walks the code source, the class
//!    path and every enabled winning package for extension entry points. By
//!    then those packages are on the class loader's search path.
//!
//! Which roots are searched is controlled by properties:
//!
//! | Key                | Default | Meaning                                  |
//! |--------------------|---------|------------------------------------------|
//! | `search.zipfiles`  | false   | Accept `.zip` packages                   |
//! | `search.jarfiles`  | true    | Accept `.jar` packages                   |
//! | `search.mods`      | true    | Search the mods folders                  |
//! | `search.jar`       | true    | Search the loader's own code source      |
//! | `search.classpath` | true    | Search the host class path               |

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::classes::{self, DiscoveredClass, ModClassIndex};
use super::enabled::EnabledSet;
use super::hooks::CascadedHooks;
use super::package::{ExtensionPackage, PackageOrigin};
use super::properties::LoaderProperties;
use super::version::VersionRecord;
use super::{LaunchEnvironment, LoaderPaths};
use crate::host::ClassLoader;

pub const OPTION_SEARCH_ZIPFILES: &str = "search.zipfiles";
pub const OPTION_SEARCH_JARFILES: &str = "search.jarfiles";
pub const OPTION_SEARCH_MODS: &str = "search.mods";
pub const OPTION_SEARCH_JAR: &str = "search.jar";
pub const OPTION_SEARCH_CLASSPATH: &str = "search.classpath";

/// Suffix of extension packages, always accepted.
pub const PACKAGE_SUFFIX: &str = ".ext";

/// Which search roots and package suffixes are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub read_zip_files: bool,
    pub read_jar_files: bool,
    pub search_mods_folder: bool,
    pub search_code_source: bool,
    pub search_class_path: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            read_zip_files: false,
            read_jar_files: true,
            search_mods_folder: true,
            search_code_source: true,
            search_class_path: true,
        }
    }
}

impl DiscoverySettings {
    /// Read every setting, storing defaults for missing keys.
    ///
    /// A configuration with every search root disabled is invalid and is
    /// replaced by one with every root enabled. The effective settings are
    /// written back to `properties`.
    pub fn from_properties(properties: &mut LoaderProperties) -> Self {
        let defaults = Self::default();
        let mut settings = Self {
            read_zip_files: properties
                .get_and_store_bool(OPTION_SEARCH_ZIPFILES, defaults.read_zip_files),
            read_jar_files: properties
                .get_and_store_bool(OPTION_SEARCH_JARFILES, defaults.read_jar_files),
            search_mods_folder: properties
                .get_and_store_bool(OPTION_SEARCH_MODS, defaults.search_mods_folder),
            search_code_source: properties
                .get_and_store_bool(OPTION_SEARCH_JAR, defaults.search_code_source),
            search_class_path: properties
                .get_and_store_bool(OPTION_SEARCH_CLASSPATH, defaults.search_class_path),
        };

        if !settings.search_mods_folder && !settings.search_code_source && !settings.search_class_path
        {
            log::warn!(
                "Invalid configuration, no search locations defined. Enabling all search locations."
            );
            settings.search_mods_folder = true;
            settings.search_code_source = true;
            settings.search_class_path = true;
        }

        settings.write_to(properties);
        settings
    }

    pub fn write_to(&self, properties: &mut LoaderProperties) {
        properties.set_bool(OPTION_SEARCH_ZIPFILES, self.read_zip_files);
        properties.set_bool(OPTION_SEARCH_JARFILES, self.read_jar_files);
        properties.set_bool(OPTION_SEARCH_MODS, self.search_mods_folder);
        properties.set_bool(OPTION_SEARCH_JAR, self.search_code_source);
        properties.set_bool(OPTION_SEARCH_CLASSPATH, self.search_class_path);
    }

    /// Whether a file called `file_name` may be a package. Case-insensitive.
    pub fn accepts(&self, file_name: &str) -> bool {
        let name = file_name.to_lowercase();
        name.ends_with(PACKAGE_SUFFIX)
            || (self.read_zip_files && name.ends_with(".zip"))
            || (self.read_jar_files && name.ends_with(".jar"))
    }
}

/// A package that lost conflict resolution or could not be loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedPackage {
    pub path: PathBuf,
    pub identifier: String,
    pub reason: String,
}

/// Result of the package pass.
#[derive(Debug, Default)]
pub struct DiscoveredPackages {
    /// One winner per identifier, ordered by identifier
    pub packages: Vec<ExtensionPackage>,
    /// Class path entries and tweak-only archives that provide hooks
    pub hook_providers: Vec<ExtensionPackage>,
    pub hooks: CascadedHooks,
    pub rejected: Vec<RejectedPackage>,
}

impl DiscoveredPackages {
    pub fn package(&self, identifier: &str) -> Option<&ExtensionPackage> {
        self.packages.iter().find(|p| p.identifier() == identifier)
    }

    /// The winner or hook provider located at `path`.
    pub fn provider_mut(&mut self, path: &Path) -> Option<&mut ExtensionPackage> {
        self.packages
            .iter_mut()
            .chain(self.hook_providers.iter_mut())
            .find(|p| p.path() == path)
    }
}

/// Pick one package per identifier.
///
/// Each group is ranked best first (see [`ExtensionPackage::rank_cmp`]) and the
/// best member whose format `version` accepts wins. A group without an
/// accepted member contributes nothing.
pub fn resolve_conflicts(
    candidates: Vec<ExtensionPackage>,
    version: &VersionRecord,
) -> (Vec<ExtensionPackage>, Vec<RejectedPackage>) {
    let mut groups: BTreeMap<String, Vec<ExtensionPackage>> = BTreeMap::new();
    for candidate in candidates {
        groups
            .entry(candidate.identifier().to_string())
            .or_default()
            .push(candidate);
    }

    let mut winners = Vec::new();
    let mut rejected = Vec::new();

    for (identifier, mut group) in groups {
        group.sort_by(ExtensionPackage::rank_cmp);

        let accepted = |p: &ExtensionPackage| {
            p.format_version()
                .is_some_and(|format| version.is_format_accepted(format))
        };
        let winner_index = group.iter().position(|p| accepted(p));

        let mut winner_path = None;
        if let Some(index) = winner_index {
            let winner = group.remove(index);
            log::info!(
                "Adding newest valid mod file '{}' at revision {:.4}",
                winner.path().display(),
                winner.revision()
            );
            winner_path = Some(winner.path().to_path_buf());
            winners.push(winner);
        } else {
            log::warn!("No loadable version of '{}' was found", identifier);
        }

        for loser in group {
            let reason = if !accepted(&loser) {
                format!(
                    "format version {} is not supported by loader {}",
                    loser.format_version().unwrap_or("<none>"),
                    version
                )
            } else {
                format!(
                    "superseded by {}",
                    winner_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                )
            };

            log::info!(
                "Not adding mod file '{}': {}",
                loser.path().display(),
                reason
            );
            rejected.push(RejectedPackage {
                path: loser.path().to_path_buf(),
                identifier: identifier.clone(),
                reason,
            });
        }
    }

    (winners, rejected)
}

pub struct Discoverer {
    settings: DiscoverySettings,
    paths: LoaderPaths,
    version: VersionRecord,
    class_path: Vec<PathBuf>,
    code_source: Option<PathBuf>,
    profile: String,
    load_tweaks: bool,
}

impl Discoverer {
    /// Create a discoverer for `env`, reading its settings from `properties`.
    ///
    /// The effective settings are written back and saved immediately so the
    /// properties file documents every option after the first run.
    pub fn new(env: &LaunchEnvironment, properties: &mut LoaderProperties) -> Self {
        let settings = DiscoverySettings::from_properties(properties);
        if properties.path().is_some() {
            if let Err(e) = properties.save() {
                log::warn!("Could not save discovery settings: {:#}", e);
            }
        }

        Self {
            settings,
            paths: env.paths(),
            version: env.version,
            class_path: env.class_path.clone(),
            code_source: env.code_source.clone(),
            profile: env.profile.clone(),
            load_tweaks: env.load_tweaks,
        }
    }

    pub fn settings(&self) -> &DiscoverySettings {
        &self.settings
    }

    /// Build the candidate set from every enabled search root.
    ///
    /// Disabled packages still take part in conflict resolution, but their
    /// hooks are never staged.
    pub fn discover_packages(&self, enabled: &EnabledSet) -> DiscoveredPackages {
        let mut discovered = DiscoveredPackages::default();

        if self.settings.search_class_path {
            self.find_tweaks_in_class_path(enabled, &mut discovered);
        }

        if self.settings.search_mods_folder {
            let mut candidates = Vec::new();
            let mods_dir = &self.paths.mods_dir;

            if mods_dir.is_dir() {
                log::info!("Mods folder found, searching {}", mods_dir.display());
                self.find_package_files(
                    mods_dir,
                    PackageOrigin::ModsFolder,
                    enabled,
                    &mut candidates,
                    &mut discovered,
                );

                let versioned = &self.paths.versioned_mods_dir;
                if versioned.is_dir() {
                    log::info!(
                        "Versioned mods folder found, searching {}",
                        versioned.display()
                    );
                    self.find_package_files(
                        versioned,
                        PackageOrigin::VersionedFolder,
                        enabled,
                        &mut candidates,
                        &mut discovered,
                    );
                }
            }

            let (winners, rejected) = resolve_conflicts(candidates, &self.version);
            discovered.rejected.extend(rejected);

            for winner in &winners {
                self.stage_if_enabled(winner, enabled, &mut discovered.hooks);
            }
            discovered.packages = winners;

            log::info!("Found {} mod file(s)", discovered.packages.len());
        }

        discovered
    }

    /// Class path entries that declare hooks, mainly for development setups
    /// where the hook class is compiled rather than packaged.
    fn find_tweaks_in_class_path(
        &self,
        enabled: &EnabledSet,
        discovered: &mut DiscoveredPackages,
    ) {
        log::info!("Discovering tweaks on class path...");

        for entry in &self.class_path {
            if !entry.exists() {
                continue;
            }

            let package = ExtensionPackage::open(entry, PackageOrigin::ClassPath);
            if package.has_hooks() {
                self.stage_if_enabled(&package, enabled, &mut discovered.hooks);
                discovered.hook_providers.push(package);
            }
        }
    }

    fn find_package_files(
        &self,
        folder: &Path,
        origin: PackageOrigin,
        enabled: &EnabledSet,
        candidates: &mut Vec<ExtensionPackage>,
        discovered: &mut DiscoveredPackages,
    ) {
        let entries = match fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Error listing {}: {}", folder.display(), e);
                return;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| self.settings.accepts(&n.to_string_lossy()))
            })
            .collect();
        files.sort();

        for path in files {
            let package = ExtensionPackage::open(&path, origin);

            if package.has_descriptor() {
                if package.is_valid() {
                    log::info!("Considering valid mod file: {}", package.path().display());
                    candidates.push(package);
                } else {
                    log::info!(
                        "Not adding invalid mod file: {}",
                        package.path().display()
                    );
                }
            } else if package.is_legacy() {
                log::warn!(
                    "version.txt is no longer supported, ignoring outdated mod file: {}",
                    package.path().display()
                );
            } else if origin == PackageOrigin::VersionedFolder
                && self.load_tweaks
                && self.settings.read_jar_files
                && package.file_name().to_lowercase().ends_with(".jar")
                && package.has_tweak_class()
            {
                self.stage_if_enabled(&package, enabled, &mut discovered.hooks);
                discovered.hook_providers.push(package);
            }
        }
    }

    /// Stage the hooks of `package` when tweaks are allowed and the mod is
    /// enabled for this profile.
    fn stage_if_enabled(
        &self,
        package: &ExtensionPackage,
        enabled: &EnabledSet,
        hooks: &mut CascadedHooks,
    ) {
        if !self.load_tweaks {
            return;
        }

        if package.is_enabled(enabled, &self.profile) {
            stage_hooks(package, hooks);
        } else if package.has_hooks() {
            log::info!(
                "Mod '{}' is disabled for profile '{}', not loading its hooks",
                package.identifier(),
                self.profile
            );
        }
    }

    /// Find extension entry points in the code source, the class path and
    /// `packages`, in that order.
    pub fn discover_classes<'a>(
        &self,
        loader: &dyn ClassLoader,
        packages: impl IntoIterator<Item = &'a ExtensionPackage>,
    ) -> ModClassIndex {
        let mut index = ModClassIndex::new();

        if self.settings.search_code_source || self.settings.search_class_path {
            log::info!("Discovering mods on class path...");
        }

        if self.settings.search_code_source {
            if let Some(code_source) = &self.code_source {
                log::info!("Searching code source {}...", code_source.display());
                for info in classes::find_mod_classes(code_source, loader) {
                    index.insert(DiscoveredClass::from_class_path(&info, code_source));
                }
            }
        }

        if self.settings.search_class_path {
            for entry in &self.class_path {
                log::info!("Searching {}...", entry.display());
                for info in classes::find_mod_classes(entry, loader) {
                    index.insert(DiscoveredClass::from_class_path(&info, entry));
                }
            }
        }

        for package in packages {
            log::info!("Searching {}...", package.path().display());
            for info in classes::find_mod_classes(package.path(), loader) {
                index.insert(DiscoveredClass::from_package(
                    &info,
                    package.path(),
                    package.identifier(),
                ));
            }
        }

        log::info!("Mod class discovery completed");
        index
    }
}

fn stage_hooks(package: &ExtensionPackage, hooks: &mut CascadedHooks) {
    for registration in package.hook_registrations() {
        hooks.stage(registration, package.path());
    }
}
