//! Loader Orchestration
//!
//! [`LoaderCore`] drives discovery, enablement and hook registration through
//! the startup phases. The host calls one method per phase, in order, passing
//! in its class loader and hook queue:
//!
//! ```text
//! prepare()          PREPARE    config folder, log file, properties
//! pre_init(l, q)     PREINIT    enabled set, packages, hooks -> queue
//! begin_game()       BEGINGAME  hooks are live
//! init(l)            INIT       inject enabled winners, scan classes
//! post_init()        POSTINIT   record loaded revisions, then DONE
//! ```
//!
//! Work failures inside a phase are logged and the host carries on without
//! the affected mods. Ordering violations are returned as [`StartupError`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::classes::{self, DiscoveredClass};
use super::discovery::{DiscoveredPackages, Discoverer};
use super::enabled::EnabledSet;
use super::error::{LoaderError, LoaderResult, StartupError};
use super::hooks::StagedHook;
use super::package::ExtensionPackage;
use super::properties::LoaderProperties;
use super::startup::{StartupState, StartupStates};
use super::{LaunchEnvironment, LoaderPaths};
use crate::host::{ClassLoader, HookQueue};
use crate::logging;

/// Read-only view of what the loader found, for UI and mod instantiation.
#[derive(Debug, Clone, Default)]
pub struct LoaderSnapshot {
    /// Winning packages, ordered by identifier
    pub packages: Vec<ExtensionPackage>,
    /// Identifier to index into `packages`
    pub by_identifier: BTreeMap<String, usize>,
    /// Identifier to descriptor metadata
    pub metadata: BTreeMap<String, BTreeMap<String, String>>,
    /// Enabled extension entry points, in discovery order
    pub mods_to_load: Vec<DiscoveredClass>,
    /// Entry points skipped because their mod is disabled. Those of disabled
    /// packages are listed by name and never loaded.
    pub disabled: Vec<DiscoveredClass>,
}

impl LoaderSnapshot {
    fn from_packages(packages: &[ExtensionPackage]) -> Self {
        let mut snapshot = Self {
            packages: packages.to_vec(),
            ..Self::default()
        };

        for (index, package) in packages.iter().enumerate() {
            snapshot
                .by_identifier
                .insert(package.identifier().to_string(), index);
            if let Some(descriptor) = package.descriptor() {
                snapshot
                    .metadata
                    .insert(package.identifier().to_string(), descriptor.meta.clone());
            }
        }

        snapshot
    }

    pub fn package(&self, identifier: &str) -> Option<&ExtensionPackage> {
        self.by_identifier
            .get(identifier)
            .and_then(|&index| self.packages.get(index))
    }

    /// Metadata value `key` of mod `identifier`, or `default`.
    pub fn meta_value(&self, identifier: &str, key: &str, default: &str) -> String {
        self.metadata
            .get(identifier)
            .and_then(|meta| meta.get(key))
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

pub struct LoaderCore {
    env: LaunchEnvironment,
    paths: LoaderPaths,
    states: StartupStates,
    properties: LoaderProperties,
    enabled: EnabledSet,
    discoverer: Option<Discoverer>,
    discovered: Option<DiscoveredPackages>,
    active_hooks: Vec<StagedHook>,
    snapshot: LoaderSnapshot,
    /// Why `prepare` failed, if it did
    disabled: Option<String>,
}

impl LoaderCore {
    pub fn new(env: LaunchEnvironment) -> Self {
        Self {
            paths: env.paths(),
            env,
            states: StartupStates::new(),
            properties: LoaderProperties::new(),
            enabled: EnabledSet::new(),
            discoverer: None,
            discovered: None,
            active_hooks: Vec::new(),
            snapshot: LoaderSnapshot::default(),
            disabled: None,
        }
    }

    pub fn environment(&self) -> &LaunchEnvironment {
        &self.env
    }

    pub fn paths(&self) -> &LoaderPaths {
        &self.paths
    }

    pub fn states(&self) -> &StartupStates {
        &self.states
    }

    pub fn current_state(&self) -> StartupState {
        self.states.current()
    }

    /// Whether `prepare` failed and the loader is inert.
    pub fn is_disabled(&self) -> bool {
        self.disabled.is_some()
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled.as_deref()
    }

    pub fn properties(&self) -> &LoaderProperties {
        &self.properties
    }

    pub fn enabled_set(&self) -> &EnabledSet {
        &self.enabled
    }

    pub fn discovered(&self) -> Option<&DiscoveredPackages> {
        self.discovered.as_ref()
    }

    /// Hooks the host accepted during PREINIT.
    pub fn active_hooks(&self) -> &[StagedHook] {
        &self.active_hooks
    }

    pub fn snapshot(&self) -> &LoaderSnapshot {
        &self.snapshot
    }

    pub fn branding(&self) -> Option<&str> {
        self.properties.branding()
    }

    /// PREPARE: create the config folder, open the log and load properties.
    ///
    /// A failure here disables the loader for the rest of the session; the
    /// later phases still advance but do nothing.
    pub fn prepare(&mut self) -> Result<(), StartupError> {
        self.states.enter(StartupState::Prepare)?;
        self.disabled = None;

        match self.prepare_work() {
            Ok(()) => {}
            Err(LoaderError::Startup(e)) => return Err(e),
            Err(e) => {
                log::error!("Loader bootstrap failed, no mods will be loaded: {}", e);
                self.disabled = Some(e.to_string());
            }
        }

        self.states.mark_completed(StartupState::Prepare)
    }

    fn prepare_work(&mut self) -> LoaderResult<()> {
        fs::create_dir_all(&self.paths.config_dir).map_err(|e| {
            LoaderError::Config(format!(
                "cannot create config folder {}: {}",
                self.paths.config_dir.display(),
                e
            ))
        })?;

        logging::attach_file(&self.paths.log_file).map_err(|e| {
            LoaderError::Config(format!(
                "cannot open log file {}: {}",
                self.paths.log_file.display(),
                e
            ))
        })?;

        self.properties = LoaderProperties::load(&self.paths.properties_file)
            .map_err(|e| LoaderError::Config(format!("{:#}", e)))?;

        log::info!(
            "modkit {} starting for host {}",
            self.env.version,
            self.env.version.host_version
        );
        if let Some(brand) = self.properties.branding() {
            log::info!("Branding: {}", brand);
        }
        Ok(())
    }

    /// Enter `state`, run `work` unless the loader is disabled, and complete
    /// `state`. Work errors are logged; ordering errors are returned.
    fn run_phase<F>(&mut self, state: StartupState, work: F) -> Result<(), StartupError>
    where
        F: FnOnce(&mut Self) -> LoaderResult<()>,
    {
        self.states.enter(state)?;

        if let Some(reason) = &self.disabled {
            log::warn!("Loader is disabled ({}), skipping {}", reason, state);
        } else {
            match work(self) {
                Ok(()) => {}
                Err(LoaderError::Startup(e)) => return Err(e),
                Err(e) => log::error!("Error during {}: {}", state, e),
            }
        }

        self.states.mark_completed(state)
    }

    /// PREINIT: load the enabled set, discover packages and queue their hooks.
    pub fn pre_init(
        &mut self,
        loader: &mut dyn ClassLoader,
        queue: &mut dyn HookQueue,
    ) -> Result<(), StartupError> {
        self.run_phase(StartupState::PreInit, |core| core.pre_init_work(loader, queue))
    }

    fn pre_init_work(
        &mut self,
        loader: &mut dyn ClassLoader,
        queue: &mut dyn HookQueue,
    ) -> LoaderResult<()> {
        self.enabled = EnabledSet::load(&self.paths.enabled_file);
        self.enabled
            .apply_filter(&self.env.profile, self.env.mod_filter.as_deref());

        let discoverer = Discoverer::new(&self.env, &mut self.properties);
        let mut discovered = discoverer.discover_packages(&self.enabled);

        let accepted = discovered.hooks.drain_into(queue);
        for hook in &accepted {
            self.inject_hook_provider(loader, &mut discovered, &hook.provider)?;
        }

        log::info!(
            "{} package(s) discovered, {} hook(s) queued",
            discovered.packages.len(),
            accepted.len()
        );

        self.snapshot = LoaderSnapshot::from_packages(&discovered.packages);
        self.active_hooks = accepted;
        self.discoverer = Some(discoverer);
        self.discovered = Some(discovered);
        Ok(())
    }

    /// Put the package providing a hook on the search path of the loader and
    /// its parent, together with its `Class-Path` entries.
    fn inject_hook_provider(
        &self,
        loader: &mut dyn ClassLoader,
        discovered: &mut DiscoveredPackages,
        provider: &Path,
    ) -> LoaderResult<()> {
        if !self.states.is_active(StartupState::PreInit) {
            return Err(StartupError::NotActive(StartupState::PreInit).into());
        }

        let Some(package) = discovered.provider_mut(provider) else {
            log::warn!("No package found for hook provider {}", provider.display());
            return Ok(());
        };

        match package.inject_into_class_path(loader, true) {
            Ok(true) => log::info!("Injected hook provider '{}'", provider.display()),
            Ok(false) => return Ok(()),
            Err(e) => {
                log::warn!(
                    "Error injecting '{}' into class path: {}",
                    provider.display(),
                    e
                );
                return Ok(());
            }
        }

        for entry in package.class_path_entries() {
            let path = self.paths.game_dir.join(entry);
            log::info!("Adding Class-Path entry: {}", entry);

            let result = loader
                .add_parent_search_path(&path)
                .and_then(|_| loader.add_search_path(&path));
            if let Err(e) = result {
                log::warn!("Error adding Class-Path entry '{}': {}", entry, e);
            }
        }

        Ok(())
    }

    /// BEGINGAME: the host has started with the queued hooks in place.
    pub fn begin_game(&mut self) -> Result<(), StartupError> {
        self.run_phase(StartupState::BeginGame, |core| {
            for hook in &core.active_hooks {
                log::info!(
                    "Active {:?}: {} from {}",
                    hook.kind(),
                    hook.class_name(),
                    hook.provider.display()
                );
            }

            if let Err(e) = core.properties.save() {
                log::warn!("Could not save loader properties: {:#}", e);
            }
            Ok(())
        })
    }

    /// INIT: inject enabled winning packages and discover the mods to load.
    pub fn init(&mut self, loader: &mut dyn ClassLoader) -> Result<(), StartupError> {
        self.run_phase(StartupState::Init, |core| core.init_work(loader))
    }

    fn init_work(&mut self, loader: &mut dyn ClassLoader) -> LoaderResult<()> {
        let (Some(discoverer), Some(discovered)) = (&self.discoverer, &mut self.discovered) else {
            log::warn!("No usable candidate set from PREINIT, nothing to initialise");
            return Ok(());
        };

        let profile = &self.env.profile;
        let enabled = &self.enabled;

        log::info!("Injecting external mods into class path...");
        for package in discovered
            .packages
            .iter_mut()
            .filter(|p| p.is_enabled(enabled, profile))
        {
            match package.inject_into_class_path(loader, false) {
                Ok(true) => log::info!(
                    "Successfully injected mod file '{}' into classpath",
                    package.path().display()
                ),
                Ok(false) => {}
                Err(e) => log::warn!(
                    "Error injecting '{}' into class path. The mod will not be loaded: {}",
                    package.path().display(),
                    e
                ),
            }
        }

        let (active, inactive): (Vec<&ExtensionPackage>, Vec<&ExtensionPackage>) = discovered
            .packages
            .iter()
            .partition(|p| p.is_enabled(enabled, profile));
        let index = discoverer.discover_classes(loader, active);

        let mut snapshot = LoaderSnapshot::from_packages(&discovered.packages);
        for class in index.into_vec() {
            if enabled.is_enabled(profile, &class.identifier) {
                snapshot.mods_to_load.push(class);
            } else {
                log::info!("Mod '{}' is disabled for profile '{}'", class.identifier, profile);
                snapshot.disabled.push(class);
            }
        }
        for package in &inactive {
            log::info!(
                "Mod '{}' is disabled for profile '{}', not injecting {}",
                package.identifier(),
                profile,
                package.path().display()
            );
            snapshot.disabled.extend(classes::list_package_entry_points(
                package.path(),
                package.identifier(),
            ));
        }

        log::info!(
            "{} mod(s) to load, {} disabled",
            snapshot.mods_to_load.len(),
            snapshot.disabled.len()
        );
        self.snapshot = snapshot;
        Ok(())
    }

    /// POSTINIT: remember which revision loaded each mod, then enter DONE.
    pub fn post_init(&mut self) -> Result<(), StartupError> {
        self.run_phase(StartupState::PostInit, |core| {
            if core.discovered.is_none() {
                log::warn!("No usable candidate set from PREINIT, nothing to finish");
                return Ok(());
            }

            let version = core.env.version;
            for class in &core.snapshot.mods_to_load {
                core.properties
                    .store_last_known_revision(&class.identifier, &version);
            }

            if let Err(e) = core.properties.save() {
                log::warn!("Could not save loader properties: {:#}", e);
            }
            Ok(())
        })?;

        self.states.enter(StartupState::Done)?;
        log::info!("Startup complete");
        self.states.mark_completed(StartupState::Done)
    }
}
