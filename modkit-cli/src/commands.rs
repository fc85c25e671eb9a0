// CLI command handlers
use anyhow::{Context, Result};
use modkit_core::host::{ClassLoader, LaunchQueue, SearchPathLoader};
use modkit_core::loader::enabled::EnabledSet;
use modkit_core::loader::version::VERSION_TABLE;
use modkit_core::loader::LaunchEnvironment;
use modkit_core::{LoaderCore, VersionRecord};
use std::path::{Path, PathBuf};

/// Everything the host knows before the loader starts.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub game_dir: PathBuf,
    pub profile: String,
    pub class_path: Vec<PathBuf>,
    pub code_source: Option<PathBuf>,
    /// JSON class index describing the classes the host can resolve
    pub class_index: Option<PathBuf>,
    pub mods: Option<Vec<String>>,
    pub load_tweaks: bool,
}

impl LaunchOptions {
    pub fn new(game_dir: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            game_dir: game_dir.into(),
            profile: profile.into(),
            class_path: Vec::new(),
            code_source: None,
            class_index: None,
            mods: None,
            load_tweaks: true,
        }
    }

    fn environment(&self) -> LaunchEnvironment {
        let mut env = LaunchEnvironment::new(&self.game_dir, &self.profile)
            .with_class_path(self.class_path.clone());
        if let Some(code_source) = &self.code_source {
            env = env.with_code_source(code_source);
        }
        if let Some(mods) = &self.mods {
            env = env.with_mod_filter(mods.clone());
        }
        env.load_tweaks = self.load_tweaks;
        env
    }
}

/// The host side of a launch: class loader and hook queue.
pub struct Host {
    pub loader: SearchPathLoader,
    pub queue: LaunchQueue,
}

impl Host {
    pub fn new(options: &LaunchOptions) -> Result<Self> {
        let mut loader = SearchPathLoader::with_loader_api();
        if let Some(index) = &options.class_index {
            let count = loader.load_index(index)?;
            log::info!("Registered {} classes from {}", count, index.display());
        }

        for entry in options.class_path.iter().chain(options.code_source.as_ref()) {
            if !entry.exists() {
                log::warn!("Class path entry {} does not exist", entry.display());
                continue;
            }
            loader
                .add_search_path(entry)
                .with_context(|| format!("Failed to add {} to the class path", entry.display()))?;
        }

        Ok(Self {
            loader,
            queue: LaunchQueue::new(),
        })
    }
}

/// Run every startup phase through to DONE.
pub fn launch(options: &LaunchOptions) -> Result<(LoaderCore, Host)> {
    let mut host = Host::new(options)?;
    let mut core = LoaderCore::new(options.environment());

    core.prepare().context("PREPARE failed")?;
    core.pre_init(&mut host.loader, &mut host.queue)
        .context("PREINIT failed")?;
    core.begin_game().context("BEGINGAME failed")?;
    core.init(&mut host.loader).context("INIT failed")?;
    core.post_init().context("POSTINIT failed")?;

    Ok((core, host))
}

/// Run discovery only, stopping after PREINIT.
pub fn discover(options: &LaunchOptions) -> Result<(LoaderCore, Host)> {
    let mut host = Host::new(options)?;
    let mut core = LoaderCore::new(options.environment());

    core.prepare().context("PREPARE failed")?;
    core.pre_init(&mut host.loader, &mut host.queue)
        .context("PREINIT failed")?;

    Ok((core, host))
}

pub fn print_launch(core: &LoaderCore, host: &Host) {
    if let Some(reason) = core.disabled_reason() {
        println!("Loader disabled: {}", reason);
        return;
    }

    let snapshot = core.snapshot();
    println!("Startup reached {}", core.current_state());
    println!("  Packages: {}", snapshot.packages.len());
    println!("  Tweaks queued: {}", host.queue.tweaks().len());
    println!("  Transformers queued: {}", host.queue.transformers().len());

    println!("\nMods to load: {}", snapshot.mods_to_load.len());
    for class in &snapshot.mods_to_load {
        println!(
            "    {} ({}) from {}",
            class.identifier,
            class.class_name,
            class.source.display()
        );
    }

    if !snapshot.disabled.is_empty() {
        println!("\nDisabled: {}", snapshot.disabled.len());
        for class in &snapshot.disabled {
            println!("    {} ({})", class.identifier, class.class_name);
        }
    }
}

pub fn print_discovery(core: &LoaderCore) {
    if let Some(reason) = core.disabled_reason() {
        println!("Loader disabled: {}", reason);
        return;
    }
    let Some(discovered) = core.discovered() else {
        println!("Nothing discovered");
        return;
    };

    println!("Packages: {}", discovered.packages.len());
    for package in &discovered.packages {
        let state = if package.is_enabled(core.enabled_set(), &core.environment().profile) {
            "enabled"
        } else {
            "disabled"
        };
        println!(
            "    {} {} (revision {}, {}) [{}]",
            package.display_name(),
            package.version(),
            package.revision(),
            package.file_name(),
            state
        );
    }

    let hooks = discovered.hooks.ordered();
    if !hooks.is_empty() {
        println!("\nHooks: {}", hooks.len());
        for hook in hooks {
            println!(
                "    {:?} {} (priority {}) from {}",
                hook.kind(),
                hook.class_name(),
                hook.registration.priority,
                hook.provider.display()
            );
        }
    }

    if !discovered.rejected.is_empty() {
        println!("\nRejected: {}", discovered.rejected.len());
        for rejected in &discovered.rejected {
            println!(
                "    {} ({}): {}",
                rejected.identifier,
                rejected.path.display(),
                rejected.reason
            );
        }
    }
}

/// Persist the enabled flag of `identifier` for `profile`.
///
/// Returns whether the stored value changed.
pub fn set_enabled(game_dir: &Path, profile: &str, identifier: &str, enabled: bool) -> Result<bool> {
    let paths = LaunchEnvironment::new(game_dir, profile).paths();
    std::fs::create_dir_all(&paths.config_dir)
        .with_context(|| format!("Failed to create {}", paths.config_dir.display()))?;

    let mut changed = false;
    EnabledSet::update(&paths.enabled_file, |set| {
        changed = set.set_enabled(profile, identifier, enabled);
    })?;

    let verb = if enabled { "Enabled" } else { "Disabled" };
    if changed {
        println!("{} {} for profile {}", verb, identifier, profile);
    } else {
        println!("{} already {} for profile {}", identifier, verb.to_lowercase(), profile);
    }
    Ok(changed)
}

pub fn print_versions() {
    let current = VersionRecord::current();
    for record in VERSION_TABLE {
        let marker = if record.revision == current.revision { "*" } else { " " };
        println!(
            "{} {:>3}  {:<10} host {:<8} formats {}",
            marker,
            record.revision,
            record.to_string(),
            record.host_version,
            record.accepted_formats.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_enabled_persists_per_profile() {
        let dir = TempDir::new().unwrap();

        assert!(set_enabled(dir.path(), "pvp", "zoom", false).unwrap());
        assert!(!set_enabled(dir.path(), "pvp", "zoom", false).unwrap());

        let paths = LaunchEnvironment::new(dir.path(), "pvp").paths();
        let set = EnabledSet::load(&paths.enabled_file);
        assert!(!set.is_enabled("pvp", "zoom"));
        assert!(set.is_enabled("default", "zoom"));
    }

    #[test]
    fn test_launch_empty_game_dir() {
        let dir = TempDir::new().unwrap();
        let mut options = LaunchOptions::new(dir.path(), "default");
        options.class_path.push(dir.path().join("missing.jar"));

        let (core, host) = launch(&options).unwrap();

        assert_eq!(core.current_state(), modkit_core::StartupState::Done);
        assert!(core.snapshot().mods_to_load.is_empty());
        assert!(host.queue.is_empty());
        assert!(host.loader.search_paths().is_empty());
    }

    #[test]
    fn test_missing_class_index_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut options = LaunchOptions::new(dir.path(), "default");
        options.class_index = Some(dir.path().join("classes.json"));

        assert!(discover(&options).is_err());
    }
}
