//! Early hook staging.
//!
//! Tweaks and transformers found during discovery are collected here first and
//! only then submitted to the host's [`HookQueue`]. Staging lets the loader
//! order hooks by priority and drop names the host already knows, so the same
//! hook is never queued twice.

use std::path::{Path, PathBuf};

use crate::host::{HookKind, HookQueue};

/// Tweak class of the loader itself. Packages that redeclare it are ignored.
pub const LOADER_TWEAK_CLASS: &str = "modkit.launch.LoaderTweaker";

/// A hook class declared by a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRegistration {
    pub kind: HookKind,
    pub class_name: String,
    /// Lower runs earlier
    pub priority: i32,
}

/// A registration together with the package that provides its classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedHook {
    pub registration: HookRegistration,
    pub provider: PathBuf,
    sequence: usize,
}

impl StagedHook {
    pub fn class_name(&self) -> &str {
        &self.registration.class_name
    }

    pub fn kind(&self) -> HookKind {
        self.registration.kind
    }
}

#[derive(Debug, Clone, Default)]
pub struct CascadedHooks {
    staged: Vec<StagedHook>,
    next_sequence: usize,
}

impl CascadedHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `registration`, provided by the package at `provider`.
    ///
    /// Returns false if the class is the loader's own tweak or is already staged.
    pub fn stage(&mut self, registration: HookRegistration, provider: &Path) -> bool {
        let name = registration.class_name.as_str();

        if name.is_empty() || name == LOADER_TWEAK_CLASS {
            log::debug!("Ignoring hook '{}' from {}", name, provider.display());
            return false;
        }

        if self.contains(name) {
            log::info!(
                "Hook '{}' from {} is already staged, skipping",
                name,
                provider.display()
            );
            return false;
        }

        log::info!(
            "Package '{}' provides {:?} '{}', staging for launch",
            provider.display(),
            registration.kind,
            name
        );

        self.staged.push(StagedHook {
            registration,
            provider: provider.to_path_buf(),
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        true
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.staged.iter().any(|h| h.class_name() == class_name)
    }

    /// Staged hooks in submission order: priority, then staging order.
    pub fn ordered(&self) -> Vec<&StagedHook> {
        let mut ordered: Vec<&StagedHook> = self.staged.iter().collect();
        ordered.sort_by_key(|h| (h.registration.priority, h.sequence));
        ordered
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Submit every staged hook to `queue` in order, emptying the stage.
    ///
    /// Hooks the host already knows are skipped. Returns the hooks the host
    /// accepted.
    pub fn drain_into(&mut self, queue: &mut dyn HookQueue) -> Vec<StagedHook> {
        let mut staged = std::mem::take(&mut self.staged);
        staged.sort_by_key(|h| (h.registration.priority, h.sequence));

        let mut accepted = Vec::new();
        for hook in staged {
            if queue.is_enqueued(hook.class_name()) {
                log::info!(
                    "{:?} '{}' is already known to the host, skipping",
                    hook.kind(),
                    hook.class_name()
                );
                continue;
            }

            if queue.enqueue(hook.kind(), hook.class_name()) {
                log::info!(
                    "{:?} '{}' was successfully added",
                    hook.kind(),
                    hook.class_name()
                );
                accepted.push(hook);
            } else {
                log::warn!(
                    "Host refused {:?} '{}' from {}",
                    hook.kind(),
                    hook.class_name(),
                    hook.provider.display()
                );
            }
        }

        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LaunchQueue;

    fn tweak(name: &str, priority: i32) -> HookRegistration {
        HookRegistration {
            kind: HookKind::Tweak,
            class_name: name.to_string(),
            priority,
        }
    }

    #[test]
    fn test_stage_rejects_own_tweak_and_duplicates() {
        let mut hooks = CascadedHooks::new();
        let provider = Path::new("/mods/a.ext");

        assert!(!hooks.stage(tweak(LOADER_TWEAK_CLASS, 0), provider));
        assert!(hooks.stage(tweak("a.Tweak", 10), provider));
        assert!(!hooks.stage(tweak("a.Tweak", 1), Path::new("/mods/b.ext")));
        assert_eq!(hooks.len(), 1);
    }

    #[test]
    fn test_drain_orders_by_priority_then_insertion() {
        let mut hooks = CascadedHooks::new();
        let provider = Path::new("/mods/a.ext");
        hooks.stage(tweak("late", 2000), provider);
        hooks.stage(tweak("first", 5), provider);
        hooks.stage(tweak("default.one", 1000), provider);
        hooks.stage(tweak("default.two", 1000), provider);

        let mut queue = LaunchQueue::new();
        let accepted = hooks.drain_into(&mut queue);

        let names: Vec<&str> = accepted.iter().map(|h| h.class_name()).collect();
        assert_eq!(names, ["first", "default.one", "default.two", "late"]);
        assert_eq!(queue.tweaks(), ["first", "default.one", "default.two", "late"]);
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_drain_skips_hooks_known_to_host() {
        let mut hooks = CascadedHooks::new();
        hooks.stage(tweak("host.Known", 1), Path::new("/mods/a.ext"));
        hooks.stage(
            HookRegistration {
                kind: HookKind::Transformer,
                class_name: "a.Transformer".to_string(),
                priority: 1000,
            },
            Path::new("/mods/a.ext"),
        );

        let mut queue = LaunchQueue::with_existing(["host.Known"]);
        let accepted = hooks.drain_into(&mut queue);

        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].kind(), HookKind::Transformer);
        assert_eq!(queue.tweaks(), ["host.Known"]);
    }
}
