// Integration tests for package discovery and conflict resolution
mod utils;

#[cfg(test)]
mod tests {
    use crate::utils::*;
    use modkit_core::host::HookKind;
    use modkit_core::loader::enabled::EnabledSet;
    use modkit_core::loader::discovery::{
        Discoverer, OPTION_SEARCH_MODS, OPTION_SEARCH_ZIPFILES,
    };
    use modkit_core::loader::properties::LoaderProperties;
    use modkit_core::loader::LaunchEnvironment;

    fn discover(game: &GameDir) -> modkit_core::loader::discovery::DiscoveredPackages {
        let env = LaunchEnvironment::new(game.path(), "default").with_version(TEST_VERSION);
        let mut props = LoaderProperties::new();
        Discoverer::new(&env, &mut props).discover_packages(&EnabledSet::new())
    }

    #[test]
    fn test_newest_revision_wins() {
        let game = GameDir::new();
        PackageBuilder::new()
            .descriptor(&descriptor("modx", 1.0, "1.0"))
            .write(&game.mods_dir().join("modx-1.0.ext"));
        PackageBuilder::new()
            .descriptor(&descriptor("modx", 2.0, "1.0"))
            .write(&game.mods_dir().join("modx-2.0.ext"));

        let discovered = discover(&game);

        assert_eq!(discovered.packages.len(), 1);
        let winner = discovered.package("modx").unwrap();
        assert_eq!(winner.file_name(), "modx-2.0.ext");
        assert_eq!(winner.revision(), 2.0);
        assert_eq!(discovered.rejected.len(), 1);
        assert!(discovered.rejected[0].path.ends_with("modx-1.0.ext"));
    }

    #[test]
    fn test_newest_unsupported_revision_loses_to_supported_one() {
        let game = GameDir::new();
        PackageBuilder::new()
            .descriptor(&descriptor("modx", 1.0, "1.0"))
            .write(&game.mods_dir().join("modx-1.0.ext"));
        PackageBuilder::new()
            .descriptor(&descriptor("modx", 5.0, "9.9"))
            .write(&game.mods_dir().join("modx-5.0.ext"));

        let discovered = discover(&game);
        assert_eq!(discovered.package("modx").unwrap().file_name(), "modx-1.0.ext");
    }

    #[test]
    fn test_group_without_supported_format_contributes_nothing() {
        let game = GameDir::new();
        PackageBuilder::new()
            .descriptor(&descriptor("old", 3.0, "1.5.2"))
            .write(&game.mods_dir().join("old.ext"));

        let discovered = discover(&game);
        assert!(discovered.packages.is_empty());
        assert_eq!(discovered.rejected.len(), 1);
    }

    #[test]
    fn test_versioned_folder_joins_conflict_groups() {
        let game = GameDir::new();
        PackageBuilder::new()
            .descriptor(&descriptor("minimap", 1.0, "1.0"))
            .write(&game.mods_dir().join("minimap.ext"));
        PackageBuilder::new()
            .descriptor(&descriptor("minimap", 3.0, "1.0"))
            .write(&game.versioned_dir(&TEST_VERSION).join("minimap.ext"));

        let discovered = discover(&game);
        let winner = discovered.package("minimap").unwrap();
        assert_eq!(winner.revision(), 3.0);
        assert!(winner.path().parent().unwrap().ends_with("1.7.2"));
    }

    #[test]
    fn test_suffix_filter_and_legacy_files() {
        let game = GameDir::new();
        PackageBuilder::new()
            .descriptor(&descriptor("zipped", 1.0, "1.0"))
            .write(&game.mods_dir().join("zipped.zip"));
        PackageBuilder::new()
            .entry("version.txt", b"1.4.7")
            .write(&game.mods_dir().join("legacy.ext"));
        std::fs::write(game.mods_dir().join("notes.txt"), "hello").unwrap();

        let discovered = discover(&game);
        assert!(discovered.packages.is_empty());
        assert!(discovered.rejected.is_empty());

        let env = LaunchEnvironment::new(game.path(), "default").with_version(TEST_VERSION);
        let mut props = LoaderProperties::new();
        props.set_bool(OPTION_SEARCH_ZIPFILES, true);
        let discovered = Discoverer::new(&env, &mut props).discover_packages(&EnabledSet::new());
        assert!(discovered.package("zipped").is_some());
    }

    #[test]
    fn test_corrupt_archive_does_not_abort_scan() {
        let game = GameDir::new();
        std::fs::write(game.mods_dir().join("aaa-broken.ext"), b"garbage").unwrap();
        PackageBuilder::new()
            .descriptor(&descriptor("good", 1.0, "1.0"))
            .write(&game.mods_dir().join("good.ext"));

        let discovered = discover(&game);
        assert_eq!(discovered.packages.len(), 1);
    }

    #[test]
    fn test_malformed_manifest_does_not_hide_descriptor() {
        let game = GameDir::new();
        PackageBuilder::new()
            .entry("META-INF/MANIFEST.MF", b"Created-By: M\xfcller\n")
            .descriptor(&descriptor("modx", 2.0, "1.0"))
            .write(&game.mods_dir().join("modx.ext"));

        let discovered = discover(&game);
        assert_eq!(discovered.packages.len(), 1);
        assert_eq!(discovered.package("modx").unwrap().revision(), 2.0);
    }

    #[test]
    fn test_tweak_only_jar_in_versioned_folder_is_staged() {
        let game = GameDir::new();
        let versioned = game.versioned_dir(&TEST_VERSION);
        PackageBuilder::new()
            .manifest("Manifest-Version: 1.0\nTweakClass: com.example.ShaderTweak\nTweakOrder: 5\n")
            .write(&versioned.join("shaders-1.4.jar"));
        PackageBuilder::new()
            .manifest("TweakClass: com.example.IgnoredTweak\n")
            .write(&game.mods_dir().join("outside.jar"));

        let discovered = discover(&game);
        let ordered = discovered.hooks.ordered();

        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].class_name(), "com.example.ShaderTweak");
        assert_eq!(ordered[0].kind(), HookKind::Tweak);
        assert_eq!(discovered.hook_providers.len(), 1);
    }

    #[test]
    fn test_winner_hooks_are_staged() {
        let game = GameDir::new();
        PackageBuilder::new()
            .descriptor(
                r#"{"name": "zoom", "revision": 1, "formatVersion": "1.0",
                    "hookClass": "com.example.ZoomTweak",
                    "transformerClasses": ["com.example.ZoomTransformer"]}"#,
            )
            .write(&game.mods_dir().join("zoom.ext"));

        let discovered = discover(&game);
        let names: Vec<&str> = discovered
            .hooks
            .ordered()
            .iter()
            .map(|h| h.class_name())
            .collect();
        assert_eq!(names, ["com.example.ZoomTweak", "com.example.ZoomTransformer"]);
    }

    #[test]
    fn test_disabled_winner_keeps_package_but_not_hooks() {
        let game = GameDir::new();
        PackageBuilder::new()
            .descriptor(
                r#"{"name": "zoom", "revision": 1, "formatVersion": "1.0",
                    "hookClass": "com.example.ZoomTweak",
                    "transformerClasses": ["com.example.ZoomTransformer"]}"#,
            )
            .write(&game.mods_dir().join("zoom.ext"));
        PackageBuilder::new()
            .manifest("TweakClass: com.example.ShaderTweak\n")
            .write(&game.versioned_dir(&TEST_VERSION).join("shaders.jar"));

        let mut enabled = EnabledSet::new();
        enabled.set_enabled("default", "zoom", false);
        enabled.set_enabled("default", "shaders.jar", false);

        let env = LaunchEnvironment::new(game.path(), "default").with_version(TEST_VERSION);
        let mut props = LoaderProperties::new();
        let discovered = Discoverer::new(&env, &mut props).discover_packages(&enabled);

        assert!(discovered.package("zoom").is_some());
        assert!(discovered.hooks.is_empty());

        let discovered = Discoverer::new(&env, &mut props).discover_packages(&EnabledSet::new());
        assert_eq!(discovered.hooks.len(), 3);
    }

    #[test]
    fn test_tweaks_disabled_stages_nothing() {
        let game = GameDir::new();
        PackageBuilder::new()
            .descriptor(
                r#"{"name": "zoom", "revision": 1, "formatVersion": "1.0", "hookClass": "com.example.ZoomTweak"}"#,
            )
            .write(&game.mods_dir().join("zoom.ext"));

        let mut env = LaunchEnvironment::new(game.path(), "default").with_version(TEST_VERSION);
        env.load_tweaks = false;
        let mut props = LoaderProperties::new();
        let discovered = Discoverer::new(&env, &mut props).discover_packages(&EnabledSet::new());

        assert_eq!(discovered.packages.len(), 1);
        assert!(discovered.hooks.is_empty());
    }

    #[test]
    fn test_class_path_tweaks_are_found() {
        let game = GameDir::new();
        let dev = game.class_dir("dev-classes", &["com.dev.ModDev"]);
        std::fs::create_dir_all(dev.join("META-INF")).unwrap();
        std::fs::write(
            dev.join("META-INF/MANIFEST.MF"),
            "TweakClass: com.dev.DevTweak\n",
        )
        .unwrap();

        let env = LaunchEnvironment::new(game.path(), "default")
            .with_version(TEST_VERSION)
            .with_class_path(vec![dev, game.path().join("missing.jar")]);
        let mut props = LoaderProperties::new();
        let discovered = Discoverer::new(&env, &mut props).discover_packages(&EnabledSet::new());

        assert!(discovered.hooks.contains("com.dev.DevTweak"));
        assert_eq!(discovered.hook_providers.len(), 1);
    }

    #[test]
    fn test_settings_are_saved_on_construction() {
        let game = GameDir::new();
        let path = game.path().join("modkit.properties");
        let env = LaunchEnvironment::new(game.path(), "default");

        let mut props = LoaderProperties::load(&path).unwrap();
        Discoverer::new(&env, &mut props);

        let reloaded = LoaderProperties::load(&path).unwrap();
        assert!(reloaded.get_bool(OPTION_SEARCH_MODS));
        assert!(!reloaded.get_bool(OPTION_SEARCH_ZIPFILES));
    }
}
