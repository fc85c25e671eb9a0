//! Extension class discovery.
//!
//! Enumerates candidate class files in a directory tree or archive, loads each
//! through the host [`ClassLoader`] and keeps the concrete classes declaring
//! [`EXTENSION_CONTRACT`].

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::error::{ClassLoadError, DiscoveryError, PackageError};
use crate::host::{self, ClassInfo, ClassLoader, EXTENSION_CONTRACT, LOADER_NAMESPACE};

/// Directories nested deeper than this below a search root are not entered.
pub const MAX_DISCOVERY_DEPTH: usize = 16;

/// Simple-name prefix of extension entry points.
pub const MOD_CLASS_PREFIX: &str = "Mod";

/// Archive suffixes that may hold classes.
const ARCHIVE_SUFFIXES: [&str; 3] = [".ext", ".jar", ".zip"];

/// An extension entry point found on a search root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredClass {
    pub class_name: String,
    pub simple_name: String,
    /// Enablement key of the mod this class belongs to
    pub identifier: String,
    /// Search root the class was found in
    pub source: PathBuf,
    /// Identifier of the owning package, for classes found in packages
    pub package: Option<String>,
}

impl DiscoveredClass {
    /// A class found on the class path or code source, identified by its name.
    pub fn from_class_path(info: &ClassInfo, source: &Path) -> Self {
        let simple_name = info.simple_name().to_string();
        Self {
            identifier: mod_identifier(&simple_name),
            class_name: info.name.clone(),
            simple_name,
            source: source.to_path_buf(),
            package: None,
        }
    }

    /// A class found inside the package `identifier`.
    pub fn from_package(info: &ClassInfo, source: &Path, identifier: &str) -> Self {
        Self::in_package(&info.name, source, identifier)
    }

    fn in_package(class_name: &str, source: &Path, identifier: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            simple_name: host::simple_name(class_name).to_string(),
            identifier: identifier.to_string(),
            source: source.to_path_buf(),
            package: Some(identifier.to_string()),
        }
    }
}

/// Identifier for a mod known only by its class: `ModZoom` -> `zoom`.
pub fn mod_identifier(simple_name: &str) -> String {
    simple_name
        .strip_prefix(MOD_CLASS_PREFIX)
        .unwrap_or(simple_name)
        .to_lowercase()
}

fn is_class_archive(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    ARCHIVE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Names of class files under `root` whose simple name starts with `prefix`.
///
/// Directories are walked at most [`MAX_DISCOVERY_DEPTH`] levels deep; anything
/// below is silently ignored. Roots that are neither a directory nor a class
/// archive yield nothing.
pub fn list_class_names(root: &Path, prefix: &str) -> Result<Vec<String>, DiscoveryError> {
    if root.is_dir() {
        Ok(list_directory(root, prefix))
    } else if root.is_file() && is_class_archive(root) {
        list_archive(root, prefix)
    } else {
        Ok(Vec::new())
    }
}

fn list_directory(root: &Path, prefix: &str) -> Vec<String> {
    let mut names = Vec::new();

    // Files of a directory at depth N are at walk depth N + 1
    for entry in WalkDir::new(root)
        .max_depth(MAX_DISCOVERY_DEPTH + 1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !file_name.ends_with(".class") || !file_name.starts_with(prefix) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let entry_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if let Some(class_name) = host::class_name_from_entry(&entry_name) {
            names.push(class_name);
        }
    }

    names
}

fn list_archive(root: &Path, prefix: &str) -> Result<Vec<String>, DiscoveryError> {
    let file = File::open(root).map_err(|source| DiscoveryError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    let archive = zip::ZipArchive::new(file).map_err(|source| {
        DiscoveryError::Package(PackageError::Archive {
            path: root.to_path_buf(),
            source,
        })
    })?;

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|entry| {
            let simple = entry.rsplit('/').next().unwrap_or("");
            simple.ends_with(".class") && simple.starts_with(prefix)
        })
        .filter_map(host::class_name_from_entry)
        .collect();
    names.sort();
    Ok(names)
}

/// Load every candidate class under `root` and keep the extension entry points.
///
/// Fails with [`DiscoveryError::OutdatedLoader`] when a class needs a missing
/// class from the loader's own namespace. Any other load failure only skips
/// that class.
pub fn scan_root(
    root: &Path,
    loader: &dyn ClassLoader,
    prefix: &str,
) -> Result<Vec<ClassInfo>, DiscoveryError> {
    let mut classes: Vec<ClassInfo> = Vec::new();

    for class_name in list_class_names(root, prefix)? {
        if class_name.contains('$') {
            continue;
        }

        match loader.load_class(&class_name) {
            Ok(info) => {
                if info.implements(EXTENSION_CONTRACT) && !classes.contains(&info) {
                    classes.push(info);
                }
            }
            Err(ClassLoadError::MissingDependency { missing, .. })
                if missing.starts_with(LOADER_NAMESPACE) =>
            {
                return Err(DiscoveryError::OutdatedLoader {
                    root: root.to_path_buf(),
                    component: host::simple_name(&missing).to_string(),
                });
            }
            Err(e) => {
                log::warn!(
                    "Error loading class '{}' from {}: {}",
                    class_name,
                    root.display(),
                    e
                );
            }
        }
    }

    Ok(classes)
}

/// [`scan_root`] with root-level failures logged and discarded.
pub fn find_mod_classes(root: &Path, loader: &dyn ClassLoader) -> Vec<ClassInfo> {
    match scan_root(root, loader, MOD_CLASS_PREFIX) {
        Ok(classes) => {
            if !classes.is_empty() {
                log::info!("Found {} potential matches", classes.len());
            }
            classes
        }
        Err(e) => {
            log::warn!("{}", e);
            Vec::new()
        }
    }
}

/// Candidate entry points of a package that is not on the class path, listed by
/// name only. Nothing is loaded.
pub fn list_package_entry_points(root: &Path, identifier: &str) -> Vec<DiscoveredClass> {
    match list_class_names(root, MOD_CLASS_PREFIX) {
        Ok(names) => names
            .iter()
            .filter(|name| !name.contains('$'))
            .map(|name| DiscoveredClass::in_package(name, root, identifier))
            .collect(),
        Err(e) => {
            log::warn!("{}", e);
            Vec::new()
        }
    }
}

/// Discovered classes keyed by simple name, in discovery order.
///
/// Inserting a simple name that is already present replaces the earlier class
/// in place.
#[derive(Debug, Clone, Default)]
pub struct ModClassIndex {
    classes: Vec<DiscoveredClass>,
    positions: HashMap<String, usize>,
}

impl ModClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `class` replaced an earlier class of the same name.
    pub fn insert(&mut self, class: DiscoveredClass) -> bool {
        match self.positions.get(&class.simple_name) {
            Some(&index) => {
                log::warn!(
                    "Mod name collision for mod with class '{}', maybe you have more than one copy?",
                    class.simple_name
                );
                self.classes[index] = class;
                true
            }
            None => {
                self.positions
                    .insert(class.simple_name.clone(), self.classes.len());
                self.classes.push(class);
                false
            }
        }
    }

    pub fn get(&self, simple_name: &str) -> Option<&DiscoveredClass> {
        self.positions.get(simple_name).map(|&i| &self.classes[i])
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredClass> {
        self.classes.iter()
    }

    pub fn into_vec(self) -> Vec<DiscoveredClass> {
        self.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ClassDescriptor, SearchPathLoader};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"\xCA\xFE\xBA\xBE").unwrap();
    }

    #[test]
    fn test_mod_identifier() {
        assert_eq!(mod_identifier("ModZoom"), "zoom");
        assert_eq!(mod_identifier("Other"), "other");
    }

    #[test]
    fn test_directory_listing_respects_prefix() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("com/example/ModZoom.class"));
        touch(&dir.path().join("com/example/Helper.class"));
        touch(&dir.path().join("com/example/ModZoom.txt"));

        let names = list_class_names(dir.path(), MOD_CLASS_PREFIX).unwrap();
        assert_eq!(names, ["com.example.ModZoom"]);
    }

    #[test]
    fn test_package_entry_points_are_listed_without_loading() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("com/example/ModZoom.class"));
        touch(&dir.path().join("com/example/ModZoom$Inner.class"));
        touch(&dir.path().join("com/example/Helper.class"));

        let classes = list_package_entry_points(dir.path(), "zoom");
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].class_name, "com.example.ModZoom");
        assert_eq!(classes[0].simple_name, "ModZoom");
        assert_eq!(classes[0].package.as_deref(), Some("zoom"));
    }

    #[test]
    fn test_depth_cap_stops_descent() {
        let dir = TempDir::new().unwrap();
        let mut current = dir.path().to_path_buf();
        for depth in 0..=20 {
            touch(&current.join(format!("ModLevel{}.class", depth)));
            current = current.join(format!("p{}", depth));
        }

        let names = list_class_names(dir.path(), MOD_CLASS_PREFIX).unwrap();
        let depths: Vec<usize> = names
            .iter()
            .map(|n| {
                host::simple_name(n)
                    .trim_start_matches("ModLevel")
                    .parse()
                    .unwrap()
            })
            .collect();

        assert_eq!(depths.len(), MAX_DISCOVERY_DEPTH + 1);
        assert!(depths.iter().all(|&d| d <= MAX_DISCOVERY_DEPTH));
    }

    #[test]
    fn test_scan_filters_inner_classes_and_interfaces() {
        let dir = TempDir::new().unwrap();
        for name in ["a/ModZoom", "a/ModZoom$Inner", "a/ModBase", "a/ModPlain"] {
            touch(&dir.path().join(format!("{}.class", name)));
        }

        let mut loader = SearchPathLoader::with_loader_api();
        loader.register(ClassDescriptor::new("a.ModZoom").with_contract(EXTENSION_CONTRACT));
        loader.register(ClassDescriptor::new("a.ModZoom$Inner").with_contract(EXTENSION_CONTRACT));
        loader.register(
            ClassDescriptor::new("a.ModBase")
                .with_contract(EXTENSION_CONTRACT)
                .interface(),
        );
        loader.register(ClassDescriptor::new("a.ModPlain"));
        loader.add_search_path(dir.path()).unwrap();

        let classes = scan_root(dir.path(), &loader, MOD_CLASS_PREFIX).unwrap();
        let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a.ModZoom"]);
    }

    #[test]
    fn test_missing_loader_component_discards_root() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/ModNew.class"));
        touch(&dir.path().join("a/ModOld.class"));

        let mut loader = SearchPathLoader::with_loader_api();
        loader.register(
            ClassDescriptor::new("a.ModNew")
                .with_contract(EXTENSION_CONTRACT)
                .requiring("modkit.api.Configurable"),
        );
        loader.register(ClassDescriptor::new("a.ModOld").with_contract(EXTENSION_CONTRACT));
        loader.add_search_path(dir.path()).unwrap();

        let err = scan_root(dir.path(), &loader, MOD_CLASS_PREFIX).unwrap_err();
        match err {
            DiscoveryError::OutdatedLoader { component, .. } => {
                assert_eq!(component, "Configurable")
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(find_mod_classes(dir.path(), &loader).is_empty());
    }

    #[test]
    fn test_other_missing_dependency_skips_class() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/ModBroken.class"));
        touch(&dir.path().join("a/ModFine.class"));

        let mut loader = SearchPathLoader::with_loader_api();
        loader.register(
            ClassDescriptor::new("a.ModBroken")
                .with_contract(EXTENSION_CONTRACT)
                .requiring("org.lib.Missing"),
        );
        loader.register(ClassDescriptor::new("a.ModFine").with_contract(EXTENSION_CONTRACT));
        loader.add_search_path(dir.path()).unwrap();

        let classes = find_mod_classes(dir.path(), &loader);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "a.ModFine");
    }

    #[test]
    fn test_index_last_write_wins() {
        let info = ClassInfo {
            name: "a.ModZoom".to_string(),
            contracts: vec![EXTENSION_CONTRACT.to_string()],
            is_interface: false,
        };

        let mut index = ModClassIndex::new();
        assert!(!index.insert(DiscoveredClass::from_class_path(&info, Path::new("/cp"))));
        assert!(index.insert(DiscoveredClass::from_package(&info, Path::new("/mods/zoom.ext"), "zoom")));

        assert_eq!(index.len(), 1);
        let entry = index.get("ModZoom").unwrap();
        assert_eq!(entry.package.as_deref(), Some("zoom"));
        assert_eq!(entry.source, Path::new("/mods/zoom.ext"));
    }
}
