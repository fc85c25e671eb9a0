//! Search-path class loader.
//!
//! Resolves classes from registered [`ClassDescriptor`]s. A registered class is
//! only visible once its class file (`a/b/C.class`) is present in a directory
//! or archive on the search path, so injecting a package is what makes its
//! classes loadable. Builtin descriptors (the host's and loader's own classes)
//! are always visible.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{entry_from_class_name, ClassDescriptor, ClassInfo, ClassLoader, EXTENSION_CONTRACT};
use crate::loader::error::ClassLoadError;

/// JSON class index accepted by [`SearchPathLoader::load_index`].
#[derive(Debug, Default, Deserialize)]
struct ClassIndex {
    #[serde(default)]
    builtin: Vec<ClassDescriptor>,
    #[serde(default)]
    classes: Vec<ClassDescriptor>,
}

#[derive(Debug, Default)]
pub struct SearchPathLoader {
    search_paths: Vec<PathBuf>,
    parent_paths: Vec<PathBuf>,
    /// Entry names of archives on the search path
    archive_entries: HashMap<PathBuf, HashSet<String>>,
    descriptors: HashMap<String, ClassDescriptor>,
    builtin: HashSet<String>,
}

impl SearchPathLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader that already knows the extension contract.
    pub fn with_loader_api() -> Self {
        let mut loader = Self::new();
        loader.register_builtin(
            ClassDescriptor::new(EXTENSION_CONTRACT)
                .with_contract(EXTENSION_CONTRACT)
                .interface(),
        );
        loader
    }

    /// Register a class that becomes visible once its file is on the search path.
    pub fn register(&mut self, descriptor: ClassDescriptor) {
        self.builtin.remove(&descriptor.info.name);
        self.descriptors
            .insert(descriptor.info.name.clone(), descriptor);
    }

    /// Register a class that is always visible.
    pub fn register_builtin(&mut self, descriptor: ClassDescriptor) {
        self.builtin.insert(descriptor.info.name.clone());
        self.descriptors
            .insert(descriptor.info.name.clone(), descriptor);
    }

    /// Register every descriptor from a JSON class index file.
    pub fn load_index(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read class index: {}", path.display()))?;
        let index: ClassIndex = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse class index: {}", path.display()))?;

        let count = index.builtin.len() + index.classes.len();
        for descriptor in index.builtin {
            self.register_builtin(descriptor);
        }
        for descriptor in index.classes {
            self.register(descriptor);
        }
        Ok(count)
    }

    /// Entries added to the parent loader.
    pub fn parent_search_paths(&self) -> &[PathBuf] {
        &self.parent_paths
    }

    fn index_archive(path: &Path) -> Result<HashSet<String>, ClassLoadError> {
        let file = File::open(path).map_err(|e| ClassLoadError::Io(e.to_string()))?;
        let archive =
            zip::ZipArchive::new(file).map_err(|e| ClassLoadError::Io(e.to_string()))?;
        Ok(archive.file_names().map(str::to_string).collect())
    }

    fn is_visible(&self, class_name: &str) -> bool {
        if self.builtin.contains(class_name) {
            return true;
        }

        let entry = entry_from_class_name(class_name);
        self.search_paths.iter().any(|root| {
            match self.archive_entries.get(root) {
                Some(entries) => entries.contains(&entry),
                None => root.join(&entry).is_file(),
            }
        })
    }

    fn resolve(
        &self,
        name: &str,
        visiting: &mut HashSet<String>,
    ) -> Result<ClassInfo, ClassLoadError> {
        let descriptor = self
            .descriptors
            .get(name)
            .ok_or_else(|| ClassLoadError::NotFound(name.to_string()))?;

        if !self.is_visible(name) {
            return Err(ClassLoadError::NotFound(name.to_string()));
        }

        if !visiting.insert(name.to_string()) {
            // Cyclic requirement, already being resolved further up
            return Ok(descriptor.info.clone());
        }

        for required in &descriptor.requires {
            match self.resolve(required, visiting) {
                Ok(_) => {}
                Err(ClassLoadError::NotFound(missing))
                | Err(ClassLoadError::MissingDependency { missing, .. }) => {
                    return Err(ClassLoadError::MissingDependency {
                        class: name.to_string(),
                        missing,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(descriptor.info.clone())
    }
}

impl ClassLoader for SearchPathLoader {
    fn add_search_path(&mut self, path: &Path) -> Result<(), ClassLoadError> {
        if self.search_paths.iter().any(|p| p == path) {
            return Ok(());
        }

        if path.is_file() {
            let entries = Self::index_archive(path)?;
            self.archive_entries.insert(path.to_path_buf(), entries);
        }

        log::debug!("Search path += {}", path.display());
        self.search_paths.push(path.to_path_buf());
        Ok(())
    }

    fn add_parent_search_path(&mut self, path: &Path) -> Result<(), ClassLoadError> {
        if !self.parent_paths.iter().any(|p| p == path) {
            log::debug!("Parent search path += {}", path.display());
            self.parent_paths.push(path.to_path_buf());
        }
        Ok(())
    }

    fn load_class(&self, name: &str) -> Result<ClassInfo, ClassLoadError> {
        self.resolve(name, &mut HashSet::new())
    }

    fn search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn class_file(root: &Path, class_name: &str) {
        let path = root.join(entry_from_class_name(class_name));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"\xCA\xFE\xBA\xBE").unwrap();
    }

    #[test]
    fn test_class_visible_only_after_injection() {
        let dir = TempDir::new().unwrap();
        class_file(dir.path(), "com.example.ModZoom");

        let mut loader = SearchPathLoader::with_loader_api();
        loader.register(
            ClassDescriptor::new("com.example.ModZoom").with_contract(EXTENSION_CONTRACT),
        );

        assert!(matches!(
            loader.load_class("com.example.ModZoom"),
            Err(ClassLoadError::NotFound(_))
        ));

        loader.add_search_path(dir.path()).unwrap();
        let info = loader.load_class("com.example.ModZoom").unwrap();
        assert!(info.implements(EXTENSION_CONTRACT));
    }

    #[test]
    fn test_archive_entries_are_indexed() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("zoom.ext");
        let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
        writer
            .start_file("com/example/ModZoom.class", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
        writer.finish().unwrap();

        let mut loader = SearchPathLoader::new();
        loader.register(ClassDescriptor::new("com.example.ModZoom"));
        loader.add_search_path(&archive).unwrap();
        loader.add_search_path(&archive).unwrap();

        assert_eq!(loader.search_paths().len(), 1);
        assert!(loader.load_class("com.example.ModZoom").is_ok());
    }

    #[test]
    fn test_missing_requirement_is_reported() {
        let dir = TempDir::new().unwrap();
        class_file(dir.path(), "com.example.ModZoom");

        let mut loader = SearchPathLoader::with_loader_api();
        loader.register(
            ClassDescriptor::new("com.example.ModZoom")
                .with_contract(EXTENSION_CONTRACT)
                .requiring("modkit.api.Configurable"),
        );
        loader.add_search_path(dir.path()).unwrap();

        assert_eq!(
            loader.load_class("com.example.ModZoom"),
            Err(ClassLoadError::MissingDependency {
                class: "com.example.ModZoom".to_string(),
                missing: "modkit.api.Configurable".to_string(),
            })
        );
    }
}
