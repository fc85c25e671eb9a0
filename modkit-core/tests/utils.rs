//! Test Utilities
//!
//! Builders for game directories and package archives.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use modkit_core::host::{entry_from_class_name, ClassDescriptor, EXTENSION_CONTRACT};
use modkit_core::loader::version::VersionRecord;
use tempfile::TempDir;

/// Loader release accepting the test format version "1.0".
pub const TEST_VERSION: VersionRecord = VersionRecord {
    revision: 99,
    timestamp: 0,
    host_version: "1.7.2",
    loader_version: "test",
    accepted_formats: &["1.0"],
};

/// A temporary game directory with an empty mods folder.
pub struct GameDir {
    dir: TempDir,
}

impl GameDir {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("mods")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.path().join("mods")
    }

    /// Versioned mods folder for `version`, created on demand.
    pub fn versioned_dir(&self, version: &VersionRecord) -> PathBuf {
        let dir = self.mods_dir().join(version.host_version);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// A class path directory holding the given class files.
    pub fn class_dir(&self, name: &str, classes: &[&str]) -> PathBuf {
        let dir = self.path().join(name);
        for class in classes {
            write_class_file(&dir, class);
        }
        dir
    }
}

/// Descriptor JSON with the fields discovery cares about.
pub fn descriptor(name: &str, revision: f32, format: &str) -> String {
    format!(
        r#"{{"name": "{}", "version": "{}", "revision": {}, "formatVersion": "{}"}}"#,
        name, revision, revision, format
    )
}

/// Concrete extension class declaration.
pub fn mod_class(name: &str) -> ClassDescriptor {
    ClassDescriptor::new(name).with_contract(EXTENSION_CONTRACT)
}

pub fn write_class_file(root: &Path, class_name: &str) {
    let path = root.join(entry_from_class_name(class_name));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"\xCA\xFE\xBA\xBE").unwrap();
}

/// Builder for package archives.
#[derive(Default)]
pub struct PackageBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor(self, json: &str) -> Self {
        self.entry("extension.json", json.as_bytes())
    }

    pub fn manifest(self, text: &str) -> Self {
        self.entry("META-INF/MANIFEST.MF", text.as_bytes())
    }

    pub fn class(self, class_name: &str) -> Self {
        let entry = entry_from_class_name(class_name);
        self.entry(&entry, b"\xCA\xFE\xBA\xBE")
    }

    pub fn entry(mut self, name: &str, content: &[u8]) -> Self {
        self.entries.push((name.to_string(), content.to_vec()));
        self
    }

    pub fn write(self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }

        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in &self.entries {
            writer
                .start_file(name.as_str(), zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
        path.to_path_buf()
    }
}
