//! Extension Packages
//!
//! An [`ExtensionPackage`] wraps one archive or directory found during
//! discovery. Metadata is read once, when the package is opened, from the
//! archive manifest and the descriptor (see [`super::manifest`]). Any failure to
//! read either is logged and the package falls back to defaults guessed from
//! its file name, so a single corrupt file never aborts a scan.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::enabled::EnabledSet;
use super::error::{ClassLoadError, PackageError};
use super::hooks::HookRegistration;
use super::manifest::{
    ArchiveManifest, Descriptor, DEFAULT_TWEAK_PRIORITY, DESCRIPTOR_PATH, LEGACY_VERSION_PATH,
    MANIFEST_PATH,
};
use crate::host::{ClassLoader, HookKind};

/// Version used when neither the file name nor the metadata declares one.
pub const UNKNOWN_VERSION: &str = "Unknown";

static VERSION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn version_pattern() -> &'static Regex {
    VERSION_PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]+\.)+[0-9]+([_A-Z0-9]+)?").expect("version pattern is valid")
    })
}

/// Guess a version from a file name such as `minimap-1.7.2_04.ext`.
///
/// Names with several numeric groups yield the last one, so
/// `mod-1.2-for-1.7.2.ext` guesses `1.7.2`.
pub fn guess_version(file_name: &str) -> Option<String> {
    version_pattern()
        .find_iter(file_name)
        .last()
        .map(|m| m.as_str().to_string())
}

/// Where a package was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageOrigin {
    /// The shared mods folder
    ModsFolder,
    /// The mods folder pinned to the running host version
    VersionedFolder,
    /// An entry of the host class path
    ClassPath,
}

impl PackageOrigin {
    /// Packages the user dropped into a mods folder.
    pub fn is_external(self) -> bool {
        matches!(self, PackageOrigin::ModsFolder | PackageOrigin::VersionedFolder)
    }
}

/// Raw metadata read from a package before interpretation.
#[derive(Debug, Default)]
struct RawMetadata {
    manifest: Option<String>,
    descriptor: Option<String>,
    has_legacy_version: bool,
}

#[derive(Debug, Clone)]
pub struct ExtensionPackage {
    path: PathBuf,
    origin: PackageOrigin,
    identifier: String,
    display_name: String,
    version: String,
    author: Option<String>,
    tweak_class: Option<String>,
    tweak_priority: i32,
    class_path_entries: Vec<String>,
    descriptor: Option<Descriptor>,
    legacy_version_file: bool,
    injected: bool,
}

impl ExtensionPackage {
    /// Open the archive or directory at `path` and read its metadata.
    ///
    /// Never fails: unreadable archives and malformed metadata are logged and
    /// the package keeps the defaults guessed from its file name.
    pub fn open(path: &Path, origin: PackageOrigin) -> Self {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let mut package = Self {
            identifier: file_name.to_lowercase(),
            display_name: file_name.clone(),
            version: guess_version(&file_name).unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            author: None,
            tweak_class: None,
            tweak_priority: DEFAULT_TWEAK_PRIORITY,
            class_path_entries: Vec::new(),
            descriptor: None,
            legacy_version_file: false,
            injected: false,
            path,
            origin,
        };

        match read_metadata(&package.path) {
            Ok(raw) => package.apply_metadata(raw),
            Err(e) => log::warn!("Error reading metadata, using defaults: {}", e),
        }

        package
    }

    fn apply_metadata(&mut self, raw: RawMetadata) {
        self.legacy_version_file = raw.has_legacy_version;

        if let Some(text) = raw.manifest {
            let manifest = ArchiveManifest::parse(&text);

            self.tweak_class = manifest.tweak_class().map(str::to_string);
            self.tweak_priority = manifest.tweak_priority();
            if self.tweak_class.is_some() {
                self.class_path_entries = manifest.class_path();
            }
            if let Some(name) = manifest.display_name() {
                self.display_name = name.to_string();
            }
            if let Some(version) = manifest.version() {
                self.version = version.to_string();
            }
            if let Some(author) = manifest.author() {
                self.author = Some(author.to_string());
            }
        }

        if let Some(text) = raw.descriptor {
            match Descriptor::parse(&text, &self.path) {
                Ok(descriptor) => {
                    if let Some(name) = &descriptor.name {
                        self.identifier = name.to_lowercase();
                        self.display_name = name.clone();
                    }
                    if let Some(version) = &descriptor.version {
                        self.version = version.clone();
                    }
                    if let Some(author) = &descriptor.author {
                        self.author = Some(author.clone());
                    }
                    self.descriptor = Some(descriptor);
                }
                Err(e) => log::warn!("{}", e),
            }
        }
    }

    /// Use `identifier` instead of the one derived from the file name.
    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = identifier.to_lowercase();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn origin(&self) -> PackageOrigin {
        self.origin
    }

    pub fn is_external(&self) -> bool {
        self.origin.is_external()
    }

    /// Key for conflict resolution and enablement, always lower case.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.descriptor.as_ref()
    }

    pub fn has_descriptor(&self) -> bool {
        self.descriptor.is_some()
    }

    /// A descriptor is present and names the mod.
    pub fn is_valid(&self) -> bool {
        self.descriptor
            .as_ref()
            .is_some_and(|d| d.name.is_some())
    }

    /// Only the unsupported `version.txt` is present.
    pub fn is_legacy(&self) -> bool {
        self.legacy_version_file && self.descriptor.is_none()
    }

    pub fn revision(&self) -> f32 {
        self.descriptor.as_ref().map(|d| d.revision).unwrap_or(0.0)
    }

    pub fn format_version(&self) -> Option<&str> {
        self.descriptor
            .as_ref()
            .and_then(|d| d.format_version.as_deref())
    }

    /// Hook class: the descriptor's `hookClass`, else the manifest tweak.
    pub fn tweak_class(&self) -> Option<&str> {
        self.descriptor
            .as_ref()
            .and_then(|d| d.hook_class.as_deref())
            .or(self.tweak_class.as_deref())
    }

    pub fn has_tweak_class(&self) -> bool {
        self.tweak_class().is_some()
    }

    pub fn transformer_classes(&self) -> &[String] {
        self.descriptor
            .as_ref()
            .map(|d| d.transformer_classes.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_hooks(&self) -> bool {
        self.has_tweak_class() || !self.transformer_classes().is_empty()
    }

    /// Auxiliary `Class-Path` entries, relative to the game directory.
    pub fn class_path_entries(&self) -> &[String] {
        &self.class_path_entries
    }

    /// Every hook this package declares.
    pub fn hook_registrations(&self) -> Vec<HookRegistration> {
        let mut registrations = Vec::new();

        if let Some(tweak) = self.tweak_class() {
            registrations.push(HookRegistration {
                kind: HookKind::Tweak,
                class_name: tweak.to_string(),
                priority: self.tweak_priority,
            });
        }

        for transformer in self.transformer_classes() {
            registrations.push(HookRegistration {
                kind: HookKind::Transformer,
                class_name: transformer.clone(),
                priority: DEFAULT_TWEAK_PRIORITY,
            });
        }

        registrations
    }

    /// Descriptor value for `key`, or `default`.
    pub fn meta_value(&self, key: &str, default: &str) -> String {
        self.descriptor
            .as_ref()
            .and_then(|d| d.meta.get(key))
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn is_injected(&self) -> bool {
        self.injected
    }

    /// Add this package to the search path of `loader`, and of its parent when
    /// `also_parent` is set.
    ///
    /// Returns `Ok(true)` the first time and `Ok(false)` on every later call;
    /// the package is never added twice.
    pub fn inject_into_class_path(
        &mut self,
        loader: &mut dyn ClassLoader,
        also_parent: bool,
    ) -> Result<bool, ClassLoadError> {
        if self.injected {
            return Ok(false);
        }

        if also_parent {
            loader.add_parent_search_path(&self.path)?;
        }
        loader.add_search_path(&self.path)?;
        self.injected = true;
        Ok(true)
    }

    pub fn is_enabled(&self, enabled: &EnabledSet, profile: &str) -> bool {
        enabled.is_enabled(profile, &self.identifier)
    }

    /// Ranking among packages sharing an identifier, best first: higher
    /// revision, then higher format version.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .revision()
            .total_cmp(&self.revision())
            .then_with(|| other.format_version().cmp(&self.format_version()))
    }
}

fn read_metadata(path: &Path) -> Result<RawMetadata, PackageError> {
    if path.is_dir() {
        Ok(read_directory_metadata(path))
    } else {
        read_archive_metadata(path)
    }
}

/// Decode metadata text. Invalid UTF-8 is replaced rather than rejected.
fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Each entry is read on its own; a failure only loses that entry.
fn read_directory_metadata(path: &Path) -> RawMetadata {
    let read_optional = |relative: &str| -> Option<String> {
        let file = path.join(relative);
        if !file.is_file() {
            return None;
        }
        match fs::read(&file) {
            Ok(bytes) => Some(decode(&bytes)),
            Err(source) => {
                log::warn!("{}", PackageError::Io { path: file, source });
                None
            }
        }
    };

    RawMetadata {
        manifest: read_optional(MANIFEST_PATH),
        descriptor: read_optional(DESCRIPTOR_PATH),
        has_legacy_version: path.join(LEGACY_VERSION_PATH).is_file(),
    }
}

fn read_archive_metadata(path: &Path) -> Result<RawMetadata, PackageError> {
    let file = File::open(path).map_err(|source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| PackageError::Archive {
        path: path.to_path_buf(),
        source,
    })?;

    let mut read_optional = |name: &str| -> Option<String> {
        match read_archive_entry(&mut archive, path, name) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Skipping {}: {}", name, e);
                None
            }
        }
    };

    let manifest = read_optional(MANIFEST_PATH);
    let descriptor = read_optional(DESCRIPTOR_PATH);
    let has_legacy_version = archive.index_for_name(LEGACY_VERSION_PATH).is_some();

    Ok(RawMetadata {
        manifest,
        descriptor,
        has_legacy_version,
    })
}

fn read_archive_entry(
    archive: &mut zip::ZipArchive<File>,
    path: &Path,
    name: &str,
) -> Result<Option<String>, PackageError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(source) => {
            return Err(PackageError::Archive {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|source| PackageError::Io {
            path: path.join(name),
            source,
        })?;
    Ok(Some(decode(&bytes)))
}
