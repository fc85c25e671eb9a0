//! Package metadata formats.
//!
//! A package may carry two kinds of metadata:
//!
//! 1. **Archive manifest** (`META-INF/MANIFEST.MF`) - `Key: Value` lines that
//!    declare a tweak class, its priority, auxiliary class path entries and
//!    display information.
//! 2. **Descriptor** (`extension.json`) - the mod's identity, format version,
//!    revision and hook classes.
//!
//! Either, both or neither may be present.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use super::error::PackageError;

/// Path of the archive manifest inside a package.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Path of the descriptor inside a package.
pub const DESCRIPTOR_PATH: &str = "extension.json";

/// Legacy version file, no longer supported.
pub const LEGACY_VERSION_PATH: &str = "version.txt";

/// Priority for tweaks that do not declare one.
pub const DEFAULT_TWEAK_PRIORITY: i32 = 1000;

/// Main attributes of an archive manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveManifest {
    attributes: BTreeMap<String, String>,
}

impl ArchiveManifest {
    /// Parse manifest text. Lines of the form `Key: Value`; a line starting with
    /// a single space continues the previous value. Parsing stops at the first
    /// blank line, which ends the main section.
    pub fn parse(text: &str) -> Self {
        let mut attributes: BTreeMap<String, String> = BTreeMap::new();
        let mut last_key: Option<String> = None;

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some(key) = &last_key {
                    if let Some(value) = attributes.get_mut(key) {
                        value.push_str(continuation);
                    }
                }
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_string();
                attributes.insert(key.clone(), value.trim_start().to_string());
                last_key = Some(key);
            }
        }

        Self { attributes }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn tweak_class(&self) -> Option<&str> {
        self.get("TweakClass")
    }

    pub fn tweak_priority(&self) -> i32 {
        self.get("TweakOrder")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_TWEAK_PRIORITY)
    }

    /// Auxiliary entries from `Class-Path`, space separated.
    pub fn class_path(&self) -> Vec<String> {
        self.get("Class-Path")
            .map(|cp| cp.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.get("TweakName")
    }

    pub fn version(&self) -> Option<&str> {
        self.get("TweakVersion")
    }

    pub fn author(&self) -> Option<&str> {
        self.get("TweakAuthor")
    }
}

/// Parsed `extension.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptor {
    pub name: Option<String>,
    pub version: Option<String>,
    pub format_version: Option<String>,
    pub revision: f32,
    pub author: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub hook_class: Option<String>,
    pub transformer_classes: Vec<String>,
    /// Every top-level key as a string, including unknown ones
    pub meta: BTreeMap<String, String>,
}

impl Descriptor {
    /// Parse descriptor JSON. The document must be an object; individual fields
    /// of the wrong type are ignored rather than failing the whole descriptor.
    pub fn parse(text: &str, source: &Path) -> Result<Self, PackageError> {
        let value: Value = serde_json::from_str(text).map_err(|e| PackageError::Descriptor {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;

        let object = value.as_object().ok_or_else(|| PackageError::Descriptor {
            path: source.to_path_buf(),
            message: "descriptor is not a JSON object".to_string(),
        })?;

        let mut meta = BTreeMap::new();
        for (key, value) in object {
            if let Some(text) = scalar_to_string(value) {
                meta.insert(key.clone(), text);
            }
        }

        let string = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let revision = match object.get("revision") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0) as f32,
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        };

        let transformer_classes = match object.get("transformerClasses") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            name: string("name"),
            version: string("version"),
            format_version: string("formatVersion"),
            revision,
            author: string("author"),
            description: string("description"),
            url: string("url"),
            hook_class: string("hookClass"),
            transformer_classes,
            meta,
        })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null | Value::Object(_) => None,
    }
}
