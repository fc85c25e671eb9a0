//! Loader properties persistence.
//!
//! A flat `key=value` text file. Boolean settings are read with
//! [`LoaderProperties::get_and_store_bool`], which writes the effective value
//! back so that the file lists every setting after the first run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::version::VersionRecord;

/// Key for the pack branding string.
pub const BRAND_KEY: &str = "brand";

/// Prefix for per-mod last-known-revision entries.
const REVISION_KEY_PREFIX: &str = "version.";

#[derive(Debug, Clone, Default)]
pub struct LoaderProperties {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
    defaults: BTreeMap<String, String>,
}

impl LoaderProperties {
    /// An in-memory store with no backing file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file yields an empty store bound to `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let mut properties = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };

        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read properties file: {}", path.display()))?;
            properties.values = parse(&content);
        }

        Ok(properties)
    }

    /// Set the fallback layer consulted when a key is missing locally.
    pub fn with_defaults(mut self, defaults: BTreeMap<String, String>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .or_else(|| self.defaults.get(key))
            .map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Read a boolean, and store the effective value back under `key`.
    pub fn get_and_store_bool(&mut self, key: &str, default: bool) -> bool {
        let value = self
            .get(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(default);
        self.set_bool(key, value);
        value
    }

    /// Read a boolean; missing keys are false.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, value.to_string());
    }

    /// Pack branding, if a non-empty one is configured.
    pub fn branding(&self) -> Option<&str> {
        self.get(BRAND_KEY).filter(|b| !b.is_empty())
    }

    /// Remember that `identifier` was last loaded by the running revision.
    pub fn store_last_known_revision(&mut self, identifier: &str, version: &VersionRecord) {
        self.set(
            &format!("{}{}", REVISION_KEY_PREFIX, identifier),
            version.revision.to_string(),
        );
    }

    /// Revision that last loaded `identifier`, 0 if never recorded.
    pub fn last_known_revision(&self, identifier: &str) -> u32 {
        self.get(&format!("{}{}", REVISION_KEY_PREFIX, identifier))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Write every local value to the backing file.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .context("Properties store has no backing file")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create properties directory")?;
        }

        let mut content = format!(
            "# Properties for modkit {}\n",
            VersionRecord::current()
        );
        for (key, value) in &self.values {
            content.push_str(&format!("{}={}\n", escape(key, true), escape(value, false)));
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write properties file: {}", path.display()))?;
        Ok(())
    }
}

fn parse(content: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();

    for line in content.lines() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let (key, value) = match find_separator(line) {
            Some(idx) => (&line[..idx], &line[idx + 1..]),
            None => (line, ""),
        };

        values.insert(unescape(trim_key(key)), unescape(value.trim_start()));
    }

    values
}

/// Byte offset of the first unescaped `=` or `:`.
fn find_separator(line: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '=' | ':' => return Some(idx),
            _ => {}
        }
    }
    None
}

/// `key` without trailing whitespace, keeping a final escaped space.
fn trim_key(key: &str) -> &str {
    let trimmed = key.trim_end();
    let backslashes = trimmed.chars().rev().take_while(|&c| c == '\\').count();
    match key[trimmed.len()..].chars().next() {
        Some(c) if backslashes % 2 == 1 => &key[..trimmed.len() + c.len_utf8()],
        _ => trimmed,
    }
}

/// Escape for writing. Keys escape every space and a leading comment marker;
/// values escape a leading space so it survives the trim on read.
fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '=' => out.push_str("\\="),
            ':' => out.push_str("\\:"),
            ' ' if is_key || idx == 0 => out.push_str("\\ "),
            '#' | '!' if is_key && idx == 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_and_store_writes_default_back() {
        let mut props = LoaderProperties::new();
        assert!(props.get_and_store_bool("search.mods", true));
        assert_eq!(props.get("search.mods"), Some("true"));

        props.set("search.zipfiles", "TRUE");
        assert!(props.get_and_store_bool("search.zipfiles", false));
        assert_eq!(props.get("search.zipfiles"), Some("true"));
    }

    #[test]
    fn test_bool_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modkit.properties");

        let mut props = LoaderProperties::load(&path).unwrap();
        props.set_bool("search.jar", false);
        props.set_bool("loadingbar", true);
        props.save().unwrap();

        let reloaded = LoaderProperties::load(&path).unwrap();
        assert!(!reloaded.get_bool("search.jar"));
        assert!(reloaded.get_bool("loadingbar"));
    }

    #[test]
    fn test_defaults_layer_and_comments() {
        let mut defaults = BTreeMap::new();
        defaults.insert(BRAND_KEY.to_string(), "Pack".to_string());

        let mut props = LoaderProperties::new().with_defaults(defaults);
        props.values = parse("# comment\n! other\nkey = a=b\n\nbare\n");

        assert_eq!(props.get("key"), Some("a=b"));
        assert_eq!(props.get("bare"), Some(""));
        assert_eq!(props.branding(), Some("Pack"));
    }

    #[test]
    fn test_escaped_values_survive_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.properties");

        let mut props = LoaderProperties::load(&path).unwrap();
        props.set("a:b", "x=y\\z");
        props.save().unwrap();

        let reloaded = LoaderProperties::load(&path).unwrap();
        assert_eq!(reloaded.get("a:b"), Some("x=y\\z"));
    }

    #[test]
    fn test_leading_space_and_comment_markers_survive_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.properties");

        let mut props = LoaderProperties::load(&path).unwrap();
        props.set(BRAND_KEY, "  Pack");
        props.set("#key", "v");
        props.set("!bang", "w");
        props.set("spaced key ", "x");
        props.save().unwrap();

        let reloaded = LoaderProperties::load(&path).unwrap();
        assert_eq!(reloaded.get(BRAND_KEY), Some("  Pack"));
        assert_eq!(reloaded.get("#key"), Some("v"));
        assert_eq!(reloaded.get("!bang"), Some("w"));
        assert_eq!(reloaded.get("spaced key "), Some("x"));
    }

    #[test]
    fn test_last_known_revision() {
        let mut props = LoaderProperties::new();
        assert_eq!(props.last_known_revision("modx"), 0);
        props.store_last_known_revision("modx", VersionRecord::current());
        assert_eq!(
            props.last_known_revision("modx"),
            VersionRecord::current().revision
        );
    }
}
