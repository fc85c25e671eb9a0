//! Host Adapter
//!
//! The loader never reaches into the host directly. Instead the embedding
//! host implements two small traits:
//!
//! - [`ClassLoader`] - grows the class search path and resolves classes by name.
//! - [`HookQueue`] - accepts tweak and transformer class names that must be
//!   registered before regular class loading starts.
//!
//! Classes declare what they are through [`ClassInfo::contracts`] rather than
//! being inspected at runtime. A class is an extension entry point when it is a
//! concrete class that declares [`EXTENSION_CONTRACT`].
//!
//! [`SearchPathLoader`] and [`LaunchQueue`] are reference implementations used
//! by the CLI host and the test suite.

pub mod classloader;
pub mod queue;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::loader::error::ClassLoadError;

pub use classloader::SearchPathLoader;
pub use queue::LaunchQueue;

/// Contract every extension entry point declares.
pub const EXTENSION_CONTRACT: &str = "modkit.api.Extension";

/// Namespace of the loader's own classes. A package that needs a missing class
/// from this namespace was built against a newer loader.
pub const LOADER_NAMESPACE: &str = "modkit.";

/// What a loaded class declares about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Fully-qualified dotted name
    pub name: String,
    /// Contracts the class conforms to
    #[serde(default)]
    pub contracts: Vec<String>,
    #[serde(default)]
    pub is_interface: bool,
}

impl ClassInfo {
    pub fn declares(&self, contract: &str) -> bool {
        self.contracts.iter().any(|c| c == contract)
    }

    /// Concrete class declaring `contract`, and not the contract itself.
    pub fn implements(&self, contract: &str) -> bool {
        self.name != contract && !self.is_interface && self.declares(contract)
    }

    /// Name without its package.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }
}

/// Registration record for a class: its declaration plus the classes it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    #[serde(flatten)]
    pub info: ClassInfo,
    #[serde(default)]
    pub requires: Vec<String>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ClassInfo {
                name: name.into(),
                contracts: Vec::new(),
                is_interface: false,
            },
            requires: Vec::new(),
        }
    }

    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.info.contracts.push(contract.into());
        self
    }

    pub fn interface(mut self) -> Self {
        self.info.is_interface = true;
        self
    }

    pub fn requiring(mut self, class: impl Into<String>) -> Self {
        self.requires.push(class.into());
        self
    }
}

/// Kind of early hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookKind {
    Tweak,
    Transformer,
}

/// Class loader owned by the host.
pub trait ClassLoader {
    /// Append `path` (a directory or archive) to the search path.
    fn add_search_path(&mut self, path: &Path) -> Result<(), ClassLoadError>;

    /// Append `path` to the parent loader's search path.
    fn add_parent_search_path(&mut self, path: &Path) -> Result<(), ClassLoadError>;

    /// Resolve a class by its dotted name.
    fn load_class(&self, name: &str) -> Result<ClassInfo, ClassLoadError>;

    /// Current search path, in order.
    fn search_paths(&self) -> Vec<PathBuf>;
}

/// Queue of hook classes owned by the host.
pub trait HookQueue {
    /// Whether the host already knows `class_name`, queued or active.
    fn is_enqueued(&self, class_name: &str) -> bool;

    /// Queue `class_name`. Returns whether the host accepted it.
    fn enqueue(&mut self, kind: HookKind, class_name: &str) -> bool;
}

/// Last segment of a dotted class name.
pub fn simple_name(class_name: &str) -> &str {
    class_name
        .rsplit_once('.')
        .map(|(_, simple)| simple)
        .unwrap_or(class_name)
}

/// Dotted class name for a class file path such as `a/b/C.class`.
pub fn class_name_from_entry(entry: &str) -> Option<String> {
    let stem = entry.strip_suffix(".class")?;
    let stem = stem.trim_start_matches('/');
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace(['/', '\\'], "."))
}

/// Class file path for a dotted class name.
pub fn entry_from_class_name(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}
