//! Error types for the loader.
//!
//! Errors fall into four groups, each handled differently:
//! - **Per item**: a broken archive or descriptor, a single class that fails to
//!   load. Logged, the item is skipped.
//! - **Per root**: a search root that references loader components this build
//!   does not have ([`DiscoveryError::OutdatedLoader`]). The root's results are
//!   discarded.
//! - **Bootstrap**: `prepare()` could not set up its directories or log sink.
//!   The loader disables itself and the host carries on without mods.
//! - **Invariant**: [`StartupError`]. Phases were entered out of order or
//!   completed twice. These are returned to the host and never swallowed.

use std::path::PathBuf;

use thiserror::Error;

use super::startup::StartupState;

/// Failure while reading a package archive, manifest or descriptor.
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Malformed descriptor in {path}: {message}")]
    Descriptor { path: PathBuf, message: String },
}

/// Failure reported by a host class loader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassLoadError {
    /// No descriptor for the class, or its class file is not on any search path.
    #[error("Class not found: {0}")]
    NotFound(String),

    /// The class was found but one of the classes it requires was not.
    #[error("Class {class} requires missing class {missing}")]
    MissingDependency { class: String, missing: String },

    #[error("Class loader IO error: {0}")]
    Io(String),
}

/// Failure that aborts a whole search root during discovery.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// A class in the root needs a loader component this build does not ship.
    #[error("Error searching in '{root}', missing API component '{component}', the loader is probably out of date")]
    OutdatedLoader { root: PathBuf, component: String },

    #[error("IO error while scanning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Violation of the startup ordering rules.
///
/// These indicate an integration bug in the host: continuing would load
/// classes before their transformers are registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    #[error("Cannot go to state <{requested}> as <{current}> is active {detail}")]
    IllegalTransition {
        current: StartupState,
        requested: StartupState,
        detail: String,
    },

    #[error("Attempted to complete state <{0}> but the state is not active")]
    NotActive(StartupState),

    #[error("Attempted to complete state <{0}> but the state is already completed")]
    AlreadyCompleted(StartupState),
}

/// Top-level loader errors.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The config folder, log file or properties could not be set up.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Startup(#[from] StartupError),
}

/// Result type alias for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
