//! Mod discovery, injection and staged startup for a game client.
//!
//! The crate is organised in three layers:
//!
//! - [`loader`] - the loader itself: version table, package model, enablement,
//!   properties, discovery, hook staging and the startup state machine, all
//!   orchestrated by [`loader::bootstrap::LoaderCore`].
//! - [`host`] - the adapter traits the embedding host implements (class loader,
//!   hook queue), plus reference implementations used by the CLI and tests.
//! - [`logging`] - `env_logger` setup with a persistent log file sink.
//!
//! # Example
//!
//! ```ignore
//! use modkit_core::host::{LaunchQueue, SearchPathLoader};
//! use modkit_core::loader::{LaunchEnvironment, LoaderCore};
//!
//! let env = LaunchEnvironment::new("/games/client", "default");
//! let mut loader = SearchPathLoader::new();
//! let mut queue = LaunchQueue::new();
//! let mut core = LoaderCore::new(env);
//!
//! core.prepare()?;
//! core.pre_init(&mut loader, &mut queue)?;
//! core.begin_game()?;
//! core.init(&mut loader)?;
//! core.post_init()?;
//!
//! for m in &core.snapshot().mods_to_load {
//!     println!("{} from {}", m.class_name, m.source.display());
//! }
//! ```

pub mod host;
pub mod loader;
pub mod logging;

pub use loader::bootstrap::LoaderCore;
pub use loader::error::{LoaderError, LoaderResult, StartupError};
pub use loader::startup::StartupState;
pub use loader::version::VersionRecord;
