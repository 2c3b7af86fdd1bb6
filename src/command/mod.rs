//! Command sets and their lifecycle
//!
//! A command set is a named, loadable unit exposing zero or more commands to
//! the recognition engine. Loaders discover command sets and drive their
//! load/unload; every transition is broadcast to the registered
//! [`CommandSetObserver`]s through the [`Environment`].

use crate::config::AppConfig;
use crate::environment::Environment;
use crate::host::{HostError, UnloadReport};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub mod directories;
pub mod legacy;
pub mod loader;
pub mod registry;
pub mod tree;

pub use legacy::LegacyCommandSet;
pub use loader::{DirectoryLoader, PassReport};
pub use registry::{CommandSetInfo, CommandSetRegistry, Inventory};

/// Stable identity of a command set (absolute file path for file-backed sets)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CommandSetId(PathBuf);

impl CommandSetId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for CommandSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A single command exposed by a command set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub name: String,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Unloaded,
    Loaded,
}

/// Result of a load attempt that did not hit an infrastructure failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// The module's own code failed; the set stays unloaded
    Failed(String),
}

/// A loadable command set
pub trait CommandSet {
    fn id(&self) -> &CommandSetId;

    /// Short single-line name and (possibly multi-line) description
    fn get_name_description(&self) -> (String, String);

    /// Commands exposed by this set, in order
    fn get_commands(&self) -> Vec<Command>;

    fn state(&self) -> LoadState;

    /// Load the set and notify observers on success
    ///
    /// Failures of the set's own code are contained and reported as
    /// [`LoadOutcome::Failed`]; only host failures are returned as errors.
    fn load(&mut self, env: &Environment) -> Result<LoadOutcome, HostError>;

    /// Unload the set and notify observers
    ///
    /// Returns `None` when the set was not loaded (nothing to do, no event).
    fn unload(&mut self, env: &Environment) -> Option<UnloadReport>;
}

/// Receives command-set load/unload transitions
///
/// Notifications are delivered synchronously on the reconciling thread, in
/// no particular order across observers.
pub trait CommandSetObserver {
    fn loaded_command_set(&self, command_set: &dyn CommandSet);
    fn unloaded_command_set(&self, command_set: &dyn CommandSet);
}

/// Discovers command sets and keeps them in sync with their sources
pub trait CommandSetLoader {
    /// Run one reconciliation pass
    fn update(&mut self, env: &Environment, config: &AppConfig) -> Result<PassReport, HostError>;
}
