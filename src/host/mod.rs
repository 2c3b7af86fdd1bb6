//! Module host - the interpreter boundary for command modules
//!
//! A host executes one command module file per call in an isolated
//! namespace and hands back an owned [`UnitHandle`]. The handle is the only
//! way to reach that namespace again, and [`ModuleHost::unload`] consumes it,
//! so every namespace is released exactly once.
//!
//! Available hosts:
//! - [`python::PythonHost`]: one interpreter process per loaded unit

use std::io;
use std::path::Path;
use thiserror::Error;

pub mod python;

/// Owned handle to a loaded unit inside a [`ModuleHost`]
///
/// Deliberately not `Clone`: whoever holds the handle owns the namespace.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct UnitHandle(u64);

impl UnitHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Failure of the host itself (shared infrastructure)
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Module interpreter unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to start module interpreter {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Module host protocol error: {0}")]
    Protocol(String),
}

/// Why executing a module failed
#[derive(Error, Debug)]
pub enum ExecError {
    /// The module's own code failed; contained to that module
    #[error("{0}")]
    Module(String),

    /// The host could not run any module
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Outcome of releasing a unit
///
/// The unit's namespace is gone in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnloadReport {
    /// The module exported an `unload` callable and it returned normally
    HookCalled,
    /// The module exported no `unload` callable
    HookMissing,
    /// The hook (or the host while talking to the unit) failed
    HookFailed(String),
}

/// Executes command modules in isolated namespaces
pub trait ModuleHost {
    /// Execute the module file at `path` in a fresh namespace seeded only
    /// with the file's own path
    fn execute(&mut self, path: &Path) -> Result<UnitHandle, ExecError>;

    /// Invoke the unit's optional unload hook and release its namespace
    fn unload(&mut self, handle: UnitHandle) -> UnloadReport;

    /// Release every remaining unit without running hooks
    fn shutdown(&mut self) {}
}
