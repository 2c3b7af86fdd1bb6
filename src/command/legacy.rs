//! Legacy command set - wraps a single script-style command module
//!
//! The module file is executed by the environment's module host in a fresh
//! namespace. Legacy modules register their commands through side effects
//! inside that namespace, so this wrapper exposes no commands of its own.

use super::{Command, CommandSet, CommandSetId, LoadOutcome, LoadState};
use crate::environment::Environment;
use crate::host::{ExecError, HostError, UnitHandle, UnloadReport};
use std::fmt;
use std::path::{Path, PathBuf};

/// Suffix appended to the display name of every legacy command set
pub const LEGACY_SUFFIX: &str = "(legacy)";

#[derive(Debug)]
pub struct LegacyCommandSet {
    id: CommandSetId,
    short_path: String,
    unit: Option<UnitHandle>,
}

impl LegacyCommandSet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let short_path = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            id: CommandSetId::new(path),
            short_path,
            unit: None,
        }
    }

    pub fn path(&self) -> &Path {
        self.id.path()
    }

    /// File name of the module
    pub fn short_path(&self) -> &str {
        &self.short_path
    }
}

impl fmt::Display for LegacyCommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<LegacyCommandSet({})>", self.short_path)
    }
}

impl CommandSet for LegacyCommandSet {
    fn id(&self) -> &CommandSetId {
        &self.id
    }

    fn get_name_description(&self) -> (String, String) {
        (format!("{} {}", self.short_path, LEGACY_SUFFIX), String::new())
    }

    fn get_commands(&self) -> Vec<Command> {
        Vec::new()
    }

    fn state(&self) -> LoadState {
        if self.unit.is_some() {
            LoadState::Loaded
        } else {
            LoadState::Unloaded
        }
    }

    fn load(&mut self, env: &Environment) -> Result<LoadOutcome, HostError> {
        if self.unit.is_some() {
            return Ok(LoadOutcome::Loaded);
        }

        log::debug!("Loading module {}", self.path().display());
        let result = env.host().execute(self.path());

        match result {
            Ok(handle) => {
                self.unit = Some(handle);
                log::info!("✓ Loaded module {}", self.short_path);
                env.notify_loaded(self);
                Ok(LoadOutcome::Loaded)
            }
            Err(ExecError::Module(detail)) => {
                log::error!(
                    "Error loading module {}:\n{}",
                    self.path().display(),
                    detail.trim_end()
                );
                Ok(LoadOutcome::Failed(detail))
            }
            Err(ExecError::Host(e)) => Err(e),
        }
    }

    fn unload(&mut self, env: &Environment) -> Option<UnloadReport> {
        let handle = self.unit.take()?;

        log::debug!("Unloading module {}", self.path().display());
        let report = env.host().unload(handle);

        match &report {
            UnloadReport::HookCalled => {}
            UnloadReport::HookMissing => {
                log::warn!(
                    "No unload() function in legacy module {}",
                    self.short_path
                );
            }
            UnloadReport::HookFailed(detail) => {
                log::error!(
                    "unload() failed in legacy module {}:\n{}",
                    self.short_path,
                    detail.trim_end()
                );
            }
        }

        log::info!("✓ Unloaded module {}", self.short_path);
        env.notify_unloaded(self);
        Some(report)
    }
}
