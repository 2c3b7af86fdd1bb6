//! Directory loader - the reconciliation engine
//!
//! Each [`DirectoryLoader::update`] pass:
//! 1. resolves the configured directories (cached on the raw config text)
//! 2. lists each directory (non-recursive) for regular `.py` files
//! 3. unloads tracked modules whose files are gone
//! 4. loads modules whose files are new
//!
//! All removals finish before any addition starts, so observers never see
//! two versions of the same module at once. A failure inside one module is
//! logged and contained; only a module host failure aborts the pass.
//!
//! Listing errors: a directory that no longer exists contributes no files
//! (its modules are unloaded). Any other listing error skips the directory
//! for this pass and keeps its modules tracked, so a flaky mount does not
//! unload everything under it.

use super::directories::DirectoryConfig;
use super::legacy::LegacyCommandSet;
use super::{CommandSet, CommandSetLoader, LoadOutcome};
use crate::config::AppConfig;
use crate::environment::Environment;
use crate::host::{HostError, UnloadReport};
use crate::system::SystemParticipant;
use crate::validation::has_module_extension;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub unloaded: Vec<PathBuf>,
    /// Unloaded modules that exported no unload hook
    pub missing_hooks: Vec<PathBuf>,
    /// Directories that could not be listed this pass
    pub skipped_directories: Vec<PathBuf>,
}

impl PassReport {
    /// No load, unload or failure happened
    pub fn is_quiet(&self) -> bool {
        self.loaded.is_empty() && self.failed.is_empty() && self.unloaded.is_empty()
    }
}

#[derive(Debug)]
struct Tracked {
    command_set: LegacyCommandSet,
    modified: Option<SystemTime>,
}

#[derive(Debug, Default)]
struct Discovery {
    files: BTreeMap<PathBuf, Option<SystemTime>>,
    unlistable: Vec<PathBuf>,
}

impl Discovery {
    /// Whether `path` lives in a directory that could not be listed
    fn is_unconfirmed(&self, path: &Path) -> bool {
        path.parent()
            .map(|parent| self.unlistable.iter().any(|d| d == parent))
            .unwrap_or(false)
    }
}

/// Loads legacy command modules from the configured directories
#[derive(Debug, Default)]
pub struct DirectoryLoader {
    modules: BTreeMap<PathBuf, Tracked>,
    failed: BTreeMap<PathBuf, Option<SystemTime>>,
    directories: DirectoryConfig,
}

impl DirectoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directories(directories: DirectoryConfig) -> Self {
        Self {
            directories,
            ..Self::default()
        }
    }

    pub fn directories(&self) -> &DirectoryConfig {
        &self.directories
    }

    /// Paths of currently loaded modules, sorted
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.modules.keys().cloned().collect()
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.modules.contains_key(path)
    }

    /// Paths whose last load failed; they are not retried until the file
    /// disappears (or, with `reload_modified`, changes)
    pub fn failed_paths(&self) -> Vec<PathBuf> {
        self.failed.keys().cloned().collect()
    }

    /// Unload every tracked module
    pub fn unload_all(&mut self, env: &Environment) -> PassReport {
        let mut report = PassReport::default();
        for (path, tracked) in std::mem::take(&mut self.modules) {
            self.unload_tracked(env, path, tracked, &mut report);
        }
        self.failed.clear();
        report
    }

    fn discover(&mut self, raw: &str) -> Discovery {
        let mut discovery = Discovery::default();
        for directory in self.directories.resolve(raw) {
            match scan_directory(directory) {
                Ok(files) => discovery.files.extend(files),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::warn!("Directory disappeared: {}", directory.display());
                }
                Err(e) => {
                    log::error!(
                        "Failed to list directory {}; keeping its modules this round: {}",
                        directory.display(),
                        e
                    );
                    discovery.unlistable.push(directory.clone());
                }
            }
        }
        discovery
    }

    fn unload_tracked(
        &self,
        env: &Environment,
        path: PathBuf,
        mut tracked: Tracked,
        report: &mut PassReport,
    ) {
        if let Some(UnloadReport::HookMissing) = tracked.command_set.unload(env) {
            report.missing_hooks.push(path.clone());
        }
        report.unloaded.push(path);
    }
}

/// List the module candidates directly inside `directory`
fn scan_directory(directory: &Path) -> io::Result<Vec<(PathBuf, Option<SystemTime>)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {}", directory.display(), e);
                continue;
            }
        };

        let path = directory.join(entry.file_name());
        if !has_module_extension(&path) {
            continue;
        }

        // Follow symlinks: a link to a regular file is a valid module
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        found.push((path, metadata.modified().ok()));
    }
    Ok(found)
}

impl CommandSetLoader for DirectoryLoader {
    fn update(&mut self, env: &Environment, config: &AppConfig) -> Result<PassReport, HostError> {
        let reload_modified = config.loader.reload_modified;
        let discovery = self.discover(&config.loader.directories);
        let mut report = PassReport {
            skipped_directories: discovery.unlistable.clone(),
            ..PassReport::default()
        };

        // Removals
        let stale: Vec<PathBuf> = self
            .modules
            .iter()
            .filter(|(path, tracked)| match discovery.files.get(*path) {
                None => !discovery.is_unconfirmed(path),
                Some(modified) => reload_modified && *modified != tracked.modified,
            })
            .map(|(path, _)| path.clone())
            .collect();

        for path in stale {
            if let Some(tracked) = self.modules.remove(&path) {
                self.unload_tracked(env, path, tracked, &mut report);
            }
        }

        // Failed modules get another chance only once their file identity changes
        self.failed.retain(|path, failed_at| match discovery.files.get(path) {
            None => discovery.is_unconfirmed(path),
            Some(modified) => !(reload_modified && *modified != *failed_at),
        });

        // Additions
        for (path, modified) in &discovery.files {
            if self.modules.contains_key(path) || self.failed.contains_key(path) {
                continue;
            }

            let mut command_set = LegacyCommandSet::new(path.clone());
            match command_set.load(env)? {
                LoadOutcome::Loaded => {
                    self.modules.insert(
                        path.clone(),
                        Tracked {
                            command_set,
                            modified: *modified,
                        },
                    );
                    report.loaded.push(path.clone());
                }
                LoadOutcome::Failed(_) => {
                    self.failed.insert(path.clone(), *modified);
                    report.failed.push(path.clone());
                }
            }
        }

        Ok(report)
    }
}

impl SystemParticipant for DirectoryLoader {
    fn name(&self) -> &str {
        "directory-loader"
    }

    fn startup(&mut self, _env: &Environment, _config: &AppConfig) -> anyhow::Result<()> {
        log::debug!("Directory loader ready");
        Ok(())
    }

    fn shutdown(&mut self, env: &Environment) {
        let report = self.unload_all(env);
        if !report.unloaded.is_empty() {
            log::info!("Unloaded {} command module(s)", report.unloaded.len());
        }
    }

    fn config_changed(&mut self, _env: &Environment, config: &AppConfig) -> anyhow::Result<()> {
        // The next pass re-resolves directories from the new text
        log::debug!(
            "Directory loader sees {} configured line(s)",
            config.loader.directories.lines().count()
        );
        Ok(())
    }
}
