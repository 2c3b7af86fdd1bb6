//! Directory list configuration
//!
//! The raw `loader.directories` value is re-read on every poll tick but only
//! re-parsed (and re-validated against the filesystem) when its text changes.

use crate::validation::{directory_line, resolve_directory, validate_directory};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    base: Option<PathBuf>,
    raw: Option<String>,
    directories: Vec<PathBuf>,
    validations: usize,
}

impl DirectoryConfig {
    /// Relative lines resolve against the process working directory
    pub fn new() -> Self {
        Self {
            base: None,
            raw: None,
            directories: Vec::new(),
            validations: 0,
        }
    }

    /// Relative lines resolve against `base`
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
            ..Self::new()
        }
    }

    /// Directories from the last parse
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// How many directory-existence checks have been performed so far
    pub fn validation_count(&self) -> usize {
        self.validations
    }

    /// Current directory list for `raw`, parsing only if `raw` changed
    pub fn resolve(&mut self, raw: &str) -> &[PathBuf] {
        if self.raw.as_deref() == Some(raw) {
            return &self.directories;
        }

        log::info!("Config option directories has changed: {:?}", raw);

        let base = match &self.base {
            Some(base) => base.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };

        let mut directories: Vec<PathBuf> = Vec::new();
        for line in raw.lines().filter_map(directory_line) {
            let directory = match resolve_directory(line, &base) {
                Ok(directory) => directory,
                Err(e) => {
                    log::error!("Invalid directory {:?}: {}", line, e);
                    continue;
                }
            };

            self.validations += 1;
            if let Err(e) = validate_directory(&directory) {
                log::error!("{}", e);
                continue;
            }

            if !directories.contains(&directory) {
                directories.push(directory);
            }
        }

        log::debug!("Loading command modules from these directories:");
        for directory in &directories {
            log::debug!(" - {}", directory.display());
        }

        self.raw = Some(raw.to_string());
        self.directories = directories;
        &self.directories
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self::new()
    }
}
