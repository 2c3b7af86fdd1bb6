/**
 * Input Validation Module
 *
 * Centralized validation for configuration values and module candidates.
 * Directory lines come from a user-edited text value, module candidates come
 * from arbitrary directory listings; neither is trusted.
 */
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// File extension recognized as a command module
pub const MODULE_EXTENSION: &str = "py";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Value too long: max {max}, got {actual}")]
    ValueTooLong { max: usize, actual: usize },
}

/// Extract the meaningful part of one line of the directories value
///
/// Returns `None` for blank lines and `#` comments.
pub fn directory_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line)
}

/// Resolve a directory line to an absolute path, without touching the filesystem
///
/// Relative paths are resolved against `base`.
pub fn resolve_directory(line: &str, base: &Path) -> Result<PathBuf, ValidationError> {
    if line.contains('\0') {
        return Err(ValidationError::InvalidPath(
            "Path contains null byte".to_string(),
        ));
    }

    if line.len() > 4096 {
        return Err(ValidationError::ValueTooLong {
            max: 4096,
            actual: line.len(),
        });
    }

    let path = Path::new(line);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let absolute =
        std::path::absolute(&joined).map_err(|e| ValidationError::InvalidPath(e.to_string()))?;
    Ok(normalize_lexically(&absolute))
}

/// Drop `.` and fold `..` without touching the filesystem (symlinks are not resolved)
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // Popping past the root is a no-op, as `/..` is `/`
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Check that a resolved directory exists
pub fn validate_directory(path: &Path) -> Result<(), ValidationError> {
    if !path.is_dir() {
        return Err(ValidationError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// Whether a path names a command module file by extension
///
/// The check is exact and case-sensitive (`.py`, not `.PY`).
pub fn has_module_extension(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(MODULE_EXTENSION)
}

/// Validate engine name (alphanumeric, _ - only, max 64 chars)
pub fn validate_engine_name(name: &str) -> Result<String, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::InvalidFormat(
            "Engine name cannot be empty".to_string(),
        ));
    }

    if name.len() > 64 {
        return Err(ValidationError::ValueTooLong {
            max: 64,
            actual: name.len(),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidFormat(format!(
            "Engine name can only contain alphanumeric, underscore, and hyphen: {}",
            name
        )));
    }

    Ok(name.to_string())
}

/// Validate a log level string (off, error, warn, info, debug, trace)
pub fn validate_log_level(level: &str) -> Result<log::LevelFilter, ValidationError> {
    level
        .trim()
        .parse::<log::LevelFilter>()
        .map_err(|_| ValidationError::InvalidFormat(format!("Unknown log level: {}", level)))
}
