//! Logging setup
//!
//! `env_logger` does the filtering and terminal output. Every record it lets
//! through is also copied to the log console.

use crate::config::LoggingConfig;
use crate::console::{self, ConsoleRecord, ConsoleSender, LogConsole};
use crate::validation::validate_log_level;
use anyhow::Context;
use env_logger::{Builder, Env, Logger};
use log::{LevelFilter, Log, Metadata, Record};

const FALLBACK_LEVEL: &str = "info";

/// Global logger writing through `env_logger` and into the console
pub struct TeeLogger {
    inner: Logger,
    console: ConsoleSender,
}

impl TeeLogger {
    pub fn filter(&self) -> LevelFilter {
        self.inner.filter()
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.inner.matches(record) {
            return;
        }
        self.inner.log(record);
        self.console.send(ConsoleRecord::from_record(record));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Build the logger without installing it
///
/// Returns the logger and the config values that were ignored as invalid.
/// `RUST_LOG` still overrides the configured default level.
pub fn build_logger(config: &LoggingConfig, console: ConsoleSender) -> (TeeLogger, Vec<String>) {
    let mut rejected = Vec::new();

    let level = match validate_log_level(&config.level) {
        Ok(_) => config.level.trim().to_string(),
        Err(e) => {
            rejected.push(format!("logging.level: {}", e));
            FALLBACK_LEVEL.to_string()
        }
    };

    let mut builder = Builder::from_env(Env::default().default_filter_or(level));
    for (target, target_level) in &config.targets {
        match validate_log_level(target_level) {
            Ok(filter) => {
                builder.filter_module(target, filter);
            }
            Err(e) => rejected.push(format!("logging.targets.{}: {}", target, e)),
        }
    }

    let logger = TeeLogger {
        inner: builder.build(),
        console,
    };
    (logger, rejected)
}

/// Install the global logger and return the console it feeds
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LogConsole> {
    let (sender, console) = console::channel(config.console_capacity);
    let (logger, rejected) = build_logger(config, sender);

    let max_level = logger.filter();
    log::set_boxed_logger(Box::new(logger)).context("Logger already installed")?;
    log::set_max_level(max_level);

    for problem in rejected {
        log::warn!("Ignoring invalid logging setting {}", problem);
    }
    Ok(console)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record_at<'a>(level: log::Level, target: &'a str, args: std::fmt::Arguments<'a>) -> Record<'a> {
        Record::builder().level(level).target(target).args(args).build()
    }

    #[test]
    fn test_tee_forwards_enabled_records_only() {
        let (sender, mut console) = console::channel(10);
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        let (logger, rejected) = build_logger(&config, sender);
        assert!(rejected.is_empty());

        logger.log(&record_at(log::Level::Info, "voxshell_lib", format_args!("quiet")));
        logger.log(&record_at(log::Level::Error, "voxshell_lib", format_args!("loud")));

        console.drain();
        let messages: Vec<_> = console.records().map(|r| r.message.clone()).collect();
        assert_eq!(messages, vec!["loud"]);
    }

    #[test]
    fn test_target_override() {
        let (sender, mut console) = console::channel(10);
        let mut targets = BTreeMap::new();
        targets.insert("module.stderr".to_string(), "error".to_string());
        let config = LoggingConfig {
            level: "trace".to_string(),
            targets,
            ..LoggingConfig::default()
        };
        let (logger, _) = build_logger(&config, sender);

        logger.log(&record_at(log::Level::Warn, "module.stderr", format_args!("noise")));
        logger.log(&record_at(log::Level::Warn, "voxshell_lib", format_args!("kept")));

        console.drain();
        assert_eq!(console.len(), 1);
    }

    #[test]
    fn test_invalid_levels_are_reported() {
        let (sender, _console) = console::channel(10);
        let mut targets = BTreeMap::new();
        targets.insert("module.stderr".to_string(), "shouty".to_string());
        let config = LoggingConfig {
            level: "verbose".to_string(),
            targets,
            ..LoggingConfig::default()
        };

        let (_, rejected) = build_logger(&config, sender);
        assert_eq!(rejected.len(), 2);
        assert!(rejected[0].starts_with("logging.level"));
    }
}
