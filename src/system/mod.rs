//! System participants
//!
//! Long-lived components that follow the application lifecycle: they are
//! started once, told whenever the configuration changes, and shut down on
//! exit.

use crate::config::AppConfig;
use crate::environment::Environment;

pub mod engine;

pub use engine::{EngineError, EngineParticipant, SpeechEngine, StubEngine};

pub trait SystemParticipant {
    /// Short name used in log lines
    fn name(&self) -> &str;

    fn startup(&mut self, env: &Environment, config: &AppConfig) -> anyhow::Result<()>;

    fn shutdown(&mut self, env: &Environment);

    /// Called after the configuration file was re-read
    fn config_changed(&mut self, env: &Environment, config: &AppConfig) -> anyhow::Result<()>;
}
