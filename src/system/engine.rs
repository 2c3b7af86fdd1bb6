//! Speech engine participant
//!
//! Owns the connection to the speech recognition engine named by
//! `engine.name`. `auto` (or an empty name) lets [`get_engine`] pick.

use super::SystemParticipant;
use crate::config::AppConfig;
use crate::environment::Environment;
use crate::validation::validate_engine_name;
use anyhow::Context;
use std::fmt;
use thiserror::Error;

pub const AUTO_ENGINE: &str = "auto";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown speech engine: {0}")]
    Unknown(String),

    #[error("Failed to connect to {engine}: {reason}")]
    Connect { engine: String, reason: String },

    #[error("Invalid engine name: {0}")]
    InvalidName(#[from] crate::validation::ValidationError),
}

pub trait SpeechEngine: fmt::Debug {
    fn name(&self) -> &str;
    fn connect(&mut self) -> Result<(), EngineError>;
    fn disconnect(&mut self);
}

/// Engine that accepts every connection and recognizes nothing
#[derive(Debug, Default)]
pub struct StubEngine {
    connected: bool,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl SpeechEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn connect(&mut self) -> Result<(), EngineError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// Locate an engine backend; `None` selects automatically
pub fn get_engine(name: Option<&str>) -> Result<Box<dyn SpeechEngine>, EngineError> {
    match name {
        None | Some("stub") => Ok(Box::new(StubEngine::new())),
        Some(other) => Err(EngineError::Unknown(other.to_string())),
    }
}

/// `auto` and the empty string mean automatic selection
pub fn resolve_engine_name(name: &str) -> Option<&str> {
    let name = name.trim();
    if name.is_empty() || name == AUTO_ENGINE {
        None
    } else {
        Some(name)
    }
}

pub type EngineFactory = Box<dyn Fn(Option<&str>) -> Result<Box<dyn SpeechEngine>, EngineError>>;

pub struct EngineParticipant {
    factory: EngineFactory,
    engine: Option<Box<dyn SpeechEngine>>,
    loaded_engine_name: Option<String>,
}

impl EngineParticipant {
    pub fn new() -> Self {
        Self::with_factory(Box::new(get_engine))
    }

    pub fn with_factory(factory: EngineFactory) -> Self {
        Self {
            factory,
            engine: None,
            loaded_engine_name: None,
        }
    }

    /// Configured name of the connected engine (as written, e.g. `auto`)
    pub fn loaded_engine_name(&self) -> Option<&str> {
        self.loaded_engine_name.as_deref()
    }

    pub fn engine(&self) -> Option<&dyn SpeechEngine> {
        self.engine.as_deref()
    }

    fn connect_engine(&mut self, configured: &str) -> Result<(), EngineError> {
        let name = resolve_engine_name(configured);
        if let Some(name) = name {
            validate_engine_name(name)?;
        }

        log::info!(
            "Locating speech engine {}",
            name.unwrap_or("(automatic selection)")
        );
        let mut engine = (self.factory)(name)?;

        log::info!("Connecting to speech engine {}", engine.name());
        engine.connect()?;
        log::info!("✓ Speech engine {} connected", engine.name());

        self.engine = Some(engine);
        self.loaded_engine_name = Some(configured.to_string());
        Ok(())
    }
}

impl Default for EngineParticipant {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineParticipant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineParticipant")
            .field("engine", &self.engine)
            .field("loaded_engine_name", &self.loaded_engine_name)
            .finish_non_exhaustive()
    }
}

impl SystemParticipant for EngineParticipant {
    fn name(&self) -> &str {
        "engine"
    }

    fn startup(&mut self, env: &Environment, config: &AppConfig) -> anyhow::Result<()> {
        self.shutdown(env);
        self.connect_engine(&config.engine.name).map_err(|e| {
            log::error!("Error during speech engine setup: {}", e);
            e
        })?;
        Ok(())
    }

    fn shutdown(&mut self, _env: &Environment) {
        if let Some(mut engine) = self.engine.take() {
            log::info!("Disconnecting speech engine {}", engine.name());
            engine.disconnect();
        }
        self.loaded_engine_name = None;
    }

    fn config_changed(&mut self, env: &Environment, config: &AppConfig) -> anyhow::Result<()> {
        if self.loaded_engine_name.as_deref() == Some(config.engine.name.as_str()) {
            log::info!("No change.");
            return Ok(());
        }

        self.startup(env, config)
            .with_context(|| format!("Failed to switch to engine {:?}", config.engine.name))
    }
}
