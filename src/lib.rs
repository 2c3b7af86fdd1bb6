//! Voxshell - speech command shell
//!
//! Discovers command modules in user-configured directories, keeps them
//! loaded while their files exist, and tells every registered observer about
//! each load and unload.

pub mod app;
pub mod command;
pub mod config;
pub mod console;
pub mod environment;
pub mod extension;
pub mod host;
pub mod logging;
pub mod paths;
pub mod system;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;
