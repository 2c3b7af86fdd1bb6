//! Test doubles shared by the unit tests
//!
//! `FakeHost` runs in-process and interprets module files by a few textual
//! markers instead of executing them:
//! - a line starting with `raise` fails the load
//! - `def unload` exports an unload hook
//! - an indented `raise` makes that hook fail

use crate::command::{CommandSet, CommandSetObserver};
use crate::environment::Environment;
use crate::host::{ExecError, HostError, ModuleHost, UnitHandle, UnloadReport};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    Missing,
    Succeeds,
    Fails,
}

#[derive(Debug, Default)]
pub struct FakeState {
    next_id: u64,
    units: HashMap<u64, Hook>,
    /// Every path passed to `execute`, in call order
    pub executed: Vec<PathBuf>,
    /// Simulate a missing interpreter
    pub unavailable: bool,
    pub shutdowns: usize,
}

impl FakeState {
    pub fn live_units(&self) -> usize {
        self.units.len()
    }

    pub fn executions_of(&self, path: &Path) -> usize {
        self.executed.iter().filter(|p| p.as_path() == path).count()
    }
}

pub struct FakeHost {
    state: Rc<RefCell<FakeState>>,
}

impl ModuleHost for FakeHost {
    fn execute(&mut self, path: &Path) -> Result<UnitHandle, ExecError> {
        let mut state = self.state.borrow_mut();
        if state.unavailable {
            return Err(HostError::Unavailable("fake interpreter disabled".to_string()).into());
        }
        state.executed.push(path.to_path_buf());

        let source = fs::read_to_string(path).map_err(|e| ExecError::Module(e.to_string()))?;
        if source.lines().any(|l| l.starts_with("raise")) {
            return Err(ExecError::Module(format!(
                "Traceback (most recent call last):\n  File \"{}\"\nRuntimeError",
                path.display()
            )));
        }

        let hook = if !source.contains("def unload") {
            Hook::Missing
        } else if source.lines().any(|l| l.starts_with(' ') && l.trim_start().starts_with("raise")) {
            Hook::Fails
        } else {
            Hook::Succeeds
        };

        state.next_id += 1;
        let id = state.next_id;
        state.units.insert(id, hook);
        Ok(UnitHandle::new(id))
    }

    fn unload(&mut self, handle: UnitHandle) -> UnloadReport {
        match self.state.borrow_mut().units.remove(&handle.raw()) {
            Some(Hook::Succeeds) => UnloadReport::HookCalled,
            Some(Hook::Missing) => UnloadReport::HookMissing,
            Some(Hook::Fails) => UnloadReport::HookFailed("RuntimeError".to_string()),
            None => UnloadReport::HookFailed("unknown unit".to_string()),
        }
    }

    fn shutdown(&mut self) {
        let mut state = self.state.borrow_mut();
        state.units.clear();
        state.shutdowns += 1;
    }
}

/// Environment backed by a `FakeHost`, plus a handle on the host's state
pub fn fake_env() -> (Rc<Environment>, Rc<RefCell<FakeState>>) {
    let state = Rc::new(RefCell::new(FakeState::default()));
    let host = FakeHost {
        state: state.clone(),
    };
    (Rc::new(Environment::new(Box::new(host))), state)
}

pub fn write_module(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).expect("write module");
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Loaded(String),
    Unloaded(String),
}

/// Observer recording every transition by display name
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl CommandSetObserver for RecordingObserver {
    fn loaded_command_set(&self, command_set: &dyn CommandSet) {
        let (name, _) = command_set.get_name_description();
        self.events.borrow_mut().push(Event::Loaded(name));
    }

    fn unloaded_command_set(&self, command_set: &dyn CommandSet) {
        let (name, _) = command_set.get_name_description();
        self.events.borrow_mut().push(Event::Unloaded(name));
    }
}
