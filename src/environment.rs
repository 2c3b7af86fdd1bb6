//! Process-wide context
//!
//! One [`Environment`] is created at startup and passed by reference to
//! every component that loads command sets or needs to reach the observers.
//! It is torn down with [`Environment::shutdown`] when the application exits.

use crate::command::{CommandSet, CommandSetObserver, CommandSetRegistry};
use crate::extension::Extensions;
use crate::host::ModuleHost;
use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

pub struct Environment {
    observers: Extensions<dyn CommandSetObserver>,
    registry: Rc<CommandSetRegistry>,
    host: RefCell<Box<dyn ModuleHost>>,
}

impl Environment {
    /// Create the context; the command-set registry is registered as the first observer
    pub fn new(host: Box<dyn ModuleHost>) -> Self {
        let registry = Rc::new(CommandSetRegistry::new());
        let observers: Extensions<dyn CommandSetObserver> = Extensions::new();
        observers.register(registry.clone());

        Self {
            observers,
            registry,
            host: RefCell::new(host),
        }
    }

    pub fn observers(&self) -> &Extensions<dyn CommandSetObserver> {
        &self.observers
    }

    pub fn registry(&self) -> &Rc<CommandSetRegistry> {
        &self.registry
    }

    /// Exclusive access to the module host for the duration of one call
    pub fn host(&self) -> RefMut<'_, Box<dyn ModuleHost>> {
        self.host.borrow_mut()
    }

    pub fn notify_loaded(&self, command_set: &dyn CommandSet) {
        for observer in self.observers.snapshot() {
            observer.loaded_command_set(command_set);
        }
    }

    pub fn notify_unloaded(&self, command_set: &dyn CommandSet) {
        for observer in self.observers.snapshot() {
            observer.unloaded_command_set(command_set);
        }
    }

    /// Release everything the module host still holds
    pub fn shutdown(&self) {
        self.host.borrow_mut().shutdown();
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("observers", &self.observers)
            .field("command_sets", &self.registry.len())
            .finish_non_exhaustive()
    }
}
