//! System-wide view of loaded command sets
//!
//! The registry observes every load/unload and keeps a presentation
//! snapshot of each loaded set. Loaders remain the authority on what is
//! loaded; this view exists for queries (the command tree, status output).

use super::{Command, CommandSet, CommandSetId, CommandSetObserver};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Snapshot of a loaded command set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSetInfo {
    pub id: CommandSetId,
    pub name: String,
    pub description: String,
    pub commands: Vec<Command>,
}

impl CommandSetInfo {
    pub fn from_command_set(command_set: &dyn CommandSet) -> Self {
        let (name, description) = command_set.get_name_description();
        Self {
            id: command_set.id().clone(),
            name,
            description,
            commands: command_set.get_commands(),
        }
    }
}

/// Result of [`CommandSetRegistry::get_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inventory {
    /// Confirmed: no command set is loaded
    NothingLoaded,
    /// Loaded sets sorted by display name
    Loaded(Vec<Rc<CommandSetInfo>>),
}

impl Inventory {
    pub fn len(&self) -> usize {
        match self {
            Inventory::NothingLoaded => 0,
            Inventory::Loaded(sets) => sets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Inventory::NothingLoaded)
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            Inventory::NothingLoaded => Vec::new(),
            Inventory::Loaded(sets) => sets.iter().map(|s| s.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CommandSetRegistry {
    sets: RefCell<BTreeMap<CommandSetId, Rc<CommandSetInfo>>>,
    revision: Cell<u64>,
}

impl CommandSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All loaded command sets, sorted by display name (case-sensitive)
    pub fn get_all(&self) -> Inventory {
        let sets = self.sets.borrow();
        if sets.is_empty() {
            return Inventory::NothingLoaded;
        }

        let mut all: Vec<Rc<CommandSetInfo>> = sets.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Inventory::Loaded(all)
    }

    pub fn get(&self, id: &CommandSetId) -> Option<Rc<CommandSetInfo>> {
        self.sets.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &CommandSetId) -> bool {
        self.sets.borrow().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sets.borrow().len()
    }

    /// Bumped on every change; lets views skip rebuilding unchanged data
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    fn bump(&self) {
        self.revision.set(self.revision.get() + 1);
    }
}

impl CommandSetObserver for CommandSetRegistry {
    fn loaded_command_set(&self, command_set: &dyn CommandSet) {
        let info = Rc::new(CommandSetInfo::from_command_set(command_set));
        self.sets.borrow_mut().insert(info.id.clone(), info);
        self.bump();
    }

    fn unloaded_command_set(&self, command_set: &dyn CommandSet) {
        if self.sets.borrow_mut().remove(command_set.id()).is_some() {
            self.bump();
        }
    }
}
