//! Command tree presentation model
//!
//! Builds the tree a command browser shows: one node per loaded command set
//! (sorted by display name) with its commands beneath it.

use super::registry::{CommandSetRegistry, Inventory};
use super::{CommandSet, CommandSetObserver};
use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::rc::Rc;

pub const ROOT_LABEL: &str = "Command sets";
pub const NOTHING_LOADED_LABEL: &str = "No command sets loaded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTree {
    NothingLoaded,
    Loaded { nodes: Vec<TreeNode> },
}

impl CommandTree {
    pub fn build(inventory: &Inventory) -> Self {
        match inventory {
            Inventory::NothingLoaded => CommandTree::NothingLoaded,
            Inventory::Loaded(sets) => CommandTree::Loaded {
                nodes: sets
                    .iter()
                    .map(|set| TreeNode {
                        name: set.name.clone(),
                        commands: set.commands.iter().map(|c| c.name.clone()).collect(),
                    })
                    .collect(),
            },
        }
    }

    pub fn root_label(&self) -> &'static str {
        match self {
            CommandTree::NothingLoaded => NOTHING_LOADED_LABEL,
            CommandTree::Loaded { .. } => ROOT_LABEL,
        }
    }

    /// Indented text rendering, one item per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.root_label());
        if let CommandTree::Loaded { nodes } = self {
            for node in nodes {
                let _ = writeln!(out, "  {}", node.name);
                for command in &node.commands {
                    let _ = writeln!(out, "    {}", command);
                }
            }
        }
        out
    }
}

/// Keeps a [`CommandTree`] in sync with the registry
///
/// Notifications only mark the tree stale; the rebuild happens on the next
/// read, so the result does not depend on observer notification order.
#[derive(Debug)]
pub struct CommandTreeUpdater {
    registry: Rc<CommandSetRegistry>,
    tree: RefCell<CommandTree>,
    built_revision: Cell<Option<u64>>,
    dirty: Cell<bool>,
    rebuilds: Cell<usize>,
}

impl CommandTreeUpdater {
    pub fn new(registry: Rc<CommandSetRegistry>) -> Self {
        Self {
            registry,
            tree: RefCell::new(CommandTree::NothingLoaded),
            built_revision: Cell::new(None),
            dirty: Cell::new(true),
            rebuilds: Cell::new(0),
        }
    }

    /// Current tree, rebuilt if the registry changed since the last read
    pub fn tree(&self) -> CommandTree {
        let revision = self.registry.revision();
        if self.built_revision.get() != Some(revision) {
            *self.tree.borrow_mut() = CommandTree::build(&self.registry.get_all());
            self.built_revision.set(Some(revision));
            self.rebuilds.set(self.rebuilds.get() + 1);
        }
        self.tree.borrow().clone()
    }

    /// Whether a transition happened since the last call (clears the flag)
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }

    pub fn rebuild_count(&self) -> usize {
        self.rebuilds.get()
    }
}

impl CommandSetObserver for CommandTreeUpdater {
    fn loaded_command_set(&self, _command_set: &dyn CommandSet) {
        self.dirty.set(true);
    }

    fn unloaded_command_set(&self, _command_set: &dyn CommandSet) {
        self.dirty.set(true);
    }
}
