//! Builder for constructing machines.

use super::error::BuildError;
use super::state::StateBuilder;
use crate::core::{StateId, StateOptions, StateTree};
use crate::engine::{Callbacks, Emitter, Machine, MachineConfig, Mailbox};
use std::cell::RefCell;
use std::rc::Rc;
use stillwater::validation::Validation;

/// Builder for a machine's state tree.
///
/// States are appended in declaration order; the first child of a state is
/// its default. The builder is consumed by [`finalize`](Self::finalize) or
/// [`start`](Self::start), so a tree can never change after the machine
/// exists.
///
/// # Example
///
/// ```rust
/// use hsm_engine::{MachineBuilder, StateOptions};
///
/// let mut builder = MachineBuilder::new("player");
/// let mut playing = builder.new_state("playing", StateOptions::new()).unwrap();
/// playing.new_state("normal", StateOptions::new()).unwrap();
/// playing.new_state("fast", StateOptions::new()).unwrap();
/// builder.new_state("stopped", StateOptions::new()).unwrap();
///
/// let machine = builder.start(None).unwrap();
/// assert_eq!(machine.active_states(), vec!["playing", "normal"]);
/// ```
pub struct MachineBuilder {
    tree: StateTree,
    callbacks: Callbacks,
    config: MachineConfig,
    mailbox: Rc<RefCell<Mailbox>>,
}

impl MachineBuilder {
    /// Create a builder for a machine called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let tree = StateTree::new(name);
        let config = MachineConfig::default();
        let mailbox = Mailbox::shared(tree.name(), config.queue_reentrant);
        Self {
            tree,
            callbacks: Callbacks::default(),
            config,
            mailbox,
        }
    }

    /// Set the global callbacks.
    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Set the runtime configuration.
    pub fn config(mut self, config: MachineConfig) -> Self {
        self.mailbox.borrow_mut().queue_reentrant = config.queue_reentrant;
        self.config = config;
        self
    }

    /// Append a top-level state and return a builder scoped to it.
    pub fn new_state(
        &mut self,
        name: impl Into<String>,
        options: StateOptions,
    ) -> Result<StateBuilder<'_>, BuildError> {
        let id = self.add_state(None, name, options)?;
        Ok(StateBuilder::new(self, id))
    }

    /// Append a state below `parent` (or at the top level).
    pub fn add_state(
        &mut self,
        parent: Option<StateId>,
        name: impl Into<String>,
        options: StateOptions,
    ) -> Result<StateId, BuildError> {
        Ok(self.tree.insert(parent, name, options)?)
    }

    /// Handle of a state added earlier.
    pub fn find(&self, name: &str) -> Option<StateId> {
        self.tree.find(name).map(|state| state.id())
    }

    /// Handle for posting causes; hooks capture it before the machine exists.
    pub fn emitter(&self) -> Emitter {
        Emitter::new(self.mailbox.clone())
    }

    /// Validate the tree and hand it to an unstarted machine.
    ///
    /// Every structural violation is reported, not just the first.
    pub fn finalize(self) -> Result<Machine, BuildError> {
        match self.tree.validate() {
            Validation::Success(()) => Ok(Machine::new(
                self.tree,
                self.callbacks,
                self.config,
                self.mailbox,
            )),
            Validation::Failure(violations) => Err(BuildError::MalformedTree(
                violations.iter().cloned().collect(),
            )),
        }
    }

    /// Finalize and start at `initial`, or at the first top-level state.
    pub fn start(self, initial: Option<StateId>) -> Result<Machine, BuildError> {
        let mut machine = self.finalize()?;
        machine.start(initial)?;
        Ok(machine)
    }

    pub(crate) fn tree(&self) -> &StateTree {
        &self.tree
    }
}
