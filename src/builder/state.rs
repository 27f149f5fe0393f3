//! Builder scoped to one state, for top-down tree construction.

use super::error::BuildError;
use super::machine::MachineBuilder;
use crate::core::{StateId, StateOptions};

/// Builder for the children of one state.
///
/// Borrowing the machine builder mutably keeps construction strictly
/// top-down: a child builder must be dropped before its parent builds more.
pub struct StateBuilder<'a> {
    builder: &'a mut MachineBuilder,
    id: StateId,
}

impl<'a> StateBuilder<'a> {
    pub(crate) fn new(builder: &'a mut MachineBuilder, id: StateId) -> Self {
        Self { builder, id }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.builder
            .tree()
            .get(self.id)
            .map_or("", |state| state.name())
    }

    /// Append a child state and return a builder scoped to it.
    pub fn new_state(
        &mut self,
        name: impl Into<String>,
        options: StateOptions,
    ) -> Result<StateBuilder<'_>, BuildError> {
        let id = self.builder.add_state(Some(self.id), name, options)?;
        Ok(StateBuilder::new(self.builder, id))
    }
}
