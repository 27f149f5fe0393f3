//! Per-dispatch helper threading the current cause through state hooks.
//!
//! Every single-state operation runs the machine's global callback first,
//! then the state's own hook. Handles are checked against the machine's
//! tree on the way in, so a foreign or stale handle surfaces as
//! [`MachineError::InvalidState`] instead of touching the wrong state.

use super::callbacks::Callbacks;
use super::error::MachineError;
use super::region::{Region, RegionSet};
use crate::core::{Cause, Reaction, State, StateId, StateTree};
use tracing::trace;

pub(crate) struct Context<'m> {
    pub(crate) tree: &'m StateTree,
    pub(crate) callbacks: &'m Callbacks,
    pub(crate) cause: &'m Cause,
}

impl<'m> Context<'m> {
    pub(crate) fn new(tree: &'m StateTree, callbacks: &'m Callbacks, cause: &'m Cause) -> Self {
        Self {
            tree,
            callbacks,
            cause,
        }
    }

    pub(crate) fn state(&self, id: StateId) -> Result<&'m State, MachineError> {
        self.tree.get(id).ok_or_else(|| MachineError::InvalidState {
            machine: self.tree.name().to_string(),
            state: id,
        })
    }

    /// Name for diagnostics; falls back to the handle's display form.
    pub(crate) fn name_of(&self, id: StateId) -> String {
        self.tree
            .get(id)
            .map_or_else(|| id.to_string(), |state| state.name().to_string())
    }

    pub(crate) fn enter_state(&self, id: StateId) -> Result<(), MachineError> {
        let state = self.state(id)?;
        trace!(state = state.name(), cause = self.cause.name(), "enter");
        self.callbacks.entered(state, self.cause);
        state.enter(self.cause);
        Ok(())
    }

    /// Child selected by init: the global callback's choice, else the
    /// state's own init. Leaves select nothing.
    pub(crate) fn init_state(&self, id: StateId) -> Result<Option<StateId>, MachineError> {
        let state = self.state(id)?;
        if state.is_leaf() {
            return Ok(None);
        }
        trace!(state = state.name(), cause = self.cause.name(), "init");
        let selected = match self.callbacks.init(state, self.cause) {
            Some(target) => Some(target),
            None => state.init(self.cause),
        };
        let Some(target) = selected else {
            return Ok(None);
        };

        let child = self
            .tree
            .resolve(&target)
            .ok_or_else(|| MachineError::UnknownInitTarget {
                state: state.name().to_string(),
                target: target.to_string(),
            })?;
        if child.parent() != Some(id) {
            return Err(MachineError::InitNotChild {
                state: state.name().to_string(),
                selected: child.name().to_string(),
            });
        }
        Ok(Some(child.id()))
    }

    pub(crate) fn signal_state(&self, id: StateId) -> Result<Reaction, MachineError> {
        let state = self.state(id)?;
        self.callbacks.event(Some(state), self.cause);
        Ok(state.signal(self.cause))
    }

    /// Exit one state; returns its parent.
    pub(crate) fn exit_state(&self, id: StateId) -> Result<Option<StateId>, MachineError> {
        let state = self.state(id)?;
        trace!(state = state.name(), cause = self.cause.name(), "exit");
        self.callbacks.exited(state, self.cause);
        state.exit(self.cause);
        Ok(state.parent())
    }

    /// Enter `path` (deepest first) into `region`, then keep descending with
    /// init wherever the path runs out.
    ///
    /// An empty region takes the last path element as its head. Otherwise
    /// the path continues below the region's current leaf.
    pub(crate) fn follow_path(
        &self,
        region: &mut Region,
        mut path: Vec<StateId>,
    ) -> Result<(), MachineError> {
        let prime = match region.leaf {
            Some(leaf) => leaf,
            None => {
                let Some(head) = path.pop() else {
                    return Ok(());
                };
                self.enter_state(head)?;
                region.leaf = Some(head);
                head
            }
        };
        self.descend(region, prime, path)
    }

    fn descend(
        &self,
        region: &mut Region,
        entered: StateId,
        mut path: Vec<StateId>,
    ) -> Result<(), MachineError> {
        let mut current = entered;
        loop {
            let state = self.state(current)?;
            region.leaf = Some(current);

            if state.is_parallel() {
                let next = self.next_on_path(state, &mut path)?;
                let mut regions = Vec::with_capacity(state.children().len());
                for &child in state.children() {
                    self.enter_state(child)?;
                    let sub_path = if Some(child) == next {
                        std::mem::take(&mut path)
                    } else {
                        Vec::new()
                    };
                    let mut sub = Region::headed_by(child);
                    self.descend(&mut sub, child, sub_path)?;
                    regions.push(sub);
                }
                region.set = Some(RegionSet { regions });
                return Ok(());
            }

            let next = match self.next_on_path(state, &mut path)? {
                Some(next) => Some(next),
                None => self.init_state(current)?,
            };
            match next {
                Some(child) => {
                    self.enter_state(child)?;
                    current = child;
                }
                None => return Ok(()),
            }
        }
    }

    fn next_on_path(
        &self,
        parent: &State,
        path: &mut Vec<StateId>,
    ) -> Result<Option<StateId>, MachineError> {
        let Some(next) = path.pop() else {
            return Ok(None);
        };
        let state = self.state(next)?;
        if state.parent() != Some(parent.id()) {
            return Err(MachineError::MismatchedPath {
                parent: parent.name().to_string(),
                found: state.name().to_string(),
            });
        }
        Ok(Some(next))
    }
}
