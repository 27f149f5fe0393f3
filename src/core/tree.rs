//! Arena holding every state of one machine.
//!
//! States are addressed by [`StateId`]; parent links are plain handles used
//! only for traversal, never for ownership. Name lookup is scoped to the
//! tree, so two machines may reuse the same state names.

use super::state::{State, StateId, StateOptions};
use super::transition::Target;
use std::collections::HashMap;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;
use uuid::Uuid;

/// Structural defects found when validating a tree.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TreeViolation {
    #[error("Machine '{machine}' has no states")]
    Empty { machine: String },

    #[error("State '{name}' has depth {found}, expected {expected}")]
    DepthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("State '{name}' is not listed among its parent's children")]
    OrphanedChild { name: String },

    #[error("State '{name}' lists a child whose parent link points elsewhere")]
    ForeignChild { name: String },

    #[error("Name index entry '{name}' does not resolve to a state of that name")]
    StaleName { name: String },
}

/// Why a state could not be added.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InsertError {
    #[error("State name must not be empty")]
    EmptyName,

    #[error("State '{name}' already exists in this machine")]
    Duplicate { name: String },

    #[error("Parent {parent} does not belong to this machine")]
    UnknownParent { parent: StateId },
}

/// The static tree of one machine.
#[derive(Debug)]
pub struct StateTree {
    machine: Uuid,
    name: String,
    nodes: Vec<State>,
    top: Vec<StateId>,
    names: HashMap<String, StateId>,
}

impl StateTree {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            machine: Uuid::new_v4(),
            name: name.into(),
            nodes: Vec::new(),
            top: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Machine name; the implicit root above the top-level states.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn machine_id(&self) -> Uuid {
        self.machine
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a state as the last child of `parent` (or as a top-level state).
    pub(crate) fn insert(
        &mut self,
        parent: Option<StateId>,
        name: impl Into<String>,
        options: StateOptions,
    ) -> Result<StateId, InsertError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InsertError::EmptyName);
        }
        if self.names.contains_key(&name) {
            return Err(InsertError::Duplicate { name });
        }
        let depth = match parent {
            Some(parent_id) => {
                let parent_state = self
                    .get(parent_id)
                    .ok_or(InsertError::UnknownParent { parent: parent_id })?;
                parent_state.depth() + 1
            }
            None => 0,
        };

        let id = StateId::new(self.nodes.len() as u32, self.machine);
        self.nodes
            .push(State::new(id, name.clone(), parent, depth, options));
        match parent {
            Some(parent_id) => self.nodes[parent_id.index()].children.push(id),
            None => self.top.push(id),
        }
        self.names.insert(name, id);
        Ok(id)
    }

    /// Resolve a handle; `None` for handles of another machine.
    pub fn get(&self, id: StateId) -> Option<&State> {
        if id.machine() != self.machine {
            return None;
        }
        self.nodes.get(id.index())
    }

    pub fn find(&self, name: &str) -> Option<&State> {
        self.names.get(name).and_then(|id| self.get(*id))
    }

    /// Resolve a state target. Pseudo targets and unknown states give `None`.
    pub fn resolve(&self, target: &Target) -> Option<&State> {
        match target {
            Target::Name(name) => self.find(name),
            Target::Id(id) => self.get(*id),
            Target::Terminate | Target::Error => None,
        }
    }

    pub fn top_level(&self) -> &[StateId] {
        &self.top
    }

    /// Pre-order traversal, children in declaration order.
    pub fn pre_order(&self) -> Vec<&State> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<StateId> = self.top.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let state = &self.nodes[id.index()];
            out.push(state);
            stack.extend(state.children().iter().rev().copied());
        }
        out
    }

    /// True when `ancestor` is `state` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: StateId, state: StateId) -> bool {
        let mut current = Some(state);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).and_then(State::parent);
        }
        false
    }

    /// Path from `state` up to its top-level ancestor, deepest first.
    pub fn path_to_top(&self, state: StateId) -> Vec<StateId> {
        let mut path = Vec::new();
        let mut current = Some(state);
        while let Some(id) = current {
            path.push(id);
            current = self.get(id).and_then(State::parent);
        }
        path
    }

    /// Check every structural invariant, collecting all violations.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<TreeViolation>> {
        let mut checks: Vec<Validation<(), NonEmptyVec<TreeViolation>>> = Vec::new();

        if self.nodes.is_empty() {
            checks.push(Validation::fail(TreeViolation::Empty {
                machine: self.name.clone(),
            }));
        }

        for state in &self.nodes {
            let expected = state
                .parent()
                .and_then(|p| self.get(p))
                .map_or(0, |p| p.depth() + 1);
            checks.push(if state.depth() == expected {
                Validation::success(())
            } else {
                Validation::fail(TreeViolation::DepthMismatch {
                    name: state.name().to_string(),
                    expected,
                    found: state.depth(),
                })
            });

            let listed = match state.parent() {
                Some(parent) => self
                    .get(parent)
                    .is_some_and(|p| p.children().contains(&state.id())),
                None => self.top.contains(&state.id()),
            };
            checks.push(if listed {
                Validation::success(())
            } else {
                Validation::fail(TreeViolation::OrphanedChild {
                    name: state.name().to_string(),
                })
            });

            let children_agree = state
                .children()
                .iter()
                .all(|child| self.get(*child).and_then(State::parent) == Some(state.id()));
            checks.push(if children_agree {
                Validation::success(())
            } else {
                Validation::fail(TreeViolation::ForeignChild {
                    name: state.name().to_string(),
                })
            });
        }

        for (name, id) in &self.names {
            let agrees = self.get(*id).is_some_and(|s| s.name() == name);
            checks.push(if agrees {
                Validation::success(())
            } else {
                Validation::fail(TreeViolation::StaleName { name: name.clone() })
            });
        }

        Validation::all_vec(checks).map(|_| ())
    }
}
