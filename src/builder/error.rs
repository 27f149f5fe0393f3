//! Build errors for machines and their state trees.

use crate::core::{InsertError, StateId, TreeViolation};
use crate::engine::MachineError;
use thiserror::Error;

/// Errors that can occur while building or starting a machine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("State name must not be empty")]
    EmptyName,

    #[error("State '{name}' is already defined in this machine")]
    DuplicateState { name: String },

    #[error("Parent {parent} does not belong to this machine")]
    UnknownParent { parent: StateId },

    #[error("State tree is malformed ({} violation(s)): {}", .0.len(), summarize(.0))]
    MalformedTree(Vec<TreeViolation>),

    #[error("Machine failed to start: {0}")]
    Start(#[from] MachineError),
}

impl From<InsertError> for BuildError {
    fn from(error: InsertError) -> Self {
        match error {
            InsertError::EmptyName => Self::EmptyName,
            InsertError::Duplicate { name } => Self::DuplicateState { name },
            InsertError::UnknownParent { parent } => Self::UnknownParent { parent },
        }
    }
}

fn summarize(violations: &[TreeViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_tree_lists_every_violation() {
        let error = BuildError::MalformedTree(vec![
            TreeViolation::Empty {
                machine: "m".to_string(),
            },
            TreeViolation::OrphanedChild {
                name: "x".to_string(),
            },
        ]);
        let message = error.to_string();
        assert!(message.contains("2 violation(s)"));
        assert!(message.contains("Machine 'm' has no states"));
        assert!(message.contains("'x'"));
    }

    #[test]
    fn insert_errors_convert() {
        let error = BuildError::from(InsertError::Duplicate {
            name: "s1".to_string(),
        });
        assert!(matches!(error, BuildError::DuplicateState { name } if name == "s1"));
    }
}
