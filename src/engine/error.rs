//! Errors raised while starting or driving a machine.

use crate::core::StateId;
use thiserror::Error;

/// Errors returned by [`Machine`](crate::Machine) operations.
///
/// Lifecycle rejections (`AlreadyStarted`, `NotStarted`, `Busy`,
/// `Terminated`, `Errored`) leave the machine as it was. Every other variant
/// is an invariant violation: the dispatch is aborted and the machine moves
/// to the errored state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MachineError {
    #[error("Machine '{machine}' has already been started")]
    AlreadyStarted { machine: String },

    #[error("Machine '{machine}' has not been started")]
    NotStarted { machine: String },

    #[error("Machine '{machine}' is busy dispatching '{cause}'")]
    Busy { machine: String, cause: String },

    #[error("Machine '{machine}' has terminated")]
    Terminated { machine: String },

    #[error("Machine '{machine}' is in the errored state")]
    Errored { machine: String },

    #[error("Machine '{machine}' has no states to enter")]
    NoStates { machine: String },

    #[error("State {state} does not belong to machine '{machine}'")]
    InvalidState { machine: String, state: StateId },

    #[error("Init of '{state}' selected '{selected}', which is not one of its children")]
    InitNotChild { state: String, selected: String },

    #[error("Init of '{state}' selected unknown state '{target}'")]
    UnknownInitTarget { state: String, target: String },

    #[error("Search for the common ancestor of '{source_state}' and '{target}' walked past the root")]
    PastRoot {
        source_state: String,
        target: String,
    },

    #[error("Re-entry path expected a child of '{parent}' but found '{found}'")]
    MismatchedPath { parent: String, found: String },

    #[error("Region ran out of states before reaching '{stop}'")]
    PartialExit { stop: String },

    #[error("No active region at the recorded address")]
    MissingRegion,
}

impl MachineError {
    /// True for errors that reject a call without changing the machine.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::AlreadyStarted { .. }
                | Self::NotStarted { .. }
                | Self::Busy { .. }
                | Self::Terminated { .. }
                | Self::Errored { .. }
        )
    }
}
