//! Core data types of the engine.
//!
//! This module contains the static, side-effect free part of a machine:
//! - Causes dispatched into the machine
//! - States, their handles and construction options
//! - The state tree arena with per-machine name lookup
//! - Transition requests returned by event hooks
//! - The bounded transition history
//!
//! Everything that walks the active configuration and runs hooks lives in
//! [`crate::engine`].

mod cause;
mod history;
mod state;
mod transition;
mod tree;

pub use cause::{Cause, START_CAUSE};
pub use history::{TransitionHistory, TransitionRecord};
pub use state::{EventHook, InitHook, State, StateHook, StateId, StateOptions};
pub use transition::{Action, Reaction, Target, TransitionRequest};
pub use tree::{InsertError, StateTree, TreeViolation};
