//! Execution of built machines.
//!
//! This is the imperative shell around [`crate::core`]: it owns the active
//! configuration, runs hooks and callbacks, and applies transitions. A
//! dispatch first plans every transfer without mutating anything, then
//! applies them in order.

mod callbacks;
mod config;
mod context;
mod emitter;
mod error;
mod machine;
mod region;
mod xfer;

pub use callbacks::Callbacks;
pub use config::{ConfigError, MachineConfig};
pub use emitter::Emitter;
pub(crate) use emitter::Mailbox;
pub use error::MachineError;
pub use machine::{Dispatch, Machine, RunState};
