//! Builder API for assembling state trees.
//!
//! Trees are built top-down through [`MachineBuilder`] and [`StateBuilder`],
//! then validated and handed to a [`Machine`](crate::Machine). Nothing here
//! is used after the machine exists.

pub mod error;
pub mod machine;
pub mod state;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use state::StateBuilder;
