//! HSM Engine: hierarchical state machines with parallel regions
//!
//! The engine drives a statically built tree of named states. It sequences
//! entry, init and exit hooks, bubbles causes from the active leaves upward
//! until a state requests a transition, computes the lowest common ancestor
//! of each transition and applies internal or external semantics. Parallel
//! states keep one independently progressing region per child.
//!
//! # Core Concepts
//!
//! - **State**: An immutable tree node with enter, init, event and exit hooks
//! - **Cause**: An event dispatched into the machine, with optional payload
//! - **Reaction**: The value an event hook returns to request a transition
//! - **Machine**: Owner of the active configuration and the dispatch loop
//!
//! The crate follows a "pure core, imperative shell" split: [`core`] holds
//! the static tree and value types, [`engine`] runs hooks and mutates the
//! active configuration, and [`builder`] assembles trees.
//!
//! # Example
//!
//! ```rust
//! use hsm_engine::{Callbacks, MachineBuilder, Reaction, StateOptions};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = log.clone();
//! let callbacks = Callbacks::new()
//!     .on_enter(move |state, _| sink.borrow_mut().push(state.name().to_string()));
//!
//! let mut builder = MachineBuilder::new("editor").callbacks(callbacks);
//! let mut editing = builder
//!     .new_state(
//!         "editing",
//!         StateOptions::new().on_event(|_, cause| {
//!             if cause.is("save") {
//!                 Reaction::goto("saving")
//!             } else {
//!                 Reaction::ignore()
//!             }
//!         }),
//!     )
//!     .unwrap();
//! editing.new_state("clean", StateOptions::new()).unwrap();
//! editing.new_state("dirty", StateOptions::new()).unwrap();
//! builder.new_state("saving", StateOptions::new()).unwrap();
//!
//! let mut machine = builder.start(None).unwrap();
//! machine.emit("save").unwrap();
//!
//! assert_eq!(machine.active_states(), vec!["saving"]);
//! assert_eq!(*log.borrow(), vec!["editing", "clean", "saving"]);
//! ```

pub mod builder;
pub mod core;
pub mod engine;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, StateBuilder};
pub use self::core::{
    Cause, Reaction, State, StateId, StateOptions, Target, TransitionHistory, TransitionRecord,
    TransitionRequest, TreeViolation,
};
pub use engine::{
    Callbacks, ConfigError, Dispatch, Emitter, Machine, MachineConfig, MachineError, RunState,
};
