//! The machine: owner of the active configuration and the dispatch loop.

use super::callbacks::Callbacks;
use super::config::MachineConfig;
use super::context::Context;
use super::emitter::{Emitter, Mailbox};
use super::error::MachineError;
use super::region::Region;
use super::xfer::{self, Destination};
use crate::core::{Cause, State, StateId, StateTree, TransitionHistory, TransitionRecord};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, debug_span, error, warn};

/// Lifecycle of a machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Unstarted,
    Running,
    Emitting,
    Terminated,
    Errored,
}

impl RunState {
    /// True once the machine no longer accepts causes.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Terminated | Self::Errored)
    }
}

/// Outcome of dispatching one cause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// This many transitions were applied.
    Transitioned(usize),
    /// No active state requested a transition.
    Unhandled,
    /// The cause led to the terminal pseudo-state.
    Terminated,
    /// The cause led to the error pseudo-state.
    Errored,
}

impl Dispatch {
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Unhandled)
    }
}

/// A hierarchical state machine with parallel regions.
///
/// Built with [`MachineBuilder`](crate::MachineBuilder). Single-threaded:
/// hooks run synchronously inside [`emit`](Self::emit).
///
/// # Example
///
/// ```rust
/// use hsm_engine::{Dispatch, MachineBuilder, Reaction, StateOptions};
///
/// let mut builder = MachineBuilder::new("switch");
/// builder
///     .add_state(None, "off", StateOptions::new().on_event(|_, cause| {
///         if cause.is("flip") { Reaction::goto("on") } else { Reaction::ignore() }
///     }))
///     .unwrap();
/// builder
///     .add_state(None, "on", StateOptions::new().on_event(|_, cause| {
///         if cause.is("flip") { Reaction::goto("off") } else { Reaction::ignore() }
///     }))
///     .unwrap();
///
/// let mut machine = builder.start(None).unwrap();
/// assert_eq!(machine.active_states(), vec!["off"]);
/// assert_eq!(machine.emit("flip").unwrap(), Dispatch::Transitioned(1));
/// assert_eq!(machine.active_states(), vec!["on"]);
/// assert_eq!(machine.emit("kick").unwrap(), Dispatch::Unhandled);
/// ```
#[derive(Debug)]
pub struct Machine {
    tree: StateTree,
    callbacks: Callbacks,
    config: MachineConfig,
    root: Region,
    history: TransitionHistory,
    run_state: RunState,
    mailbox: Rc<RefCell<Mailbox>>,
}

impl Machine {
    pub(crate) fn new(
        tree: StateTree,
        callbacks: Callbacks,
        config: MachineConfig,
        mailbox: Rc<RefCell<Mailbox>>,
    ) -> Self {
        mailbox.borrow_mut().queue_reentrant = config.queue_reentrant;
        Self {
            history: TransitionHistory::with_limit(config.history_limit),
            tree,
            callbacks,
            config,
            root: Region::default(),
            run_state: RunState::Unstarted,
            mailbox,
        }
    }

    /// Enter `initial` (or the first top-level state), running init at
    /// every level below it.
    pub fn start(&mut self, initial: Option<StateId>) -> Result<(), MachineError> {
        if self.run_state != RunState::Unstarted {
            return Err(MachineError::AlreadyStarted {
                machine: self.tree.name().to_string(),
            });
        }
        let first = match initial {
            Some(id) => self
                .tree
                .get(id)
                .map(State::id)
                .ok_or_else(|| MachineError::InvalidState {
                    machine: self.tree.name().to_string(),
                    state: id,
                })?,
            None => *self
                .tree
                .top_level()
                .first()
                .ok_or_else(|| MachineError::NoStates {
                    machine: self.tree.name().to_string(),
                })?,
        };

        let cause = Cause::start();
        debug!(machine = self.tree.name(), initial = %first, "starting");
        self.run_state = RunState::Emitting;
        self.mailbox.borrow_mut().current = Some(cause.name().to_string());
        let entered = {
            let ctx = Context::new(&self.tree, &self.callbacks, &cause);
            ctx.follow_path(&mut self.root, self.tree.path_to_top(first))
        };
        self.mailbox.borrow_mut().current = None;
        if let Err(e) = entered {
            self.fail(&e);
            return Err(e);
        }
        self.run_state = RunState::Running;

        // Causes posted by enter hooks.
        self.pump(None)?;
        Ok(())
    }

    /// Dispatch a cause, after any causes already waiting in the mailbox.
    ///
    /// Returns how this cause was handled. If an earlier queued cause stops
    /// the machine, this cause is discarded and the stop is reported.
    pub fn emit(&mut self, cause: impl Into<Cause>) -> Result<Dispatch, MachineError> {
        let cause = cause.into();
        self.check_accepting(&cause)?;
        let (outcome, _) = self.pump(Some(cause))?;
        Ok(outcome.unwrap_or(match self.run_state {
            RunState::Errored => Dispatch::Errored,
            _ => Dispatch::Terminated,
        }))
    }

    /// Dispatch every cause waiting in the mailbox. Returns how many were
    /// dispatched.
    pub fn flush(&mut self) -> Result<usize, MachineError> {
        self.check_accepting(&Cause::new("flush"))?;
        let (_, dispatched) = self.pump(None)?;
        Ok(dispatched)
    }

    fn check_accepting(&self, cause: &Cause) -> Result<(), MachineError> {
        let machine = self.tree.name().to_string();
        match self.run_state {
            RunState::Unstarted => Err(MachineError::NotStarted { machine }),
            RunState::Terminated => Err(MachineError::Terminated { machine }),
            RunState::Errored => Err(MachineError::Errored { machine }),
            RunState::Emitting => Err(MachineError::Busy {
                machine,
                cause: cause.name().to_string(),
            }),
            RunState::Running => Ok(()),
        }
    }

    /// Drain the mailbox, with `cause` queued behind whatever already waits.
    /// Returns the dispatch outcome of `cause` when it was reached, and the
    /// number of causes dispatched.
    fn pump(&mut self, cause: Option<Cause>) -> Result<(Option<Dispatch>, usize), MachineError> {
        let watched = cause.map(|cause| {
            let mut mailbox = self.mailbox.borrow_mut();
            mailbox.queue.push_back(cause);
            mailbox.queue.len() - 1
        });

        let mut outcome = None;
        let mut index = 0;
        loop {
            let next = self.mailbox.borrow_mut().queue.pop_front();
            let Some(cause) = next else {
                break;
            };
            self.run_state = RunState::Emitting;
            self.mailbox.borrow_mut().current = Some(cause.name().to_string());
            let dispatched = self.dispatch(&cause);
            self.mailbox.borrow_mut().current = None;

            let dispatch = match dispatched {
                Ok(dispatch) => dispatch,
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            };
            if Some(index) == watched {
                outcome = Some(dispatch);
            }
            index += 1;

            match dispatch {
                Dispatch::Terminated => {
                    self.run_state = RunState::Terminated;
                    self.close(MachineError::Terminated {
                        machine: self.tree.name().to_string(),
                    });
                    return Ok((outcome, index));
                }
                Dispatch::Errored => {
                    error!(
                        machine = self.tree.name(),
                        cause = cause.name(),
                        "machine moved to the error state"
                    );
                    self.run_state = RunState::Errored;
                    self.close(MachineError::Errored {
                        machine: self.tree.name().to_string(),
                    });
                    return Ok((outcome, index));
                }
                Dispatch::Transitioned(_) | Dispatch::Unhandled => {}
            }
        }

        self.run_state = RunState::Running;
        Ok((outcome, index))
    }

    fn dispatch(&mut self, cause: &Cause) -> Result<Dispatch, MachineError> {
        let span = debug_span!("dispatch", machine = self.tree.name(), cause = cause.name());
        let _guard = span.enter();

        let ctx = Context::new(&self.tree, &self.callbacks, cause);
        let xfers = xfer::plan(&ctx, &self.root)?;
        if xfers.is_empty() {
            debug!("unhandled");
            self.callbacks.event(None, cause);
            return Ok(Dispatch::Unhandled);
        }

        let mut applied = 0;
        for xfer in xfers {
            let destination = xfer.destination;
            let record = TransitionRecord {
                source: ctx.name_of(xfer.source),
                target: match destination {
                    Destination::State(id) => ctx.name_of(id),
                    Destination::Terminate => "<terminate>".to_string(),
                    Destination::Error => "<error>".to_string(),
                },
                cause: cause.name().to_string(),
                timestamp: Utc::now(),
            };
            debug!(from = %record.source, to = %record.target, "transition");
            xfer.apply(&ctx, &mut self.root)?;
            self.history.record(record);
            applied += 1;

            match destination {
                Destination::Terminate => return Ok(Dispatch::Terminated),
                Destination::Error => return Ok(Dispatch::Errored),
                Destination::State(_) => {}
            }
        }
        Ok(Dispatch::Transitioned(applied))
    }

    fn fail(&mut self, e: &MachineError) {
        error!(machine = self.tree.name(), error = %e, "dispatch aborted");
        self.run_state = RunState::Errored;
        self.close(MachineError::Errored {
            machine: self.tree.name().to_string(),
        });
    }

    fn close(&mut self, reason: MachineError) {
        let mut mailbox = self.mailbox.borrow_mut();
        if !mailbox.queue.is_empty() {
            warn!(
                machine = self.tree.name(),
                discarded = mailbox.queue.len(),
                "machine stopped, discarding queued causes"
            );
            mailbox.queue.clear();
        }
        mailbox.current = None;
        mailbox.closed = Some(reason);
    }

    pub fn name(&self) -> &str {
        self.tree.name()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn history(&self) -> &TransitionHistory {
        &self.history
    }

    /// A handle for posting causes from hooks.
    pub fn emitter(&self) -> Emitter {
        Emitter::new(self.mailbox.clone())
    }

    /// With `None`, whether the machine is running; otherwise whether the
    /// named state is active.
    pub fn is_active(&self, name: Option<&str>) -> bool {
        match name {
            None => matches!(self.run_state, RunState::Running | RunState::Emitting),
            Some(name) => self
                .tree
                .find(name)
                .is_some_and(|state| self.is_in(state.id())),
        }
    }

    pub fn is_in(&self, state: StateId) -> bool {
        self.active_ids().contains(&state)
    }

    /// Names of the active states, in tree pre-order.
    pub fn active_states(&self) -> Vec<&str> {
        let active = self.active_ids();
        self.tree
            .pre_order()
            .into_iter()
            .filter(|state| active.contains(&state.id()))
            .map(State::name)
            .collect()
    }

    fn active_ids(&self) -> Vec<StateId> {
        let mut active = Vec::new();
        self.root.collect_active(&self.tree, &mut active);
        active
    }

    pub fn find_state_by_name(&self, name: &str) -> Option<&State> {
        self.tree.find(name)
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.tree.get(id)
    }

    /// Every state in tree pre-order.
    pub fn states(&self) -> Vec<&State> {
        self.tree.pre_order()
    }

    /// Pre-order names headed by the machine, which acts as the implicit root.
    pub fn traverse(&self) -> Vec<&str> {
        std::iter::once(self.name())
            .chain(self.tree.pre_order().into_iter().map(State::name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MachineBuilder;
    use crate::core::{Reaction, StateOptions};
    use std::cell::Cell;

    fn on(name: &'static str, target: &'static str) -> StateOptions {
        StateOptions::new().on_event(move |_, cause| {
            if cause.is(name) {
                Reaction::goto(target)
            } else {
                Reaction::ignore()
            }
        })
    }

    fn two_states(builder: &mut MachineBuilder) {
        builder.add_state(None, "a", on("go", "b")).unwrap();
        builder.add_state(None, "b", on("back", "a")).unwrap();
    }

    #[test]
    fn emit_before_start_is_rejected() {
        let mut builder = MachineBuilder::new("m");
        two_states(&mut builder);
        let mut machine = builder.finalize().unwrap();
        assert_eq!(machine.run_state(), RunState::Unstarted);
        assert!(matches!(
            machine.emit("go"),
            Err(MachineError::NotStarted { .. })
        ));
        machine.start(None).unwrap();
        assert!(matches!(
            machine.start(None),
            Err(MachineError::AlreadyStarted { .. })
        ));
    }

    #[test]
    fn history_records_applied_transitions() {
        let mut builder = MachineBuilder::new("m");
        two_states(&mut builder);
        let mut machine = builder.start(None).unwrap();
        machine.emit("go").unwrap();
        machine.emit("nothing").unwrap();
        machine.emit("back").unwrap();
        assert_eq!(machine.history().get_path(), vec!["b", "a"]);
        assert_eq!(machine.history().last().unwrap().cause, "back");
    }

    #[test]
    fn terminate_exits_everything_and_closes() {
        let exits = Rc::new(Cell::new(0));
        let counter = exits.clone();
        let mut builder = MachineBuilder::new("m");
        let opts = StateOptions::new()
            .on_exit(move |_, _| counter.set(counter.get() + 1))
            .on_event(|_, cause| {
                if cause.is("end") {
                    Reaction::terminate()
                } else {
                    Reaction::ignore()
                }
            });
        let top = builder.add_state(None, "top", opts).unwrap();
        builder.add_state(Some(top), "inner", StateOptions::new()).unwrap();
        let mut machine = builder.start(None).unwrap();
        let emitter = machine.emitter();

        assert_eq!(machine.emit("end").unwrap(), Dispatch::Terminated);
        assert_eq!(exits.get(), 1);
        assert!(machine.active_states().is_empty());
        assert!(!machine.is_active(None));
        assert!(matches!(
            machine.emit("end"),
            Err(MachineError::Terminated { .. })
        ));
        assert!(emitter.is_closed());
    }

    #[test]
    fn error_target_stops_without_exiting() {
        let exits = Rc::new(Cell::new(0));
        let counter = exits.clone();
        let mut builder = MachineBuilder::new("m");
        let opts = StateOptions::new()
            .on_exit(move |_, _| counter.set(counter.get() + 1))
            .on_event(|_, _| Reaction::fail());
        builder.add_state(None, "only", opts).unwrap();
        let mut machine = builder.start(None).unwrap();

        assert_eq!(machine.emit("anything").unwrap(), Dispatch::Errored);
        assert_eq!(machine.run_state(), RunState::Errored);
        assert_eq!(exits.get(), 0);
        assert_eq!(machine.active_states(), vec!["only"]);
        assert!(matches!(
            machine.emit("again"),
            Err(MachineError::Errored { .. })
        ));
    }

    #[test]
    fn invariant_violation_moves_to_errored() {
        let mut builder = MachineBuilder::new("m");
        let top = builder
            .add_state(
                None,
                "top",
                StateOptions::new().on_init(|_, _| Some("elsewhere".into())),
            )
            .unwrap();
        builder.add_state(Some(top), "child", StateOptions::new()).unwrap();
        builder.add_state(None, "elsewhere", StateOptions::new()).unwrap();

        let mut machine = builder.finalize().unwrap();
        let result = machine.start(None);
        assert!(matches!(result, Err(MachineError::InitNotChild { .. })));
        assert_eq!(machine.run_state(), RunState::Errored);
    }

    #[test]
    fn causes_posted_while_idle_run_first() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let mut builder = MachineBuilder::new("m");
        builder
            .add_state(
                None,
                "a",
                StateOptions::new().on_event(move |_, cause| {
                    log.borrow_mut().push(cause.name().to_string());
                    Reaction::ignore()
                }),
            )
            .unwrap();
        let mut machine = builder.start(None).unwrap();
        let emitter = machine.emitter();
        emitter.emit("first").unwrap();
        emitter.emit("second").unwrap();

        assert_eq!(machine.emit("third").unwrap(), Dispatch::Unhandled);
        assert_eq!(*seen.borrow(), vec!["first", "second", "third"]);

        emitter.emit("fourth").unwrap();
        assert_eq!(machine.flush().unwrap(), 1);
        assert_eq!(emitter.pending(), 0);
    }

    #[test]
    fn reentrant_emit_is_queued_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut builder = MachineBuilder::new("m");
        let emitter = builder.emitter();
        let log = seen.clone();
        builder
            .add_state(
                None,
                "a",
                StateOptions::new().on_event(move |_, cause| {
                    log.borrow_mut().push(cause.name().to_string());
                    if cause.is("outer") {
                        emitter.emit("inner-1").unwrap();
                        emitter.emit("inner-2").unwrap();
                    }
                    Reaction::ignore()
                }),
            )
            .unwrap();
        let mut machine = builder.start(None).unwrap();
        machine.emit("outer").unwrap();
        assert_eq!(*seen.borrow(), vec!["outer", "inner-1", "inner-2"]);
    }

    #[test]
    fn reentrant_emit_rejected_when_not_queueing() {
        let rejected = Rc::new(Cell::new(false));
        let config = MachineConfig::default().queue_reentrant(false);
        let mut builder = MachineBuilder::new("m").config(config);
        let emitter = builder.emitter();
        let flag = rejected.clone();
        builder
            .add_state(
                None,
                "a",
                StateOptions::new().on_event(move |_, _| {
                    if let Err(MachineError::Busy { .. }) = emitter.emit("nested") {
                        flag.set(true);
                    }
                    Reaction::ignore()
                }),
            )
            .unwrap();
        let mut machine = builder.start(None).unwrap();
        machine.emit("outer").unwrap();
        assert!(rejected.get());
        assert_eq!(machine.emitter().pending(), 0);
    }

    #[test]
    fn unhandled_reports_none_state() {
        let unhandled = Rc::new(Cell::new(0));
        let counter = unhandled.clone();
        let callbacks = Callbacks::new().on_event(move |state, _| {
            if state.is_none() {
                counter.set(counter.get() + 1);
            }
        });
        let mut builder = MachineBuilder::new("m").callbacks(callbacks);
        two_states(&mut builder);
        let mut machine = builder.start(None).unwrap();
        assert_eq!(machine.emit("back").unwrap(), Dispatch::Unhandled);
        assert_eq!(machine.emit("go").unwrap(), Dispatch::Transitioned(1));
        assert_eq!(unhandled.get(), 1);
    }

    #[test]
    fn queries_reflect_configuration() {
        let mut builder = MachineBuilder::new("m");
        two_states(&mut builder);
        let mut machine = builder.start(None).unwrap();
        let b = machine.find_state_by_name("b").unwrap().id();
        assert!(!machine.is_in(b));
        machine.emit("go").unwrap();
        assert!(machine.is_in(b));
        assert!(machine.is_active(Some("b")));
        assert!(!machine.is_active(Some("missing")));
        assert_eq!(machine.state(b).unwrap().name(), "b");
        assert_eq!(machine.states().len(), 2);
        assert_eq!(machine.name(), "m");
    }
}
