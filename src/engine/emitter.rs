//! Re-entrant cause submission.
//!
//! Hooks never borrow the machine. They post causes through an [`Emitter`],
//! a cheap handle onto the machine's FIFO mailbox.

use super::error::MachineError;
use crate::core::Cause;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug)]
pub(crate) struct Mailbox {
    pub(crate) machine: String,
    pub(crate) queue_reentrant: bool,
    /// Name of the cause being dispatched, if any.
    pub(crate) current: Option<String>,
    /// Set once the machine stops accepting causes.
    pub(crate) closed: Option<MachineError>,
    pub(crate) queue: VecDeque<Cause>,
}

impl Mailbox {
    pub(crate) fn shared(machine: impl Into<String>, queue_reentrant: bool) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            machine: machine.into(),
            queue_reentrant,
            current: None,
            closed: None,
            queue: VecDeque::new(),
        }))
    }
}

/// Handle for posting causes to a machine from inside its hooks.
///
/// While a dispatch runs, posted causes are queued behind it (or rejected
/// as busy when the machine does not queue re-entrant causes). Causes
/// posted while the machine is idle wait until the next
/// [`Machine::emit`](crate::Machine::emit) or
/// [`Machine::flush`](crate::Machine::flush).
///
/// # Example
///
/// ```rust
/// use hsm_engine::{MachineBuilder, Reaction, StateOptions};
///
/// let mut builder = MachineBuilder::new("door");
/// let emitter = builder.emitter();
/// builder
///     .add_state(None, "closed", StateOptions::new().on_event(move |_, cause| {
///         if cause.is("knock") {
///             emitter.emit("open").unwrap();
///         }
///         if cause.is("open") {
///             Reaction::goto("opened")
///         } else {
///             Reaction::ignore()
///         }
///     }))
///     .unwrap();
/// builder.add_state(None, "opened", StateOptions::new()).unwrap();
///
/// let mut machine = builder.start(None).unwrap();
/// machine.emit("knock").unwrap();
/// assert!(machine.is_active(Some("opened")));
/// ```
#[derive(Clone, Debug)]
pub struct Emitter {
    mailbox: Rc<RefCell<Mailbox>>,
}

impl Emitter {
    pub(crate) fn new(mailbox: Rc<RefCell<Mailbox>>) -> Self {
        Self { mailbox }
    }

    /// Post a cause.
    pub fn emit(&self, cause: impl Into<Cause>) -> Result<(), MachineError> {
        let cause = cause.into();
        let mut mailbox = self.mailbox.borrow_mut();
        if let Some(error) = &mailbox.closed {
            return Err(error.clone());
        }
        if let (Some(current), false) = (&mailbox.current, mailbox.queue_reentrant) {
            return Err(MachineError::Busy {
                machine: mailbox.machine.clone(),
                cause: current.clone(),
            });
        }
        mailbox.queue.push_back(cause);
        Ok(())
    }

    /// Number of causes waiting in the mailbox.
    pub fn pending(&self) -> usize {
        self.mailbox.borrow().queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.borrow().closed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_causes_are_queued_in_order() {
        let emitter = Emitter::new(Mailbox::shared("m", false));
        emitter.emit("a").unwrap();
        emitter.emit(Cause::new("b")).unwrap();
        assert_eq!(emitter.pending(), 2);
        let names: Vec<String> = emitter
            .mailbox
            .borrow()
            .queue
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn reentrant_causes_rejected_without_queueing() {
        let mailbox = Mailbox::shared("m", false);
        mailbox.borrow_mut().current = Some("running".to_string());
        let emitter = Emitter::new(mailbox);
        let result = emitter.emit("late");
        assert_eq!(
            result,
            Err(MachineError::Busy {
                machine: "m".to_string(),
                cause: "running".to_string()
            })
        );
        assert_eq!(emitter.pending(), 0);
    }

    #[test]
    fn reentrant_causes_queued_when_enabled() {
        let mailbox = Mailbox::shared("m", true);
        mailbox.borrow_mut().current = Some("running".to_string());
        let emitter = Emitter::new(mailbox);
        emitter.emit("late").unwrap();
        assert_eq!(emitter.pending(), 1);
    }

    #[test]
    fn closed_mailbox_rejects() {
        let mailbox = Mailbox::shared("m", true);
        mailbox.borrow_mut().closed = Some(MachineError::Terminated {
            machine: "m".to_string(),
        });
        let emitter = Emitter::new(mailbox);
        assert!(emitter.is_closed());
        assert!(matches!(
            emitter.emit("x"),
            Err(MachineError::Terminated { .. })
        ));
    }
}
