//! Machine-wide callbacks run around every per-state hook.
//!
//! Adapters use these for logging and display sync. Each global callback
//! runs before the state's own hook.

use crate::core::{Cause, State, Target};
use std::fmt;
use std::rc::Rc;

type StateCallback = Rc<dyn Fn(&State, &Cause)>;
type InitCallback = Rc<dyn Fn(&State, &Cause) -> Option<Target>>;
type EventCallback = Rc<dyn Fn(Option<&State>, &Cause)>;
type TransitionCallback = Rc<dyn Fn(&State, &Cause, Option<&State>)>;
type ExternalPolicy = Rc<dyn Fn(&State, &Cause, &State) -> bool>;

/// Global callbacks of one machine.
///
/// # Example
///
/// ```rust
/// use hsm_engine::Callbacks;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let sink = log.clone();
/// let callbacks = Callbacks::new()
///     .on_enter(move |state, _| sink.borrow_mut().push(state.name().to_string()))
///     .is_external(|_source, _cause, _target| false);
/// # let _ = callbacks;
/// ```
#[derive(Clone, Default)]
pub struct Callbacks {
    enter: Option<StateCallback>,
    init: Option<InitCallback>,
    event: Option<EventCallback>,
    exit: Option<StateCallback>,
    transition: Option<TransitionCallback>,
    external: Option<ExternalPolicy>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enter<F>(mut self, callback: F) -> Self
    where
        F: Fn(&State, &Cause) + 'static,
    {
        self.enter = Some(Rc::new(callback));
        self
    }

    /// A returned target takes precedence over the state's own init hook.
    pub fn on_init<F>(mut self, callback: F) -> Self
    where
        F: Fn(&State, &Cause) -> Option<Target> + 'static,
    {
        self.init = Some(Rc::new(callback));
        self
    }

    /// Called before each state is signalled, and once with `None` when no
    /// active state handles a cause.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&State>, &Cause) + 'static,
    {
        self.event = Some(Rc::new(callback));
        self
    }

    pub fn on_exit<F>(mut self, callback: F) -> Self
    where
        F: Fn(&State, &Cause) + 'static,
    {
        self.exit = Some(Rc::new(callback));
        self
    }

    /// Called when a transition is taken, before anything is exited.
    /// The target is `None` for the terminate and error pseudo-states.
    pub fn on_transition<F>(mut self, callback: F) -> Self
    where
        F: Fn(&State, &Cause, Option<&State>) + 'static,
    {
        self.transition = Some(Rc::new(callback));
        self
    }

    /// Policy for requests that do not say whether they are external.
    /// Without a policy, non-self transitions are internal.
    pub fn is_external<F>(mut self, policy: F) -> Self
    where
        F: Fn(&State, &Cause, &State) -> bool + 'static,
    {
        self.external = Some(Rc::new(policy));
        self
    }

    pub(crate) fn entered(&self, state: &State, cause: &Cause) {
        if let Some(callback) = &self.enter {
            callback(state, cause);
        }
    }

    pub(crate) fn init(&self, state: &State, cause: &Cause) -> Option<Target> {
        self.init.as_ref().and_then(|callback| callback(state, cause))
    }

    pub(crate) fn event(&self, state: Option<&State>, cause: &Cause) {
        if let Some(callback) = &self.event {
            callback(state, cause);
        }
    }

    pub(crate) fn exited(&self, state: &State, cause: &Cause) {
        if let Some(callback) = &self.exit {
            callback(state, cause);
        }
    }

    pub(crate) fn transition(&self, source: &State, cause: &Cause, target: Option<&State>) {
        if let Some(callback) = &self.transition {
            callback(source, cause, target);
        }
    }

    pub(crate) fn external(&self, source: &State, cause: &Cause, target: &State) -> bool {
        self.external
            .as_ref()
            .is_some_and(|policy| policy(source, cause, target))
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_enter", &self.enter.is_some())
            .field("on_init", &self.init.is_some())
            .field("on_event", &self.event.is_some())
            .field("on_exit", &self.exit.is_some())
            .field("on_transition", &self.transition.is_some())
            .field("is_external", &self.external.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_callbacks_are_inert() {
        let callbacks = Callbacks::new();
        let cause = Cause::new("x");
        callbacks.event(None, &cause);
        assert!(format!("{callbacks:?}").contains("on_enter: false"));
    }
}
