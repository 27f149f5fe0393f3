//! States: the immutable nodes of a machine's tree.
//!
//! A [`State`] knows its identity, its place in the tree and its four
//! behavior hooks. Single-state operations (`enter`, `init`, `signal`,
//! `exit`) only run the state's own hook; walking into children is the
//! engine's job.

use super::cause::Cause;
use super::transition::{Reaction, Target};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Hook run when a state is entered or exited.
pub type StateHook = Rc<dyn Fn(&State, &Cause)>;

/// Hook choosing the child to enter when a state has no explicit path.
pub type InitHook = Rc<dyn Fn(&State, &Cause) -> Option<Target>>;

/// Hook answering a cause with a [`Reaction`].
pub type EventHook = Rc<dyn Fn(&State, &Cause) -> Reaction>;

/// Handle to a state within one machine.
///
/// Handles are small and copyable. Each carries the id of the machine that
/// created it, so a handle never resolves inside a different machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateId {
    index: u32,
    machine: Uuid,
}

impl StateId {
    pub(crate) const fn new(index: u32, machine: Uuid) -> Self {
        Self { index, machine }
    }

    pub(crate) const fn index(self) -> usize {
        self.index as usize
    }

    /// Id of the machine owning this state.
    pub fn machine(&self) -> Uuid {
        self.machine
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Construction options for a state.
///
/// # Example
///
/// ```rust
/// use hsm_engine::{Reaction, StateOptions};
///
/// let opts = StateOptions::new()
///     .on_event(|_state, cause| {
///         if cause.is("reset") {
///             Reaction::goto("idle")
///         } else {
///             Reaction::ignore()
///         }
///     });
/// assert!(!opts.is_parallel());
/// assert!(StateOptions::parallel().is_parallel());
/// ```
#[derive(Clone, Default)]
pub struct StateOptions {
    parallel: bool,
    hooks: Hooks,
}

impl StateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a parallel (orthogonal) state.
    pub fn parallel() -> Self {
        Self {
            parallel: true,
            ..Self::default()
        }
    }

    /// Set the parallel flag.
    pub fn set_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&State, &Cause) + 'static,
    {
        self.hooks.enter = Some(Rc::new(hook));
        self
    }

    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&State, &Cause) -> Option<Target> + 'static,
    {
        self.hooks.init = Some(Rc::new(hook));
        self
    }

    pub fn on_event<F>(mut self, hook: F) -> Self
    where
        F: Fn(&State, &Cause) -> Reaction + 'static,
    {
        self.hooks.event = Some(Rc::new(hook));
        self
    }

    pub fn on_exit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&State, &Cause) + 'static,
    {
        self.hooks.exit = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for StateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateOptions")
            .field("parallel", &self.parallel)
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[derive(Clone, Default)]
struct Hooks {
    enter: Option<StateHook>,
    init: Option<InitHook>,
    event: Option<EventHook>,
    exit: Option<StateHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("enter", &self.enter.is_some())
            .field("init", &self.init.is_some())
            .field("event", &self.event.is_some())
            .field("exit", &self.exit.is_some())
            .finish()
    }
}

/// A node of the state tree. Read-only once the machine is built.
pub struct State {
    id: StateId,
    name: String,
    parent: Option<StateId>,
    pub(crate) depth: usize,
    pub(crate) children: Vec<StateId>,
    parallel: bool,
    hooks: Hooks,
}

impl State {
    pub(crate) fn new(
        id: StateId,
        name: String,
        parent: Option<StateId>,
        depth: usize,
        options: StateOptions,
    ) -> Self {
        Self {
            id,
            name,
            parent,
            depth,
            children: Vec::new(),
            parallel: options.parallel,
            hooks: options.hooks,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent state, `None` for a top-level state.
    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    /// Zero for top-level states.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Children in declaration order; the first one is the default.
    pub fn children(&self) -> &[StateId] {
        &self.children
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// True when upward traversal must stop here.
    ///
    /// Only parallel states are terminal: walking past one has to go
    /// through its region set, since sibling regions share the parent.
    pub fn terminal(&self) -> bool {
        self.parallel
    }

    pub(crate) fn enter(&self, cause: &Cause) {
        if let Some(hook) = &self.hooks.enter {
            hook(self, cause);
        }
    }

    /// Pick the child to enter: the hook's choice, else the first child.
    /// Leaf states return `None`.
    pub(crate) fn init(&self, cause: &Cause) -> Option<Target> {
        let first = *self.children.first()?;
        let chosen = self.hooks.init.as_ref().and_then(|hook| hook(self, cause));
        Some(chosen.unwrap_or(Target::Id(first)))
    }

    pub(crate) fn signal(&self, cause: &Cause) -> Reaction {
        self.hooks
            .event
            .as_ref()
            .map_or(Reaction::Ignore, |hook| hook(self, cause))
    }

    pub(crate) fn exit(&self, cause: &Cause) {
        if let Some(hook) = &self.hooks.exit {
            hook(self, cause);
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("depth", &self.depth)
            .field("children", &self.children)
            .field("parallel", &self.parallel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn node(index: u32, name: &str, options: StateOptions) -> State {
        State::new(
            StateId::new(index, Uuid::nil()),
            name.to_string(),
            None,
            0,
            options,
        )
    }

    #[test]
    fn leaf_init_returns_nothing() {
        let state = node(0, "leaf", StateOptions::new());
        assert!(state.is_leaf());
        assert_eq!(state.init(&Cause::new("x")), None);
    }

    #[test]
    fn init_defaults_to_first_child() {
        let mut state = node(0, "parent", StateOptions::new());
        let first = StateId::new(1, Uuid::nil());
        state.children = vec![first, StateId::new(2, Uuid::nil())];
        assert_eq!(state.init(&Cause::new("x")), Some(Target::Id(first)));
    }

    #[test]
    fn init_hook_overrides_default() {
        let opts = StateOptions::new().on_init(|_, _| Some(Target::from("second")));
        let mut state = node(0, "parent", opts);
        state.children = vec![StateId::new(1, Uuid::nil())];
        assert_eq!(state.init(&Cause::new("x")), Some(Target::from("second")));
    }

    #[test]
    fn hooks_run_only_for_the_state_itself() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (enter_log, exit_log) = (log.clone(), log.clone());
        let opts = StateOptions::new()
            .on_enter(move |s, _| enter_log.borrow_mut().push(format!("{}-ENTRY", s.name())))
            .on_exit(move |s, _| exit_log.borrow_mut().push(format!("{}-EXIT", s.name())));
        let state = node(0, "s", opts);
        state.enter(&Cause::new("x"));
        state.exit(&Cause::new("x"));
        assert_eq!(*log.borrow(), vec!["s-ENTRY", "s-EXIT"]);
    }

    #[test]
    fn signal_without_hook_ignores() {
        let state = node(0, "quiet", StateOptions::new());
        assert!(!state.signal(&Cause::new("x")).is_transition());
    }

    #[test]
    fn parallel_states_are_terminal() {
        assert!(node(0, "p", StateOptions::parallel()).terminal());
        assert!(!node(0, "n", StateOptions::new()).terminal());
    }

    #[test]
    fn handles_compare_by_machine() {
        let a = StateId::new(0, Uuid::new_v4());
        let b = StateId::new(0, Uuid::new_v4());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "#0");
    }
}
