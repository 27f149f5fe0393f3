//! Transition requests returned by event hooks.
//!
//! An event hook answers a cause with a [`Reaction`] value instead of
//! mutating a shared sink. The engine resolves the request afterwards.

use super::cause::Cause;
use super::state::StateId;
use std::fmt;
use std::rc::Rc;

/// Action run at the moment a transition is taken.
pub type Action = Rc<dyn Fn(&Cause)>;

/// Where a transition request leads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A state looked up by name within the machine.
    Name(String),
    /// A state handle.
    Id(StateId),
    /// Terminal pseudo-state: the machine ends deliberately.
    Terminate,
    /// Error pseudo-state: the machine stops in the errored state.
    Error,
}

impl Target {
    /// True for the terminal and error pseudo-states.
    pub fn is_pseudo(&self) -> bool {
        matches!(self, Self::Terminate | Self::Error)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<StateId> for Target {
    fn from(id: StateId) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => write!(f, "{id}"),
            Self::Terminate => f.write_str("<terminate>"),
            Self::Error => f.write_str("<error>"),
        }
    }
}

/// A request to move the machine to a new target.
#[derive(Clone)]
pub struct TransitionRequest {
    pub(crate) target: Target,
    /// `None` defers to the machine policy: self-transitions are external,
    /// everything else asks `Callbacks::is_external`.
    pub(crate) external: Option<bool>,
    pub(crate) action: Option<Action>,
}

impl TransitionRequest {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn external(&self) -> Option<bool> {
        self.external
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }
}

impl fmt::Debug for TransitionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRequest")
            .field("target", &self.target)
            .field("external", &self.external)
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// What a state's event hook does with a cause.
///
/// # Example
///
/// ```rust
/// use hsm_engine::{Reaction, Target};
///
/// let ignored = Reaction::ignore();
/// assert!(!ignored.is_transition());
///
/// let jump = Reaction::goto("idle").internal().run(|_cause| {});
/// let request = jump.request().unwrap();
/// assert_eq!(request.target(), &Target::from("idle"));
/// assert_eq!(request.external(), Some(false));
/// assert!(request.has_action());
/// ```
#[derive(Clone, Debug, Default)]
pub enum Reaction {
    /// The state does not handle the cause; bubbling continues upward.
    #[default]
    Ignore,
    /// The state requests a transition.
    Goto(TransitionRequest),
}

impl Reaction {
    pub fn ignore() -> Self {
        Self::Ignore
    }

    /// Request a transition using the machine's internal/external policy.
    pub fn goto(target: impl Into<Target>) -> Self {
        Self::Goto(TransitionRequest {
            target: target.into(),
            external: None,
            action: None,
        })
    }

    /// Request the terminal pseudo-state.
    pub fn terminate() -> Self {
        Self::goto(Target::Terminate)
    }

    /// Request the error pseudo-state.
    pub fn fail() -> Self {
        Self::goto(Target::Error)
    }

    /// Mark the transition internal: the LCA is not exited.
    pub fn internal(self) -> Self {
        self.with_external(false)
    }

    /// Mark the transition external: the LCA is exited and re-entered.
    pub fn external(self) -> Self {
        self.with_external(true)
    }

    fn with_external(self, external: bool) -> Self {
        match self {
            Self::Goto(mut request) => {
                request.external = Some(external);
                Self::Goto(request)
            }
            Self::Ignore => Self::Ignore,
        }
    }

    /// Attach an action, run when the transition is taken.
    pub fn run<F>(self, action: F) -> Self
    where
        F: Fn(&Cause) + 'static,
    {
        match self {
            Self::Goto(mut request) => {
                request.action = Some(Rc::new(action));
                Self::Goto(request)
            }
            Self::Ignore => Self::Ignore,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Goto(_))
    }

    pub fn request(&self) -> Option<&TransitionRequest> {
        match self {
            Self::Goto(request) => Some(request),
            Self::Ignore => None,
        }
    }

    pub(crate) fn into_request(self) -> Option<TransitionRequest> {
        match self {
            Self::Goto(request) => Some(request),
            Self::Ignore => None,
        }
    }
}

impl From<Option<Target>> for Reaction {
    fn from(target: Option<Target>) -> Self {
        target.map_or(Self::Ignore, |target| Self::goto(target))
    }
}
