//! Transition planning and application.
//!
//! Dispatch runs in two phases. Planning walks the active configuration
//! read-only, signalling states and resolving each winning request into an
//! [`Xfer`]: its lowest common ancestor, the re-entry path and the region
//! it applies to. Applying then runs each transfer's action, exits below
//! the boundary and follows the path back down.
//!
//! Bubbling visits every sub-region of a parallel state depth-first, left to
//! right, before the parallel state and its ancestors are signalled.
//! Requests that settle inside a sub-region are all honored. A request whose
//! common ancestor lies at or above the parallel container escalates and
//! discards every sibling request, since applying it exits the container.

use super::context::Context;
use super::error::MachineError;
use super::region::Region;
use crate::core::{Action, StateId, Target, TransitionRequest};
use tracing::warn;

/// Where a resolved transfer leads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Destination {
    State(StateId),
    Terminate,
    Error,
}

/// One resolved transition.
pub(crate) struct Xfer {
    pub(crate) source: StateId,
    pub(crate) destination: Destination,
    /// `None` is the machine top, above every top-level state.
    pub(crate) lca: Option<StateId>,
    /// External transitions exit and re-enter the LCA itself.
    pub(crate) exit_lca: bool,
    /// Re-entry path below the exit boundary, deepest first.
    pub(crate) path: Vec<StateId>,
    pub(crate) action: Option<Action>,
    /// Address of the region this transfer applies to.
    pub(crate) region: Vec<usize>,
}

impl Xfer {
    /// Resolve a request made by `source`.
    ///
    /// Unknown target names are logged and dropped (`Ok(None)`); foreign
    /// handles are errors.
    pub(crate) fn resolve(
        ctx: &Context<'_>,
        source: StateId,
        request: TransitionRequest,
    ) -> Result<Option<Self>, MachineError> {
        let destination = match &request.target {
            Target::Terminate => Destination::Terminate,
            Target::Error => Destination::Error,
            Target::Id(id) => Destination::State(ctx.state(*id)?.id()),
            Target::Name(name) => match ctx.tree.find(name) {
                Some(state) => Destination::State(state.id()),
                None => {
                    warn!(
                        machine = ctx.tree.name(),
                        from = %ctx.name_of(source),
                        to = %name,
                        cause = ctx.cause.name(),
                        "transition target not found, dropping transition"
                    );
                    return Ok(None);
                }
            },
        };

        let mut xfer = Self {
            source,
            destination,
            lca: None,
            exit_lca: false,
            path: Vec::new(),
            action: request.action,
            region: Vec::new(),
        };
        if let Destination::State(target) = destination {
            xfer.locate_lca(ctx, target, request.external)?;
        }
        Ok(Some(xfer))
    }

    fn locate_lca(
        &mut self,
        ctx: &Context<'_>,
        target: StateId,
        external: Option<bool>,
    ) -> Result<(), MachineError> {
        let source = ctx.state(self.source)?;
        let goal = ctx.state(target)?;
        let external = external.unwrap_or_else(|| {
            self.source == target || ctx.callbacks.external(source, ctx.cause, goal)
        });

        if self.source == target {
            self.lca = Some(target);
            if external {
                self.path.push(target);
                self.exit_lca = true;
            }
            return Ok(());
        }

        let mut up_target = Some(target);
        while let Some(id) = up_target {
            let state = ctx.state(id)?;
            if state.depth() <= source.depth() {
                break;
            }
            self.path.push(id);
            up_target = state.parent();
        }

        let mut up_source = Some(self.source);
        while let Some(id) = up_source {
            let state = ctx.state(id)?;
            if state.depth() <= goal.depth() {
                break;
            }
            up_source = state.parent();
        }

        loop {
            match (up_source, up_target) {
                (Some(s), Some(t)) if s == t => break,
                (Some(s), Some(t)) => {
                    self.path.push(t);
                    up_source = ctx.state(s)?.parent();
                    up_target = ctx.state(t)?.parent();
                }
                (None, None) => break,
                _ => {
                    return Err(MachineError::PastRoot {
                        source_state: source.name().to_string(),
                        target: goal.name().to_string(),
                    })
                }
            }
        }

        self.lca = up_source;
        if let (true, Some(lca)) = (external, self.lca) {
            self.path.push(lca);
            self.exit_lca = true;
        }
        Ok(())
    }

    /// Deepest state left active by the exit phase.
    ///
    /// Exiting an LCA that heads a parallel region empties that region.
    fn exit_boundary(&self, ctx: &Context<'_>) -> Result<Option<StateId>, MachineError> {
        let Some(lca) = self.lca else {
            return Ok(None);
        };
        if !self.exit_lca {
            return Ok(Some(lca));
        }
        match ctx.state(lca)?.parent() {
            Some(parent) if !ctx.state(parent)?.terminal() => Ok(Some(parent)),
            _ => Ok(None),
        }
    }

    /// Run the action, exit below the boundary and re-enter along the path.
    pub(crate) fn apply(self, ctx: &Context<'_>, root: &mut Region) -> Result<(), MachineError> {
        let source = ctx.state(self.source)?;
        let target = match self.destination {
            Destination::State(id) => Some(ctx.state(id)?),
            Destination::Terminate | Destination::Error => None,
        };
        ctx.callbacks.transition(source, ctx.cause, target);
        if let Some(action) = &self.action {
            action(ctx.cause);
        }

        match self.destination {
            Destination::Terminate => root.exit_region(ctx),
            Destination::Error => Ok(()),
            Destination::State(_) => {
                let stop = self.exit_boundary(ctx)?;
                let region = root
                    .locate_mut(&self.region)
                    .ok_or(MachineError::MissingRegion)?;
                region.exit_until(ctx, stop)?;
                ctx.follow_path(region, self.path)
            }
        }
    }
}

enum Bubble {
    /// Transfers to apply, in order; empty when nothing handled the cause.
    Settled(Vec<Xfer>),
    /// A transfer whose LCA lies above this region.
    Escalate(Xfer),
}

/// Signal the active configuration and collect the transfers to apply.
pub(crate) fn plan(ctx: &Context<'_>, root: &Region) -> Result<Vec<Xfer>, MachineError> {
    let mut address = Vec::new();
    match bubble_region(ctx, root, &mut address, true)? {
        Bubble::Settled(xfers) => Ok(xfers),
        // Nothing is above the root region.
        Bubble::Escalate(xfer) => Ok(vec![xfer]),
    }
}

fn bubble_region(
    ctx: &Context<'_>,
    region: &Region,
    address: &mut Vec<usize>,
    is_root: bool,
) -> Result<Bubble, MachineError> {
    if region.is_empty() {
        return Ok(Bubble::Settled(Vec::new()));
    }
    let chain = region.chain(ctx.tree);
    let mut pending = Vec::new();
    let mut start = 0;

    if let Some(set) = &region.set {
        let mut escalated = None;
        for (index, sub) in set.regions.iter().enumerate() {
            address.push(index);
            let bubble = bubble_region(ctx, sub, address, false)?;
            address.pop();
            match bubble {
                Bubble::Settled(xfers) => pending.extend(xfers),
                Bubble::Escalate(xfer) => {
                    escalated = Some(xfer);
                    break;
                }
            }
        }

        if let Some(mut xfer) = escalated {
            pending.clear();
            let position = match xfer.lca {
                Some(lca) => chain.iter().position(|id| *id == lca),
                None if is_root => {
                    xfer.region = address.clone();
                    return Ok(Bubble::Settled(vec![xfer]));
                }
                None => None,
            };
            let Some(position) = position else {
                return Ok(Bubble::Escalate(xfer));
            };
            xfer.region = address.clone();
            pending.push(xfer);
            start = position;
        }
    }

    for &id in &chain[start..] {
        let Some(request) = ctx.signal_state(id)?.into_request() else {
            continue;
        };
        let Some(mut xfer) = Xfer::resolve(ctx, id, request)? else {
            continue;
        };
        let settles = match xfer.lca {
            Some(lca) => chain.contains(&lca),
            None => is_root,
        };
        if !settles {
            return Ok(Bubble::Escalate(xfer));
        }
        xfer.region = address.clone();
        return Ok(Bubble::Settled(vec![xfer]));
    }

    Ok(Bubble::Settled(pending))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Cause, Reaction, StateOptions, StateTree};
    use crate::engine::callbacks::Callbacks;

    fn samek() -> StateTree {
        let mut tree = StateTree::new("test");
        let s0 = tree.insert(None, "s0", StateOptions::new()).unwrap();
        let s1 = tree.insert(Some(s0), "s1", StateOptions::new()).unwrap();
        tree.insert(Some(s1), "s11", StateOptions::new()).unwrap();
        tree.insert(Some(s1), "s12", StateOptions::new()).unwrap();
        let s2 = tree.insert(Some(s0), "s2", StateOptions::new()).unwrap();
        let s21 = tree.insert(Some(s2), "s21", StateOptions::new()).unwrap();
        tree.insert(Some(s21), "s211", StateOptions::new()).unwrap();
        tree.insert(None, "t", StateOptions::new()).unwrap();
        tree
    }

    fn id(tree: &StateTree, name: &str) -> StateId {
        tree.find(name).unwrap().id()
    }

    fn names(tree: &StateTree, ids: &[StateId]) -> Vec<String> {
        ids.iter()
            .map(|id| tree.get(*id).unwrap().name().to_string())
            .collect()
    }

    fn resolve(tree: &StateTree, source: &str, reaction: Reaction) -> Option<Xfer> {
        let callbacks = Callbacks::new();
        let cause = Cause::new("x");
        let ctx = Context::new(tree, &callbacks, &cause);
        Xfer::resolve(&ctx, id(tree, source), reaction.into_request().unwrap()).unwrap()
    }

    #[test]
    fn lca_of_cousins() {
        let tree = samek();
        let xfer = resolve(&tree, "s11", Reaction::goto("s211")).unwrap();
        assert_eq!(xfer.lca, Some(id(&tree, "s0")));
        assert!(!xfer.exit_lca);
        assert_eq!(names(&tree, &xfer.path), vec!["s211", "s21", "s2"]);
    }

    #[test]
    fn lca_of_ancestor_target() {
        let tree = samek();
        let xfer = resolve(&tree, "s211", Reaction::goto("s0")).unwrap();
        assert_eq!(xfer.lca, Some(id(&tree, "s0")));
        assert!(xfer.path.is_empty());
    }

    #[test]
    fn external_transition_reenters_lca() {
        let tree = samek();
        let xfer = resolve(&tree, "s1", Reaction::goto("s12").external()).unwrap();
        assert_eq!(xfer.lca, Some(id(&tree, "s1")));
        assert!(xfer.exit_lca);
        assert_eq!(names(&tree, &xfer.path), vec!["s12", "s1"]);
    }

    #[test]
    fn self_transitions_default_external() {
        let tree = samek();
        let xfer = resolve(&tree, "s1", Reaction::goto("s1")).unwrap();
        assert!(xfer.exit_lca);
        assert_eq!(names(&tree, &xfer.path), vec!["s1"]);

        let xfer = resolve(&tree, "s1", Reaction::goto("s1").internal()).unwrap();
        assert!(!xfer.exit_lca);
        assert!(xfer.path.is_empty());
    }

    #[test]
    fn separate_top_level_trees_meet_above_the_root() {
        let tree = samek();
        let xfer = resolve(&tree, "s211", Reaction::goto("t")).unwrap();
        assert_eq!(xfer.lca, None);
        assert_eq!(names(&tree, &xfer.path), vec!["t"]);
    }

    #[test]
    fn unknown_targets_are_dropped() {
        let tree = samek();
        assert!(resolve(&tree, "s1", Reaction::goto("missing")).is_none());
    }

    #[test]
    fn pseudo_targets_have_no_lca() {
        let tree = samek();
        let xfer = resolve(&tree, "s11", Reaction::terminate()).unwrap();
        assert_eq!(xfer.destination, Destination::Terminate);
        assert_eq!(xfer.lca, None);
    }

    #[test]
    fn external_policy_applies_without_override() {
        let tree = samek();
        let callbacks = Callbacks::new().is_external(|_, _, _| true);
        let cause = Cause::new("x");
        let ctx = Context::new(&tree, &callbacks, &cause);
        let request = Reaction::goto("s12").into_request().unwrap();
        let xfer = Xfer::resolve(&ctx, id(&tree, "s1"), request)
            .unwrap()
            .unwrap();
        assert!(xfer.exit_lca);

        let request = Reaction::goto("s12").internal().into_request().unwrap();
        let xfer = Xfer::resolve(&ctx, id(&tree, "s1"), request)
            .unwrap()
            .unwrap();
        assert!(!xfer.exit_lca);
    }
}
