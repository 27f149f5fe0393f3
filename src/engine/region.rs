//! The active configuration of a machine.
//!
//! A [`Region`] records the single active path below one non-parallel
//! boundary. Its chain runs from the leaf upward until the parent is a
//! parallel state (or the machine top). When the leaf is itself parallel it
//! owns a [`RegionSet`] with one region per child, all progressing
//! independently.

use super::context::Context;
use super::error::MachineError;
use crate::core::{StateId, StateTree};

#[derive(Debug, Default)]
pub(crate) struct Region {
    pub(crate) leaf: Option<StateId>,
    pub(crate) set: Option<RegionSet>,
}

#[derive(Debug, Default)]
pub(crate) struct RegionSet {
    pub(crate) regions: Vec<Region>,
}

impl Region {
    pub(crate) fn headed_by(state: StateId) -> Self {
        Self {
            leaf: Some(state),
            set: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.leaf.is_none()
    }

    /// Exit every active state of this region, sub-regions first.
    pub(crate) fn exit_region(&mut self, ctx: &Context<'_>) -> Result<(), MachineError> {
        self.exit_until(ctx, None)
    }

    /// Exit states strictly below `stop`, leaving `stop` as the leaf.
    ///
    /// A region set owned by the leaf is exited as a whole before the leaf
    /// itself. When the leaf already is `stop`, only its region set goes.
    pub(crate) fn exit_until(
        &mut self,
        ctx: &Context<'_>,
        stop: Option<StateId>,
    ) -> Result<(), MachineError> {
        let Some(mut leaf) = self.leaf else {
            return match stop {
                None => Ok(()),
                Some(stop) => Err(MachineError::PartialExit {
                    stop: ctx.name_of(stop),
                }),
            };
        };

        if Some(leaf) == stop {
            if let Some(set) = self.set.take() {
                set.exit(ctx)?;
            }
            return Ok(());
        }

        loop {
            if let Some(set) = self.set.take() {
                set.exit(ctx)?;
            }
            let next = match ctx.exit_state(leaf)? {
                Some(parent) if !ctx.state(parent)?.terminal() => Some(parent),
                _ => None,
            };
            self.leaf = next;
            if next == stop {
                return Ok(());
            }
            match next {
                Some(parent) => leaf = parent,
                None => {
                    return Err(MachineError::PartialExit {
                        stop: stop.map_or_else(String::new, |s| ctx.name_of(s)),
                    })
                }
            }
        }
    }

    /// States of the chain from the leaf up to the region head.
    pub(crate) fn chain(&self, tree: &StateTree) -> Vec<StateId> {
        let mut chain = Vec::new();
        let mut current = self.leaf;
        while let Some(id) = current {
            chain.push(id);
            current = tree
                .get(id)
                .and_then(|state| state.parent())
                .filter(|parent| tree.get(*parent).is_some_and(|p| !p.terminal()));
        }
        chain
    }

    /// Append every active state of this region and its sub-regions.
    pub(crate) fn collect_active(&self, tree: &StateTree, out: &mut Vec<StateId>) {
        out.extend(self.chain(tree));
        if let Some(set) = &self.set {
            for region in &set.regions {
                region.collect_active(tree, out);
            }
        }
    }

    /// Follow a region address (child indices through nested sets).
    pub(crate) fn locate_mut(&mut self, address: &[usize]) -> Option<&mut Region> {
        let mut region = self;
        for &index in address {
            region = region.set.as_mut()?.regions.get_mut(index)?;
        }
        Some(region)
    }
}

impl RegionSet {
    fn exit(mut self, ctx: &Context<'_>) -> Result<(), MachineError> {
        for region in &mut self.regions {
            region.exit_region(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Cause, StateOptions};
    use crate::engine::callbacks::Callbacks;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn logged_tree(log: &Rc<RefCell<Vec<String>>>) -> (StateTree, Vec<StateId>) {
        let mut tree = StateTree::new("test");
        let exit = |log: &Rc<RefCell<Vec<String>>>| {
            let log = log.clone();
            StateOptions::new().on_exit(move |s, _| log.borrow_mut().push(s.name().to_string()))
        };
        let p = tree.insert(None, "p", exit(log).set_parallel(true)).unwrap();
        let a = tree.insert(Some(p), "a", exit(log)).unwrap();
        let a1 = tree.insert(Some(a), "a1", exit(log)).unwrap();
        let b = tree.insert(Some(p), "b", exit(log)).unwrap();
        (tree, vec![p, a, a1, b])
    }

    fn active(ids: &[StateId]) -> Region {
        let (p, a1, b) = (ids[0], ids[2], ids[3]);
        Region {
            leaf: Some(p),
            set: Some(RegionSet {
                regions: vec![Region::headed_by(a1), Region::headed_by(b)],
            }),
        }
    }

    #[test]
    fn exit_region_exits_sub_regions_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (tree, ids) = logged_tree(&log);
        let callbacks = Callbacks::new();
        let cause = Cause::new("x");
        let ctx = Context::new(&tree, &callbacks, &cause);

        let mut region = active(&ids);
        region.exit_region(&ctx).unwrap();
        assert!(region.is_empty());
        assert_eq!(*log.borrow(), vec!["a1", "a", "b", "p"]);
    }

    #[test]
    fn exit_until_leaf_only_exits_its_set() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (tree, ids) = logged_tree(&log);
        let callbacks = Callbacks::new();
        let cause = Cause::new("x");
        let ctx = Context::new(&tree, &callbacks, &cause);

        let mut region = active(&ids);
        region.exit_until(&ctx, Some(ids[0])).unwrap();
        assert_eq!(region.leaf, Some(ids[0]));
        assert!(region.set.is_none());
        assert_eq!(*log.borrow(), vec!["a1", "a", "b"]);
    }

    #[test]
    fn chain_stops_below_parallel_parent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (tree, ids) = logged_tree(&log);
        let region = active(&ids);
        let sub = &region.set.as_ref().unwrap().regions[0];
        assert_eq!(sub.chain(&tree), vec![ids[2], ids[1]]);

        let mut all = Vec::new();
        region.collect_active(&tree, &mut all);
        assert_eq!(all, vec![ids[0], ids[2], ids[1], ids[3]]);
    }

    #[test]
    fn missing_stop_is_a_partial_exit() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (tree, ids) = logged_tree(&log);
        let callbacks = Callbacks::new();
        let cause = Cause::new("x");
        let ctx = Context::new(&tree, &callbacks, &cause);

        let mut region = Region::headed_by(ids[3]);
        let result = region.exit_until(&ctx, Some(ids[1]));
        assert!(matches!(result, Err(MachineError::PartialExit { .. })));
    }

    #[test]
    fn locate_follows_address() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (_tree, ids) = logged_tree(&log);
        let mut region = active(&ids);
        assert_eq!(region.locate_mut(&[1]).unwrap().leaf, Some(ids[3]));
        assert!(region.locate_mut(&[2]).is_none());
        assert!(region.locate_mut(&[0, 0]).is_none());
    }
}
