//! Node-time move that keeps each child branch's distance fixed.
//!
//! For a node at height `t_x` with children at `t_j` and `t_k`, and child
//! branch rates `r_i` and `r_x`, the move proposes `t_x' = t_x + a` with
//! `a ~ Uniform(-w, w)` and sets
//!
//! ```text
//! r_i' = r_i (t_x - t_j) / (t_x' - t_j)
//! r_x' = r_x (t_x - t_k) / (t_x' - t_k)
//! ```
//!
//! so `rate × duration` on both branches is unchanged. The map
//! `(t_x, r_i, r_x) -> (t_x', r_i', r_x')` is lower triangular with diagonal
//! `(1, (t_x - t_j)/(t_x' - t_j), (t_x - t_k)/(t_x' - t_k))`, so the Hastings
//! ratio is the product of those terms.

use tracing::trace;

use super::{Proposal, Tunable};
use crate::error::{OperatorError, Result};
use crate::random::RandomSource;
use crate::state::{RealParamId, State};
use crate::tree::{BranchTopologyView, NodeId};
use crate::tuning::AdaptiveTuner;

/// Which node a [`DistancePreservingJointMove`] acts on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeTarget {
    /// Whatever node is the root when the proposal is made.
    #[default]
    Root,
    /// A fixed internal node. Its new height must also stay below its parent.
    Node(NodeId),
}

#[derive(Debug, Clone)]
pub struct DistancePreservingJointMove {
    rates: RealParamId,
    target: NodeTarget,
    tuner: AdaptiveTuner,
}

impl DistancePreservingJointMove {
    /// A root-time move with window half-width `window` over the branch rates
    /// in `rates`.
    pub fn new(window: f64, rates: RealParamId) -> Result<Self> {
        Ok(Self {
            rates,
            target: NodeTarget::Root,
            tuner: AdaptiveTuner::new(window)?,
        })
    }

    pub fn with_target(mut self, target: NodeTarget) -> Self {
        self.target = target;
        self
    }

    /// Replaces the tuner, e.g. to change the coercion target or policy.
    pub fn with_tuner(mut self, tuner: AdaptiveTuner) -> Self {
        self.tuner = tuner;
        self
    }

    pub fn target(&self) -> NodeTarget {
        self.target
    }

    fn node<V: BranchTopologyView>(&self, tree: &V) -> NodeId {
        match self.target {
            NodeTarget::Root => tree.root(),
            NodeTarget::Node(id) => id,
        }
    }
}

impl Proposal for DistancePreservingJointMove {
    fn propose<V, R>(&self, state: &mut State<V>, rng: &mut R) -> f64
    where
        V: BranchTopologyView,
        R: RandomSource + ?Sized,
    {
        let tree = &state.tree;
        let node = self.node(tree);
        let &[son, daughter] = tree.children(node) else {
            return f64::NEG_INFINITY;
        };

        let t_x = tree.height(node);
        let t_j = tree.height(son);
        let t_k = tree.height(daughter);
        let upper = tree
            .parent(node)
            .map_or(f64::INFINITY, |parent| tree.height(parent));
        let slot_i = tree.rate_slot(son);
        let slot_x = tree.rate_slot(daughter);

        let rates = state.real(self.rates);
        let r_i = rates.value(slot_i);
        let r_x = rates.value(slot_x);
        let d_i = r_i * (t_x - t_j);
        let d_x = r_x * (t_x - t_k);

        let w = self.tuner.tuning_value();
        let a = rng.uniform(-w, w);
        let t_x_new = t_x + a;

        let lower = t_j.max(t_k);
        if t_x_new <= lower || t_x_new >= upper {
            trace!(node, t_x_new, lower, upper, "node time outside its interval");
            return f64::NEG_INFINITY;
        }

        let r_i_new = d_i / (t_x_new - t_j);
        let r_x_new = d_x / (t_x_new - t_k);
        if !rates.within_bounds(r_i_new) || !rates.within_bounds(r_x_new) {
            trace!(r_i_new, r_x_new, "rescaled rate outside parameter bounds");
            return f64::NEG_INFINITY;
        }

        state.tree.set_height(node, t_x_new);
        let rates = state.real_mut(self.rates);
        rates.set(slot_i, r_i_new);
        rates.set(slot_x, r_x_new);

        let nu = (t_x - t_j) * (t_x - t_k);
        let de = (t_x_new - t_j) * (t_x_new - t_k);
        (nu / de).ln()
    }

    fn validate<V: BranchTopologyView>(&self, state: &State<V>) -> Result<()> {
        let tree = &state.tree;
        let node = self.node(tree);
        if node >= tree.node_count() {
            return Err(OperatorError::UnknownNode(node));
        }
        let children = tree.children(node);
        if children.len() != 2 {
            return Err(OperatorError::NotBinary {
                node,
                children: children.len(),
            });
        }
        let rates = state.try_real(self.rates)?;
        for &child in children {
            let slot = tree.rate_slot(child);
            if slot >= rates.dimension() {
                return Err(OperatorError::UnknownParameter {
                    kind: "rate slot",
                    index: slot,
                });
            }
        }
        Ok(())
    }
}

impl Tunable for DistancePreservingJointMove {
    fn tuner(&self) -> &AdaptiveTuner {
        &self.tuner
    }

    fn tuner_mut(&mut self) -> &mut AdaptiveTuner {
        &mut self.tuner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::RealParameter;
    use crate::random::{Randomizer, ScriptedSource};
    use crate::tree::Tree;
    use approx::assert_abs_diff_eq;

    /// Root 2 at height 10 over leaves at 4 and 6, rates 2.0 and 1.5.
    fn cherry() -> (State<Tree>, RealParamId) {
        let tree = Tree::from_parents(&[Some(2), Some(2), None], &[4.0, 6.0, 10.0]).unwrap();
        let mut state = State::new(tree);
        let rates = state.add_real(RealParameter::new("rates", vec![2.0, 1.5]).unwrap());
        (state, rates)
    }

    #[test]
    fn test_scenario_upward_shift() {
        let (mut state, rates) = cherry();
        let op = DistancePreservingJointMove::new(1.0, rates).unwrap();
        let mut rng = ScriptedSource::new(&[0.5], &[], &[]);

        let log_hr = op.propose(&mut state, &mut rng);

        assert_eq!(state.tree.height(2), 10.5);
        assert_abs_diff_eq!(state.real(rates).value(0), 2.0 * 6.0 / 6.5, epsilon = 1e-12);
        assert_abs_diff_eq!(state.real(rates).value(1), 1.5 * 4.0 / 4.5, epsilon = 1e-12);
        assert_abs_diff_eq!(state.real(rates).value(0), 1.8462, epsilon = 1e-4);
        assert_abs_diff_eq!(state.real(rates).value(1), 1.3333, epsilon = 1e-4);
        assert_abs_diff_eq!(log_hr, (24.0_f64 / 29.25).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(log_hr, -0.1975, epsilon = 1e-3);
    }

    #[test]
    fn test_scenario_below_children_is_rejected() {
        let (mut state, rates) = cherry();
        let before = state.clone();
        let op = DistancePreservingJointMove::new(6.5, rates).unwrap();
        let mut rng = ScriptedSource::new(&[-6.5], &[], &[]);

        let log_hr = op.propose(&mut state, &mut rng);

        assert_eq!(log_hr, f64::NEG_INFINITY);
        assert_eq!(state, before);
    }

    #[test]
    fn test_touching_oldest_child_is_rejected() {
        let (mut state, rates) = cherry();
        let before = state.clone();
        let op = DistancePreservingJointMove::new(5.0, rates).unwrap();
        let mut rng = ScriptedSource::new(&[-4.0], &[], &[]);
        assert_eq!(op.propose(&mut state, &mut rng), f64::NEG_INFINITY);
        assert_eq!(state, before);
    }

    #[test]
    fn test_distance_invariance_and_ratio_over_random_moves() {
        let (mut state, rates) = cherry();
        let op = DistancePreservingJointMove::new(3.0, rates).unwrap();
        let mut rng = Randomizer::seed_from_u64(42);
        let mut accepted = 0;
        for _ in 0..1_000 {
            let t_x = state.tree.height(2);
            let (r_i, r_x) = (state.real(rates).value(0), state.real(rates).value(1));
            let before = state.clone();

            let log_hr = op.propose(&mut state, &mut rng);
            let t_new = state.tree.height(2);

            if log_hr == f64::NEG_INFINITY {
                assert_eq!(state, before);
                continue;
            }
            accepted += 1;
            assert!(t_new > 6.0);
            let (ri_new, rx_new) = (state.real(rates).value(0), state.real(rates).value(1));
            assert_abs_diff_eq!(ri_new * (t_new - 4.0), r_i * (t_x - 4.0), epsilon = 1e-9);
            assert_abs_diff_eq!(rx_new * (t_new - 6.0), r_x * (t_x - 6.0), epsilon = 1e-9);
            let expected = ((t_x - 4.0) * (t_x - 6.0)).ln() - ((t_new - 4.0) * (t_new - 6.0)).ln();
            assert_abs_diff_eq!(log_hr, expected, epsilon = 1e-9);
        }
        assert!(accepted > 0);
    }

    #[test]
    fn test_internal_target_respects_parent() {
        // ((0:4, 1:6)3:10, 2:0)4:12
        let tree = Tree::from_parents(
            &[Some(3), Some(3), Some(4), Some(4), None],
            &[4.0, 6.0, 0.0, 10.0, 12.0],
        )
        .unwrap();
        let mut state = State::new(tree);
        let rates = state.add_real(RealParameter::new("rates", vec![1.0; 4]).unwrap());
        let op = DistancePreservingJointMove::new(3.0, rates)
            .unwrap()
            .with_target(NodeTarget::Node(3));
        op.validate(&state).unwrap();

        let before = state.clone();
        let mut rng = ScriptedSource::new(&[2.5, 1.0], &[], &[]);
        assert_eq!(op.propose(&mut state, &mut rng), f64::NEG_INFINITY);
        assert_eq!(state, before);

        assert!(op.propose(&mut state, &mut rng).is_finite());
        assert_eq!(state.tree.height(3), 11.0);
        assert_eq!(state.tree.height(4), 12.0);
        assert_abs_diff_eq!(state.real(rates).value(0), 6.0 / 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(state.real(rates).value(1), 4.0 / 5.0, epsilon = 1e-12);
        assert_eq!(state.real(rates).value(2), 1.0);
        assert_eq!(state.real(rates).value(3), 1.0);
    }

    #[test]
    fn test_root_remap_addresses_root_slot() {
        // Root is node 1; leaf 2 has number 2 == branch count and uses slot 1.
        let tree = Tree::from_parents(&[Some(1), None, Some(1)], &[0.0, 5.0, 1.0]).unwrap();
        let mut state = State::new(tree);
        let rates = state.add_real(RealParameter::new("rates", vec![1.0, 2.0]).unwrap());
        let op = DistancePreservingJointMove::new(1.0, rates).unwrap();
        op.validate(&state).unwrap();

        let mut rng = ScriptedSource::new(&[1.0], &[], &[]);
        op.propose(&mut state, &mut rng);
        assert_eq!(state.tree.height(1), 6.0);
        assert_abs_diff_eq!(state.real(rates).value(0), 5.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(state.real(rates).value(1), 2.0 * 4.0 / 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rate_bounds_reject() {
        let tree = Tree::from_parents(&[Some(2), Some(2), None], &[4.0, 6.0, 10.0]).unwrap();
        let mut state = State::new(tree);
        let rates = state.add_real(
            RealParameter::new("rates", vec![2.0, 1.5])
                .unwrap()
                .with_bounds(1.5, 10.0)
                .unwrap(),
        );
        let before = state.clone();
        let op = DistancePreservingJointMove::new(1.0, rates).unwrap();
        // r_i' = 12 / 6.5 stays above 1.5, r_x' = 6 / 4.5 does not
        let mut rng = ScriptedSource::new(&[0.5], &[], &[]);
        assert_eq!(op.propose(&mut state, &mut rng), f64::NEG_INFINITY);
        assert_eq!(state, before);
    }

    #[test]
    fn test_validate_rejects_non_binary_target() {
        let tree = Tree::from_parents(&[Some(3), Some(3), Some(3), None], &[0.0, 0.0, 0.0, 1.0])
            .unwrap();
        let mut state = State::new(tree);
        let rates = state.add_real(RealParameter::new("rates", vec![1.0; 3]).unwrap());
        let op = DistancePreservingJointMove::new(1.0, rates).unwrap();
        assert_eq!(
            op.validate(&state),
            Err(OperatorError::NotBinary {
                node: 3,
                children: 3
            })
        );

        let leaf = op.clone().with_target(NodeTarget::Node(0));
        assert!(matches!(
            leaf.validate(&state),
            Err(OperatorError::NotBinary { node: 0, children: 0 })
        ));
        let missing = op.with_target(NodeTarget::Node(9));
        assert_eq!(missing.validate(&state), Err(OperatorError::UnknownNode(9)));
    }

    #[test]
    fn test_validate_rejects_short_rates() {
        let (mut state, _) = cherry();
        let short = state.add_real(RealParameter::new("short", vec![1.0]).unwrap());
        let op = DistancePreservingJointMove::new(1.0, short).unwrap();
        assert!(matches!(
            op.validate(&state),
            Err(OperatorError::UnknownParameter { index: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_window() {
        assert_eq!(
            DistancePreservingJointMove::new(0.0, RealParamId(0)).unwrap_err(),
            OperatorError::InvalidWindow(0.0)
        );
    }
}
