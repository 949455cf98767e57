//! The mutable model state a chain owns and operators act on.
//!
//! Operators hold typed handles ([`RealParamId`], [`IntParamId`]) instead of
//! references, so one `State` can be shared by every operator of a chain and
//! cloned wholesale to start an independent chain.

use crate::error::{OperatorError, Result};
use crate::parameter::{IntegerParameter, RealParameter};
use crate::tree::BranchTopologyView;

/// Handle to a real parameter inside a [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RealParamId(pub usize);

/// Handle to an integer parameter inside a [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntParamId(pub usize);

/// A topology view plus the real and integer parameters of one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct State<V> {
    pub tree: V,
    reals: Vec<RealParameter>,
    integers: Vec<IntegerParameter>,
}

impl<V: BranchTopologyView> State<V> {
    pub fn new(tree: V) -> Self {
        Self {
            tree,
            reals: Vec::new(),
            integers: Vec::new(),
        }
    }

    pub fn add_real(&mut self, parameter: RealParameter) -> RealParamId {
        self.reals.push(parameter);
        RealParamId(self.reals.len() - 1)
    }

    pub fn add_integer(&mut self, parameter: IntegerParameter) -> IntParamId {
        self.integers.push(parameter);
        IntParamId(self.integers.len() - 1)
    }

    pub fn try_real(&self, id: RealParamId) -> Result<&RealParameter> {
        self.reals.get(id.0).ok_or(OperatorError::UnknownParameter {
            kind: "real",
            index: id.0,
        })
    }

    pub fn try_integer(&self, id: IntParamId) -> Result<&IntegerParameter> {
        self.integers.get(id.0).ok_or(OperatorError::UnknownParameter {
            kind: "integer",
            index: id.0,
        })
    }

    /// # Panics
    /// Panics on a handle not issued by this state.
    pub fn real(&self, id: RealParamId) -> &RealParameter {
        &self.reals[id.0]
    }

    pub fn real_mut(&mut self, id: RealParamId) -> &mut RealParameter {
        &mut self.reals[id.0]
    }

    pub fn integer(&self, id: IntParamId) -> &IntegerParameter {
        &self.integers[id.0]
    }

    pub fn integer_mut(&mut self, id: IntParamId) -> &mut IntegerParameter {
        &mut self.integers[id.0]
    }

    /// Heights followed by every real and then every integer value, the row a
    /// chain writes to its trace.
    pub fn trace_row(&self) -> Vec<f64> {
        let heights = (0..self.tree.node_count()).map(|n| self.tree.height(n));
        let reals = self.reals.iter().flat_map(|p| p.values().iter().copied());
        let integers = self
            .integers
            .iter()
            .flat_map(|p| p.values().iter().map(|&v| v as f64));
        heights.chain(reals).chain(integers).collect()
    }

    pub fn trace_width(&self) -> usize {
        self.tree.node_count()
            + self.reals.iter().map(|p| p.dimension()).sum::<usize>()
            + self.integers.iter().map(|p| p.dimension()).sum::<usize>()
    }
}

/// Snapshot and rollback of node heights, implemented by topology views that
/// support undoing a rejected proposal.
pub trait Restorable {
    fn store(&mut self);
    fn restore(&mut self);
}

impl Restorable for crate::tree::Tree {
    fn store(&mut self) {
        crate::tree::Tree::store(self)
    }

    fn restore(&mut self) {
        crate::tree::Tree::restore(self)
    }
}

impl<V: BranchTopologyView + Restorable> Restorable for State<V> {
    fn store(&mut self) {
        self.tree.store();
        self.reals.iter_mut().for_each(|p| p.store());
        self.integers.iter_mut().for_each(|p| p.store());
    }

    fn restore(&mut self) {
        self.tree.restore();
        self.reals.iter_mut().for_each(|p| p.restore());
        self.integers.iter_mut().for_each(|p| p.restore());
    }
}
