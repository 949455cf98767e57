//! Uniform redraw of a bounded integer to a different value.
//!
//! With `range = upper - lower + 1`, the new value is
//! `lower + (v + 1 + u - lower) mod range` for `u` uniform in `0..range-1`,
//! which covers every value in the bounds except `v` with equal probability.
//! The proposal is symmetric, so the log Hastings ratio is zero.

use tracing::trace;

use super::Proposal;
use crate::error::Result;
use crate::random::RandomSource;
use crate::state::{IntParamId, State};
use crate::tree::BranchTopologyView;
use crate::tuning::AcceptanceCounts;

#[derive(Debug, Clone)]
pub struct DiscreteUniformShift {
    parameter: IntParamId,
    pub(super) counts: AcceptanceCounts,
}

impl DiscreteUniformShift {
    pub fn new(parameter: IntParamId) -> Self {
        Self {
            parameter,
            counts: AcceptanceCounts::default(),
        }
    }
}

impl Proposal for DiscreteUniformShift {
    fn propose<V, R>(&self, state: &mut State<V>, rng: &mut R) -> f64
    where
        V: BranchTopologyView,
        R: RandomSource + ?Sized,
    {
        let parameter = state.integer_mut(self.parameter);
        let lower = parameter.lower() as i128;
        let upper = parameter.upper() as i128;
        let range = upper - lower + 1;
        if range <= 1 {
            trace!(parameter = parameter.name(), "no alternative value in bounds");
            return f64::NEG_INFINITY;
        }

        let index = rng.next_int(parameter.dimension() as u64) as usize;
        let value = parameter.value(index) as i128;
        let offset = rng.next_int((range - 1) as u64) as i128;
        let delta = (value + 1 + offset - lower).rem_euclid(range);
        // delta + lower lies in [lower, upper], so the cast cannot truncate.
        parameter.set(index, (delta + lower) as i64);
        0.0
    }

    fn validate<V: BranchTopologyView>(&self, state: &State<V>) -> Result<()> {
        state.try_integer(self.parameter).map(|_| ())
    }
}
