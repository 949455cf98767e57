//! Independence sampler for branch rates.
//!
//! Picks one rate uniformly and replaces it with a fresh log-normal draw. The
//! proposal density does not depend on the current value, so forward and
//! reverse densities cancel and the Hastings ratio is zero in log space.

use tracing::trace;

use super::Proposal;
use crate::distributions::{LogNormalModel, ParametricDistribution};
use crate::error::{OperatorError, Result};
use crate::random::RandomSource;
use crate::state::{RealParamId, State};
use crate::tree::BranchTopologyView;
use crate::tuning::AcceptanceCounts;

#[derive(Debug, Clone)]
pub struct IndependentResampler {
    rates: RealParamId,
    distribution: LogNormalModel,
    pub(super) counts: AcceptanceCounts,
}

impl IndependentResampler {
    /// Fails unless `distribution` is a valid log-normal.
    pub fn new(rates: RealParamId, distribution: ParametricDistribution) -> Result<Self> {
        let ParametricDistribution::LogNormal(distribution) = distribution else {
            return Err(OperatorError::UnsupportedDistribution(distribution.family()));
        };
        distribution.validate()?;
        Ok(Self {
            rates,
            distribution,
            counts: AcceptanceCounts::default(),
        })
    }

    pub fn distribution(&self) -> &LogNormalModel {
        &self.distribution
    }
}

impl Proposal for IndependentResampler {
    fn propose<V, R>(&self, state: &mut State<V>, rng: &mut R) -> f64
    where
        V: BranchTopologyView,
        R: RandomSource + ?Sized,
    {
        let rates = state.real_mut(self.rates);
        let index = rng.next_int(rates.dimension() as u64) as usize;
        let LogNormalModel {
            m,
            s,
            mean_in_real_space,
        } = self.distribution;
        let r = rng.next_log_normal(m, s, mean_in_real_space);
        if !rates.within_bounds(r) {
            trace!(index, r, "resampled rate outside parameter bounds");
            return f64::NEG_INFINITY;
        }
        rates.set(index, r);
        0.0
    }

    fn validate<V: BranchTopologyView>(&self, state: &State<V>) -> Result<()> {
        let rates = state.try_real(self.rates)?;
        if rates.dimension() == 0 {
            return Err(OperatorError::EmptyParameter(rates.name().to_string()));
        }
        Ok(())
    }
}
