/*!
Metropolis–Hastings proposal operators.

Each operator mutates a [`State`] in place and returns the log Hastings ratio
of the move it made. A return value of `f64::NEG_INFINITY` means the candidate
was invalid: nothing was written and the chain must reject the move.

The operators form a closed set, wrapped by [`Operator`]:

- [`IndependentResampler`] redraws one rate from a fixed log-normal
  distribution.
- [`DistancePreservingJointMove`] shifts a node time and rescales the rates of
  its two child branches so each branch's rate × duration is unchanged.
- [`DiscreteUniformShift`] moves one bounded integer to a different value
  chosen uniformly.

Operators with a step size implement [`Tunable`] through an
[`AdaptiveTuner`].

# Examples

```rust
use clock_operators::operators::{DistancePreservingJointMove, Operator};
use clock_operators::parameter::RealParameter;
use clock_operators::random::Randomizer;
use clock_operators::state::State;
use clock_operators::tree::Tree;

let tree = Tree::from_parents(&[Some(2), Some(2), None], &[4.0, 6.0, 10.0]).unwrap();
let mut state = State::new(tree);
let rates = state.add_real(RealParameter::new("rates", vec![2.0, 1.5]).unwrap());

let op = Operator::from(DistancePreservingJointMove::new(1.0, rates).unwrap());
op.validate(&state).unwrap();

let mut rng = Randomizer::seed_from_u64(42);
let log_hr = op.propose(&mut state, &mut rng);
assert!(log_hr.is_finite());
```
*/

mod distance;
mod independent;
mod uniform_shift;

pub use distance::{DistancePreservingJointMove, NodeTarget};
pub use independent::IndependentResampler;
pub use uniform_shift::DiscreteUniformShift;

use crate::error::Result;
use crate::random::RandomSource;
use crate::state::State;
use crate::tree::BranchTopologyView;
use crate::tuning::{AcceptanceCounts, AdaptiveTuner};

/// The proposal half of an operator.
pub trait Proposal {
    /// Applies a random move to `state` and returns its log Hastings ratio,
    /// or `f64::NEG_INFINITY` when the candidate is invalid and nothing was
    /// changed.
    fn propose<V, R>(&self, state: &mut State<V>, rng: &mut R) -> f64
    where
        V: BranchTopologyView,
        R: RandomSource + ?Sized;

    /// Checks that `state` has the shape this operator needs. Called once
    /// before a chain starts so misconfiguration never surfaces mid-run.
    fn validate<V: BranchTopologyView>(&self, state: &State<V>) -> Result<()>;
}

/// Operators whose step size adapts to the observed acceptance rate.
pub trait Tunable {
    fn tuner(&self) -> &AdaptiveTuner;

    fn tuner_mut(&mut self) -> &mut AdaptiveTuner;

    fn tuning_value(&self) -> f64 {
        self.tuner().tuning_value()
    }

    fn set_tuning_value(&mut self, value: f64) -> Result<()> {
        self.tuner_mut().set_tuning_value(value)
    }

    fn optimize(&mut self, log_alpha: f64) {
        self.tuner_mut().optimize(log_alpha)
    }

    fn performance_suggestion(&self) -> String {
        self.tuner().performance_suggestion()
    }
}

/// One of the available operators.
#[derive(Debug, Clone)]
pub enum Operator {
    IndependentResampler(IndependentResampler),
    DistancePreservingJointMove(DistancePreservingJointMove),
    DiscreteUniformShift(DiscreteUniformShift),
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Self::IndependentResampler(_) => "IndependentResampler",
            Self::DistancePreservingJointMove(_) => "DistancePreservingJointMove",
            Self::DiscreteUniformShift(_) => "DiscreteUniformShift",
        }
    }

    pub fn propose<V, R>(&self, state: &mut State<V>, rng: &mut R) -> f64
    where
        V: BranchTopologyView,
        R: RandomSource + ?Sized,
    {
        match self {
            Self::IndependentResampler(op) => op.propose(state, rng),
            Self::DistancePreservingJointMove(op) => op.propose(state, rng),
            Self::DiscreteUniformShift(op) => op.propose(state, rng),
        }
    }

    pub fn validate<V: BranchTopologyView>(&self, state: &State<V>) -> Result<()> {
        match self {
            Self::IndependentResampler(op) => op.validate(state),
            Self::DistancePreservingJointMove(op) => op.validate(state),
            Self::DiscreteUniformShift(op) => op.validate(state),
        }
    }

    fn as_tunable(&self) -> Option<&dyn Tunable> {
        match self {
            Self::DistancePreservingJointMove(op) => Some(op),
            _ => None,
        }
    }

    fn as_tunable_mut(&mut self) -> Option<&mut dyn Tunable> {
        match self {
            Self::DistancePreservingJointMove(op) => Some(op),
            _ => None,
        }
    }

    pub fn is_tunable(&self) -> bool {
        self.as_tunable().is_some()
    }

    /// The current step size, `None` for operators without one.
    pub fn tuning_value(&self) -> Option<f64> {
        self.as_tunable().map(|op| op.tuning_value())
    }

    /// Overwrites the step size; ignored by operators without one. Fails
    /// on a window that is not finite and strictly positive.
    pub fn set_tuning_value(&mut self, value: f64) -> Result<()> {
        match self.as_tunable_mut() {
            Some(op) => op.set_tuning_value(value),
            None => Ok(()),
        }
    }

    pub fn optimize(&mut self, log_alpha: f64) {
        if let Some(op) = self.as_tunable_mut() {
            op.optimize(log_alpha);
        }
    }

    /// A window suggestion, or an empty string.
    pub fn performance_suggestion(&self) -> String {
        self.as_tunable()
            .map(|op| op.performance_suggestion())
            .unwrap_or_default()
    }

    pub fn accept(&mut self) {
        match self {
            Self::IndependentResampler(op) => op.counts.accepted += 1,
            Self::DistancePreservingJointMove(op) => op.tuner_mut().accept(),
            Self::DiscreteUniformShift(op) => op.counts.accepted += 1,
        }
    }

    pub fn reject(&mut self) {
        match self {
            Self::IndependentResampler(op) => op.counts.rejected += 1,
            Self::DistancePreservingJointMove(op) => op.tuner_mut().reject(),
            Self::DiscreteUniformShift(op) => op.counts.rejected += 1,
        }
    }

    pub fn counts(&self) -> AcceptanceCounts {
        match self {
            Self::IndependentResampler(op) => op.counts,
            Self::DistancePreservingJointMove(op) => op.tuner().counts(),
            Self::DiscreteUniformShift(op) => op.counts,
        }
    }
}

impl From<IndependentResampler> for Operator {
    fn from(op: IndependentResampler) -> Self {
        Self::IndependentResampler(op)
    }
}

impl From<DistancePreservingJointMove> for Operator {
    fn from(op: DistancePreservingJointMove) -> Self {
        Self::DistancePreservingJointMove(op)
    }
}

impl From<DiscreteUniformShift> for Operator {
    fn from(op: DiscreteUniformShift) -> Self {
        Self::DiscreteUniformShift(op)
    }
}
