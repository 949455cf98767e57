/*!
# Operator-driven Metropolis–Hastings chains

[`OperatorChain`] runs one chain: each step picks an operator by weight,
snapshots the state, lets the operator propose, and accepts or rejects using
the operator's log Hastings ratio plus the change in the target's log
posterior. Rejected moves are rolled back. After every step the chosen
operator is told the log acceptance probability so a tunable operator can
adapt its window.

[`OperatorSampler`] owns several independent chains, each with its own copy
of the state, operators and random source. Chain `i` is seeded `seed + i`, so
a fixed seed reproduces every chain exactly, and [`ChainRunner`] runs the
chains in parallel.

## Example

```rust
use clock_operators::chain::{OperatorSampler, Target};
use clock_operators::core::ChainRunner;
use clock_operators::operators::{DistancePreservingJointMove, Operator};
use clock_operators::parameter::RealParameter;
use clock_operators::state::State;
use clock_operators::tree::{BranchTopologyView, Tree};

#[derive(Debug, Clone)]
struct Flat;

impl Target<Tree> for Flat {
    fn log_posterior(&self, state: &State<Tree>) -> f64 {
        -state.tree.height(state.tree.root())
    }
}

let tree = Tree::from_parents(&[Some(2), Some(2), None], &[4.0, 6.0, 10.0]).unwrap();
let mut state = State::new(tree);
let rates = state.add_real(RealParameter::new("rates", vec![2.0, 1.5]).unwrap());
let root_time = Operator::from(DistancePreservingJointMove::new(1.0, rates).unwrap());

let mut sampler = OperatorSampler::new(state, Flat, vec![(root_time, 1.0)], 2)
    .unwrap()
    .set_seed(42);
let traces = sampler.run(500, 100);
assert_eq!(traces.len(), 2);
assert_eq!(traces[0].shape(), &[400, 5]);
```
*/

use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{HasChains, MarkovChain};
pub use crate::core::ChainRunner;
use crate::error::{OperatorError, Result};
use crate::operators::Operator;
use crate::random::Randomizer;
use crate::state::{Restorable, State};
use crate::tree::BranchTopologyView;
use crate::tuning::AcceptanceCounts;

/// The model a chain samples from: the unnormalized log posterior of a state.
pub trait Target<V> {
    fn log_posterior(&self, state: &State<V>) -> f64;
}

/// Run-time switches for a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Adapt operator windows after every step.
    pub optimize: bool,
    /// Log operator suggestions every this many steps; 0 disables.
    pub log_every: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            log_every: 0,
        }
    }
}

/// Window values of every operator in a chain's schedule, in order, so a
/// chain can be resumed with its tuned step sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSnapshot {
    pub values: Vec<Option<f64>>,
}

/// Acceptance statistics and suggestion for one operator.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorReport {
    pub name: &'static str,
    pub counts: AcceptanceCounts,
    pub tuning_value: Option<f64>,
    pub suggestion: String,
}

/// One Metropolis–Hastings chain over a [`State`], driven by a weighted
/// schedule of operators.
#[derive(Debug, Clone)]
pub struct OperatorChain<V, T> {
    pub state: State<V>,
    pub target: T,
    operators: Vec<Operator>,
    cumulative: Vec<f64>,
    log_posterior: f64,
    config: ChainConfig,
    steps: u64,
    /// The chain-specific random seed.
    pub seed: u64,
    /// The random source for this chain.
    pub rng: Randomizer,
}

impl<V, T> OperatorChain<V, T>
where
    V: BranchTopologyView + Restorable,
    T: Target<V>,
{
    /// Creates a chain, validating every operator against `state`.
    ///
    /// `schedule` pairs each operator with its relative selection weight.
    pub fn new(state: State<V>, target: T, schedule: Vec<(Operator, f64)>) -> Result<Self> {
        if schedule.is_empty() {
            return Err(OperatorError::EmptySchedule);
        }
        let mut operators = Vec::with_capacity(schedule.len());
        let mut cumulative = Vec::with_capacity(schedule.len());
        let mut total = 0.0;
        for (op, weight) in schedule {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(OperatorError::InvalidWeight(weight));
            }
            op.validate(&state)?;
            total += weight;
            cumulative.push(total);
            operators.push(op);
        }
        cumulative.iter_mut().for_each(|c| *c /= total);

        let log_posterior = target.log_posterior(&state);
        let seed = thread_rng().gen::<u64>();
        Ok(Self {
            state,
            target,
            operators,
            cumulative,
            log_posterior,
            config: ChainConfig::default(),
            steps: 0,
            seed,
            rng: Randomizer::seed_from_u64(seed),
        })
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = Randomizer::seed_from_u64(seed);
        self
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn log_posterior(&self) -> f64 {
        self.log_posterior
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn select_operator(&mut self) -> usize {
        let u = self.rng.next_f64();
        self.cumulative
            .iter()
            .position(|&c| u < c)
            .unwrap_or(self.cumulative.len() - 1)
    }

    /// Makes one proposal and accepts or rejects it. Returns whether the
    /// move was accepted.
    pub fn advance(&mut self) -> bool {
        let i = self.select_operator();
        self.state.store();
        let log_hr = self.operators[i].propose(&mut self.state, &mut self.rng);

        let (accepted, log_alpha) = if log_hr == f64::NEG_INFINITY {
            (false, f64::NEG_INFINITY)
        } else {
            let proposed = self.target.log_posterior(&self.state);
            let log_alpha = proposed - self.log_posterior + log_hr;
            let accepted = log_alpha >= 0.0 || self.rng.next_f64().ln() < log_alpha;
            if accepted {
                self.log_posterior = proposed;
            }
            (accepted, log_alpha)
        };

        let op = &mut self.operators[i];
        if accepted {
            op.accept();
        } else {
            self.state.restore();
            op.reject();
        }
        debug!(operator = op.name(), log_hr, log_alpha, accepted, "step");
        if self.config.optimize {
            op.optimize(log_alpha);
        }

        self.steps += 1;
        if self.config.log_every > 0 && self.steps % self.config.log_every == 0 {
            self.log_suggestions();
        }
        accepted
    }

    pub fn reports(&self) -> Vec<OperatorReport> {
        self.operators
            .iter()
            .map(|op| OperatorReport {
                name: op.name(),
                counts: op.counts(),
                tuning_value: op.tuning_value(),
                suggestion: op.performance_suggestion(),
            })
            .collect()
    }

    /// Logs each operator's acceptance rate and any window suggestion.
    pub fn log_suggestions(&self) {
        for report in self.reports() {
            let rate = report.counts.acceptance_rate().unwrap_or(f64::NAN);
            if report.suggestion.is_empty() {
                info!(operator = report.name, rate, step = self.steps, "acceptance");
            } else {
                info!(
                    operator = report.name,
                    rate,
                    step = self.steps,
                    suggestion = %report.suggestion,
                    "acceptance"
                );
            }
        }
    }

    pub fn tuning_snapshot(&self) -> TuningSnapshot {
        TuningSnapshot {
            values: self.operators.iter().map(|op| op.tuning_value()).collect(),
        }
    }

    /// Sets every tunable operator's window from `snapshot`. Nothing is
    /// changed unless every window in the snapshot is finite and positive.
    pub fn restore_tuning(&mut self, snapshot: &TuningSnapshot) -> Result<()> {
        if snapshot.values.len() != self.operators.len() {
            return Err(OperatorError::SnapshotMismatch {
                expected: self.operators.len(),
                found: snapshot.values.len(),
            });
        }
        if let Some(&bad) = snapshot
            .values
            .iter()
            .flatten()
            .find(|v| !(v.is_finite() && **v > 0.0))
        {
            return Err(OperatorError::InvalidWindow(bad));
        }
        for (op, value) in self.operators.iter_mut().zip(&snapshot.values) {
            if let Some(v) = *value {
                op.set_tuning_value(v)?;
            }
        }
        Ok(())
    }
}

impl<V, T> MarkovChain for OperatorChain<V, T>
where
    V: BranchTopologyView + Restorable,
    T: Target<V>,
{
    fn step(&mut self) -> Vec<f64> {
        self.advance();
        self.state.trace_row()
    }

    fn trace_width(&self) -> usize {
        self.state.trace_width()
    }
}

/// Several independent [`OperatorChain`]s started from the same state.
#[derive(Debug, Clone)]
pub struct OperatorSampler<V, T> {
    pub chains: Vec<OperatorChain<V, T>>,
    /// The global random seed.
    pub seed: u64,
}

impl<V, T> OperatorSampler<V, T>
where
    V: BranchTopologyView + Restorable + Clone,
    T: Target<V> + Clone,
{
    pub fn new(
        state: State<V>,
        target: T,
        schedule: Vec<(Operator, f64)>,
        n_chains: usize,
    ) -> Result<Self> {
        let chain = OperatorChain::new(state, target, schedule)?;
        let seed = thread_rng().gen::<u64>();
        let sampler = Self {
            chains: vec![chain; n_chains],
            seed,
        };
        Ok(sampler.set_seed(seed))
    }

    /// Sets a new global seed; chain `i` is seeded with `seed + i`.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        for (i, chain) in self.chains.iter_mut().enumerate() {
            let chain_seed = seed.wrapping_add(i as u64);
            chain.seed = chain_seed;
            chain.rng = Randomizer::seed_from_u64(chain_seed);
        }
        self
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        for chain in self.chains.iter_mut() {
            chain.config = config;
        }
        self
    }
}

impl<V, T> HasChains for OperatorSampler<V, T>
where
    V: BranchTopologyView + Restorable + Send,
    T: Target<V> + Send,
{
    type Chain = OperatorChain<V, T>;

    fn chains_mut(&mut self) -> &mut Vec<Self::Chain> {
        &mut self.chains
    }
}
