/*!
Window auto-tuning ("coercion") for operators with a step-size parameter.

After every proposal the chain driver hands the tuner the log acceptance
probability of the move. The tuner nudges the window half-width in log space
by an amount decided by a [`CoercionPolicy`], pushing the acceptance rate
toward the target. It also keeps the operator's accept/reject counters and
turns them into a human-readable suggestion when the observed acceptance
rate drifts out of `[0.10, 0.40]`.

# Examples

```rust
use clock_operators::tuning::AdaptiveTuner;

let mut tuner = AdaptiveTuner::new(1.0).unwrap();
tuner.optimize(f64::NEG_INFINITY); // a rejected move shrinks the window
assert!(tuner.tuning_value() < 1.0);

for _ in 0..20 {
    tuner.reject();
}
assert!(tuner.performance_suggestion().starts_with("Try setting window size"));
```
*/

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{OperatorError, Result};

/// Default target acceptance probability for tuned operators.
pub const DEFAULT_TARGET_ACCEPTANCE: f64 = 0.234;

/// Observed acceptance rates below this trigger a suggestion.
pub const LOW_ACCEPTANCE: f64 = 0.10;

/// Observed acceptance rates above this trigger a suggestion.
pub const HIGH_ACCEPTANCE: f64 = 0.40;

/// Decides how far to move the log window after one proposal.
pub trait CoercionPolicy: Debug + Send + Sync {
    /// Log-space change to the window. Must be non-decreasing in `log_alpha`.
    ///
    /// `proposals` counts the moves made so far by the operator being tuned.
    fn delta(&self, log_alpha: f64, target: f64, proposals: u64) -> f64;
}

/// Diminishing-adaptation update: the acceptance probability's distance from
/// the target, scaled by `1 / (proposals + 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RobbinsMonro;

impl CoercionPolicy for RobbinsMonro {
    fn delta(&self, log_alpha: f64, target: f64, proposals: u64) -> f64 {
        // f64::min would turn NaN into 0, i.e. a certain acceptance.
        if log_alpha.is_nan() {
            return 0.0;
        }
        let delta = (log_alpha.min(0.0).exp() - target) / (proposals as f64 + 1.0);
        if delta.is_finite() {
            delta
        } else {
            0.0
        }
    }
}

/// Accept/reject tallies for one operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCounts {
    pub accepted: u64,
    pub rejected: u64,
}

impl AcceptanceCounts {
    pub fn total(&self) -> u64 {
        self.accepted + self.rejected
    }

    /// Fraction of accepted proposals, `None` before the first proposal.
    pub fn acceptance_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            n => Some(self.accepted as f64 / n as f64),
        }
    }
}

/// Tuning state of one operator: the window half-width, the target acceptance
/// probability, the counters and the coercion policy.
///
/// The policy is shared between clones, e.g. the chains of one sampler.
#[derive(Debug, Clone)]
pub struct AdaptiveTuner {
    window: f64,
    target: f64,
    counts: AcceptanceCounts,
    policy: Arc<dyn CoercionPolicy>,
}

fn check_window(window: f64) -> Result<f64> {
    if window.is_finite() && window > 0.0 {
        Ok(window)
    } else {
        Err(OperatorError::InvalidWindow(window))
    }
}

impl AdaptiveTuner {
    /// A tuner with the default [`RobbinsMonro`] policy.
    pub fn new(window: f64) -> Result<Self> {
        Self::with_policy(window, RobbinsMonro)
    }

    pub fn with_policy<P: CoercionPolicy + 'static>(window: f64, policy: P) -> Result<Self> {
        Ok(Self {
            window: check_window(window)?,
            target: DEFAULT_TARGET_ACCEPTANCE,
            counts: AcceptanceCounts::default(),
            policy: Arc::new(policy),
        })
    }

    /// Overrides the target acceptance probability (default 0.234). The
    /// target must lie strictly between 0 and 1.
    pub fn with_target_acceptance(mut self, target: f64) -> Result<Self> {
        if !(target > 0.0 && target < 1.0) {
            return Err(OperatorError::InvalidTargetAcceptance(target));
        }
        self.target = target;
        Ok(self)
    }

    pub fn target_acceptance(&self) -> f64 {
        self.target
    }

    pub fn tuning_value(&self) -> f64 {
        self.window
    }

    /// Overwrites the window, e.g. when resuming a chain. Fails on a window
    /// that is not finite and strictly positive, leaving the old one.
    pub fn set_tuning_value(&mut self, value: f64) -> Result<()> {
        self.window = check_window(value)?;
        Ok(())
    }

    pub fn counts(&self) -> AcceptanceCounts {
        self.counts
    }

    pub fn accept(&mut self) {
        self.counts.accepted += 1;
    }

    pub fn reject(&mut self) {
        self.counts.rejected += 1;
    }

    /// Moves the window in log space after a proposal with log acceptance
    /// probability `log_alpha`.
    pub fn optimize(&mut self, log_alpha: f64) {
        let delta = self
            .policy
            .delta(log_alpha, self.target, self.counts.total());
        self.window = (self.window.ln() + delta).exp().max(f64::MIN_POSITIVE);
    }

    /// Suggests a new window when the acceptance rate is outside
    /// `[0.10, 0.40]`; returns an empty string otherwise.
    pub fn performance_suggestion(&self) -> String {
        let Some(prob) = self.counts.acceptance_rate() else {
            return String::new();
        };
        let ratio = (prob / self.target).clamp(0.5, 2.0);
        let new_window = self.window * ratio;
        if !(LOW_ACCEPTANCE..=HIGH_ACCEPTANCE).contains(&prob) {
            format!(
                "Try setting window size to about {}",
                format_decimal(new_window)
            )
        } else {
            String::new()
        }
    }
}

/// Formats with at most three decimals, dropping trailing zeros.
fn format_decimal(x: f64) -> String {
    let s = format!("{x:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tuner_with(window: f64, accepted: u64, rejected: u64) -> AdaptiveTuner {
        let mut t = AdaptiveTuner::new(window).unwrap();
        (0..accepted).for_each(|_| t.accept());
        (0..rejected).for_each(|_| t.reject());
        t
    }

    #[test]
    fn test_set_then_get_is_exact() {
        let mut t = AdaptiveTuner::new(1.0).unwrap();
        for v in [0.1, 3.25, 1e-300, 123456.789] {
            t.set_tuning_value(v).unwrap();
            assert_eq!(t.tuning_value(), v);
        }
    }

    #[test]
    fn test_set_rejects_non_positive_window() {
        let mut t = AdaptiveTuner::new(1.5).unwrap();
        for v in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                t.set_tuning_value(v),
                Err(OperatorError::InvalidWindow(_))
            ));
            assert_eq!(t.tuning_value(), 1.5);
        }
    }

    #[test]
    fn test_target_acceptance_range() {
        let t = AdaptiveTuner::new(1.0).unwrap();
        assert_eq!(t.target_acceptance(), DEFAULT_TARGET_ACCEPTANCE);
        let t = t.with_target_acceptance(0.44).unwrap();
        assert_eq!(t.target_acceptance(), 0.44);
        for bad in [0.0, 1.0, -0.2, f64::NAN] {
            let res = AdaptiveTuner::new(1.0).unwrap().with_target_acceptance(bad);
            assert!(matches!(res, Err(OperatorError::InvalidTargetAcceptance(_))));
        }
    }

    #[test]
    fn test_invalid_window() {
        assert!(AdaptiveTuner::new(0.0).is_err());
        assert!(AdaptiveTuner::new(-1.0).is_err());
        assert!(AdaptiveTuner::new(f64::INFINITY).is_err());
        assert!(AdaptiveTuner::new(f64::NAN).is_err());
    }

    #[test]
    fn test_optimize_direction() {
        let mut t = AdaptiveTuner::new(1.0).unwrap();
        t.optimize(0.0); // alpha = 1 > target: widen
        assert!(t.tuning_value() > 1.0);

        let mut t = AdaptiveTuner::new(1.0).unwrap();
        t.optimize(-10.0); // alpha ~ 0 < target: narrow
        assert!(t.tuning_value() < 1.0);
    }

    #[test]
    fn test_optimize_matches_update_rule() {
        let mut t = tuner_with(2.0, 3, 6); // 9 proposals so far
        t.optimize(-0.5);
        let delta = ((-0.5_f64).exp() - DEFAULT_TARGET_ACCEPTANCE) / 10.0;
        assert_abs_diff_eq!(t.tuning_value(), (2.0_f64.ln() + delta).exp(), epsilon = 1e-14);
    }

    #[test]
    fn test_optimize_never_reaches_zero() {
        let mut t = AdaptiveTuner::new(f64::MIN_POSITIVE).unwrap();
        for _ in 0..1_000 {
            t.optimize(f64::NEG_INFINITY);
        }
        assert!(t.tuning_value() > 0.0);
    }

    #[test]
    fn test_policy_is_monotone_in_log_alpha() {
        let policy = RobbinsMonro;
        let mut last = f64::NEG_INFINITY;
        for i in -50..=10 {
            let d = policy.delta(i as f64 * 0.2, 0.3, 5);
            assert!(d >= last);
            last = d;
        }
        assert_eq!(policy.delta(f64::NAN, 0.3, 0), 0.0);
    }

    #[test]
    fn test_nan_log_alpha_leaves_window() {
        let mut t = AdaptiveTuner::new(1.0).unwrap();
        t.reject();
        t.optimize(f64::NAN);
        assert_eq!(t.tuning_value(), 1.0);
    }

    /// Halves the window on rejection, doubles it on acceptance.
    #[derive(Debug)]
    struct Halving;

    impl CoercionPolicy for Halving {
        fn delta(&self, log_alpha: f64, _target: f64, _proposals: u64) -> f64 {
            if log_alpha >= 0.0 {
                std::f64::consts::LN_2
            } else {
                -std::f64::consts::LN_2
            }
        }
    }

    #[test]
    fn test_custom_policy_drives_window() {
        let mut t = AdaptiveTuner::with_policy(4.0, Halving).unwrap();
        t.optimize(f64::NEG_INFINITY);
        assert_abs_diff_eq!(t.tuning_value(), 2.0, epsilon = 1e-12);
        t.optimize(0.0);
        assert_abs_diff_eq!(t.tuning_value(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_alternating_stream_settles() {
        // Alternating full acceptance and rejection averages to the 0.5
        // target: successive updates cancel and their size decays.
        let mut t = AdaptiveTuner::new(1.0)
            .unwrap()
            .with_target_acceptance(0.5)
            .unwrap();
        let mut steps = Vec::new();
        for i in 0..2_000 {
            let before = t.tuning_value();
            let log_alpha = if i % 2 == 0 { 0.0 } else { f64::NEG_INFINITY };
            t.optimize(log_alpha);
            if i % 2 == 0 {
                t.accept();
            } else {
                t.reject();
            }
            steps.push((t.tuning_value().ln() - before.ln()).abs());
        }
        assert!(steps[1_999] < steps[1]);
        assert!(steps[1_999] < 1e-3);
        assert!((t.tuning_value() - 1.0).abs() < 0.5);
    }

    #[test]
    fn test_suggestion_empty_inside_band() {
        assert_eq!(tuner_with(1.0, 2, 8).performance_suggestion(), "");
        assert_eq!(tuner_with(1.0, 1, 3).performance_suggestion(), "");
        assert_eq!(tuner_with(1.0, 4, 6).performance_suggestion(), "");
    }

    #[test]
    fn test_suggestion_empty_without_proposals() {
        assert_eq!(AdaptiveTuner::new(1.0).unwrap().performance_suggestion(), "");
    }

    #[test]
    fn test_suggestion_low_acceptance() {
        // prob = 0.05, ratio clamps to 0.5
        let t = tuner_with(2.0, 1, 19);
        assert_eq!(
            t.performance_suggestion(),
            "Try setting window size to about 1"
        );
    }

    #[test]
    fn test_suggestion_high_acceptance() {
        // prob = 0.9, ratio clamps to 2.0
        let t = tuner_with(0.3, 9, 1);
        assert_eq!(
            t.performance_suggestion(),
            "Try setting window size to about 0.6"
        );
    }

    #[test]
    fn test_suggestion_unclamped_ratio() {
        // prob = 0.45, ratio = 0.45 / 0.234
        let t = tuner_with(1.0, 9, 11);
        let expected = format_decimal(0.45 / DEFAULT_TARGET_ACCEPTANCE);
        assert_eq!(expected, "1.923");
        assert_eq!(
            t.performance_suggestion(),
            format!("Try setting window size to about {expected}")
        );
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(1.0), "1");
        assert_eq!(format_decimal(0.25), "0.25");
        assert_eq!(format_decimal(1.23456), "1.235");
        assert_eq!(format_decimal(10.5004), "10.5");
        assert_eq!(format_decimal(0.0001), "0");
    }
}
