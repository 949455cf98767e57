/*!
Parametric distributions over positive reals, used to describe how branch
rates vary among branches.

The independent resampler draws replacement rates from a
[`ParametricDistribution::LogNormal`]; the other families exist so a model can
describe its rate prior with the same type and so a resampler configured with
the wrong family is caught at construction.

# Examples

```rust
use clock_operators::distributions::{LogNormalModel, ParametricDistribution};

let prior = ParametricDistribution::LogNormal(LogNormalModel::new(1.0, 0.5, true).unwrap());
let lp = prior.log_density(1.0);
assert!(lp.is_finite());
assert_eq!(prior.log_density(-1.0), f64::NEG_INFINITY);
```
*/

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{OperatorError, Result};

/**
Log-normal distribution with log-scale standard deviation `s`.

If `mean_in_real_space` is set, `m` is the mean of the distribution itself;
otherwise it is the mean of the logarithm.
*/
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogNormalModel {
    pub m: f64,
    pub s: f64,
    pub mean_in_real_space: bool,
}

impl LogNormalModel {
    pub fn new(m: f64, s: f64, mean_in_real_space: bool) -> Result<Self> {
        let model = Self {
            m,
            s,
            mean_in_real_space,
        };
        model.validate()?;
        Ok(model)
    }

    /// Checks that `s > 0` and, for a real-space mean, that `m > 0`.
    pub fn validate(&self) -> Result<()> {
        let Self { m, s, .. } = *self;
        if !m.is_finite() || !s.is_finite() || s <= 0.0 {
            return Err(OperatorError::InvalidDistribution(format!(
                "log-normal needs finite M and S > 0, got M={m}, S={s}"
            )));
        }
        if self.mean_in_real_space && m <= 0.0 {
            return Err(OperatorError::InvalidDistribution(format!(
                "log-normal mean in real space must be > 0, got {m}"
            )));
        }
        Ok(())
    }

    /// Location of the underlying normal distribution.
    pub fn mu(&self) -> f64 {
        if self.mean_in_real_space {
            self.m.ln() - 0.5 * self.s * self.s
        } else {
            self.m
        }
    }

    pub fn log_density(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return f64::NEG_INFINITY;
        }
        let z = (x.ln() - self.mu()) / self.s;
        -0.5 * z * z - x.ln() - self.s.ln() - 0.5 * (2.0 * PI).ln()
    }
}

/// The distribution families a rate prior can take.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParametricDistribution {
    LogNormal(LogNormalModel),
    Exponential { mean: f64 },
    Uniform { lower: f64, upper: f64 },
}

impl ParametricDistribution {
    pub fn exponential(mean: f64) -> Result<Self> {
        let dist = Self::Exponential { mean };
        dist.validate()?;
        Ok(dist)
    }

    pub fn uniform(lower: f64, upper: f64) -> Result<Self> {
        let dist = Self::Uniform { lower, upper };
        dist.validate()?;
        Ok(dist)
    }

    /// Checks the family's parameters, e.g. after building a variant by hand
    /// or deserializing one.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::LogNormal(model) => model.validate(),
            Self::Exponential { mean } => {
                if mean.is_finite() && mean > 0.0 {
                    Ok(())
                } else {
                    Err(OperatorError::InvalidDistribution(format!(
                        "exponential mean must be finite and > 0, got {mean}"
                    )))
                }
            }
            Self::Uniform { lower, upper } => {
                if lower.is_finite() && upper.is_finite() && lower < upper {
                    Ok(())
                } else {
                    Err(OperatorError::InvalidDistribution(format!(
                        "uniform needs finite lower < upper, got [{lower}, {upper}]"
                    )))
                }
            }
        }
    }

    /// A short name for the family, used in error messages.
    pub fn family(&self) -> &'static str {
        match self {
            Self::LogNormal(_) => "log-normal",
            Self::Exponential { .. } => "exponential",
            Self::Uniform { .. } => "uniform",
        }
    }

    /// Normalized log-density at `x`; `-inf` outside the support.
    pub fn log_density(&self, x: f64) -> f64 {
        match *self {
            Self::LogNormal(model) => model.log_density(x),
            Self::Exponential { mean } => {
                if x < 0.0 {
                    f64::NEG_INFINITY
                } else {
                    -mean.ln() - x / mean
                }
            }
            Self::Uniform { lower, upper } => {
                if (lower..=upper).contains(&x) {
                    -(upper - lower).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }
}
