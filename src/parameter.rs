/*!
Bounded parameter vectors, the values every operator mutates.

A [`Parameter`] is an ordered list of scalars sharing one inclusive
`[lower, upper]` range. Operators read and overwrite single entries; the
chain driver snapshots the whole vector with [`Parameter::store`] before a
proposal and puts it back with [`Parameter::restore`] when the move is
rejected.

# Examples

```rust
use clock_operators::parameter::{IntegerParameter, RealParameter};

let rates = RealParameter::new("rates", vec![1.0, 0.5, 2.0])
    .unwrap()
    .with_bounds(0.0, f64::INFINITY)
    .unwrap();
assert_eq!(rates.dimension(), 3);

let mut category = IntegerParameter::new("category", vec![1]).unwrap();
category.set(0, 2);
assert_eq!(category.value(0), 2);
```
*/

use std::fmt::Display;

use crate::error::{OperatorError, Result};

/// A named vector of values bounded by one shared inclusive range.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter<T> {
    name: String,
    values: Vec<T>,
    stored: Vec<T>,
    lower: T,
    upper: T,
}

/// Real-valued parameter, e.g. branch rates.
pub type RealParameter = Parameter<f64>;

/// Integer-valued parameter, e.g. a category index.
pub type IntegerParameter = Parameter<i64>;

/// Scalar types a [`Parameter`] can hold.
pub trait ParameterValue: Copy + PartialOrd + Display {
    /// Smallest value representable, used as the default lower bound.
    fn min_bound() -> Self;
    /// Largest value representable, used as the default upper bound.
    fn max_bound() -> Self;
}

impl ParameterValue for f64 {
    fn min_bound() -> Self {
        f64::NEG_INFINITY
    }

    fn max_bound() -> Self {
        f64::INFINITY
    }
}

impl ParameterValue for i64 {
    fn min_bound() -> Self {
        i64::MIN
    }

    fn max_bound() -> Self {
        i64::MAX
    }
}

impl<T: ParameterValue> Parameter<T> {
    /// Creates an unbounded parameter. Fails when `values` is empty.
    pub fn new(name: impl Into<String>, values: Vec<T>) -> Result<Self> {
        let name = name.into();
        if values.is_empty() {
            return Err(OperatorError::EmptyParameter(name));
        }
        Ok(Self {
            name,
            stored: values.clone(),
            values,
            lower: T::min_bound(),
            upper: T::max_bound(),
        })
    }

    /// Restricts the parameter to `[lower, upper]`. Every current value must
    /// already lie inside the new range.
    pub fn with_bounds(mut self, lower: T, upper: T) -> Result<Self> {
        if !(lower <= upper) {
            return Err(OperatorError::InvalidBounds {
                lower: lower.to_string(),
                upper: upper.to_string(),
            });
        }
        self.lower = lower;
        self.upper = upper;
        for (index, &value) in self.values.iter().enumerate() {
            if !self.within_bounds(value) {
                return Err(self.out_of_bounds(index, value));
            }
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn lower(&self) -> T {
        self.lower
    }

    pub fn upper(&self) -> T {
        self.upper
    }

    /// Returns the value at `index`.
    ///
    /// # Panics
    /// Panics if `index >= self.dimension()`.
    pub fn value(&self, index: usize) -> T {
        self.values[index]
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// True when `value` lies in `[lower, upper]`.
    pub fn within_bounds(&self, value: T) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Overwrites the value at `index` without a bounds check. Operators call
    /// this only after verifying the value themselves.
    pub fn set(&mut self, index: usize, value: T) {
        self.values[index] = value;
    }

    /// Overwrites the value at `index`, refusing values outside the bounds.
    pub fn set_checked(&mut self, index: usize, value: T) -> Result<()> {
        if !self.within_bounds(value) {
            return Err(self.out_of_bounds(index, value));
        }
        self.values[index] = value;
        Ok(())
    }

    /// Remembers the current values so a rejected proposal can be undone.
    pub fn store(&mut self) {
        self.stored.copy_from_slice(&self.values);
    }

    /// Puts back the values saved by the last [`Parameter::store`].
    pub fn restore(&mut self) {
        self.values.copy_from_slice(&self.stored);
    }

    fn out_of_bounds(&self, index: usize, value: T) -> OperatorError {
        OperatorError::OutOfBounds {
            index,
            value: value.to_string(),
            lower: self.lower.to_string(),
            upper: self.upper.to_string(),
        }
    }
}
