pub mod chain;
pub mod core;
pub mod distributions;
pub mod error;
pub mod operators;
pub mod parameter;
pub mod random;
pub mod state;
pub mod tree;
pub mod tuning;

pub use error::{OperatorError, Result};
