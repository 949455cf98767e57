//! Configuration-time errors for operators, parameters and chains.
//!
//! A rejected proposal is not an error: kernels signal it by returning
//! `f64::NEG_INFINITY` from `propose`. The variants below describe operators
//! that cannot run at all and are reported before the first proposal.

use thiserror::Error;

use crate::tree::NodeId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperatorError {
    /// The node a joint move acts on does not have exactly two children.
    #[error("node {node} must have exactly two children, found {children}")]
    NotBinary { node: NodeId, children: usize },

    /// The independent resampler only draws from log-normal distributions.
    #[error("unsupported distribution family for independent resampling: {0}")]
    UnsupportedDistribution(&'static str),

    #[error("parameter `{0}` has dimension 0")]
    EmptyParameter(String),

    /// Window half-widths must be finite and strictly positive.
    #[error("window size must be finite and > 0, got {0}")]
    InvalidWindow(f64),

    #[error("target acceptance must lie in (0, 1), got {0}")]
    InvalidTargetAcceptance(f64),

    #[error("invalid distribution parameters: {0}")]
    InvalidDistribution(String),

    #[error("lower bound {lower} exceeds upper bound {upper}")]
    InvalidBounds { lower: String, upper: String },

    #[error("value {value} at index {index} lies outside [{lower}, {upper}]")]
    OutOfBounds {
        index: usize,
        value: String,
        lower: String,
        upper: String,
    },

    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("malformed tree: {0}")]
    MalformedTree(String),

    #[error("no {kind} parameter with handle {index}")]
    UnknownParameter { kind: &'static str, index: usize },

    #[error("operator schedule is empty")]
    EmptySchedule,

    #[error("operator weight must be finite and > 0, got {0}")]
    InvalidWeight(f64),

    /// A tuning snapshot taken from a chain with a different schedule.
    #[error("tuning snapshot has {found} entries, chain has {expected} operators")]
    SnapshotMismatch { expected: usize, found: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OperatorError>;
