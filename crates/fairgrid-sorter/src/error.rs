//! Sorter contract violations.
//!
//! The sorter performs no I/O, so nothing it does can fail for reasons
//! outside the caller's control. Every error here is a caller bug, and
//! continuing would let allocation totals drift. They are raised through
//! [`fatal`], which logs the violation and panics.

use fair_core::{Resources, Scalar};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SorterError {
    #[error("sorter used before initialize(): {0}")]
    NotInitialized(&'static str),

    #[error("sorter initialized twice")]
    AlreadyInitialized,

    #[error("unknown client '{0}'")]
    UnknownClient(String),

    #[error("invalid client path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("weight for '{path}' must be finite and positive, got {weight}")]
    InvalidWeight { path: String, weight: f64 },

    #[error("client '{client}' does not hold {resources} on agent '{agent}'")]
    NotAllocated {
        client: String,
        agent: String,
        resources: Resources,
    },

    #[error("agent '{agent}' does not contribute {resources} to the pool")]
    NotInPool { agent: String, resources: Resources },

    #[error("failed to find scalar quantity '{0}'")]
    MissingQuantity(String),

    #[error("scalar quantity overflow combining {lhs} and {rhs}")]
    QuantityOverflow { lhs: Scalar, rhs: Scalar },
}

/// Report a contract violation and halt.
#[track_caller]
pub(crate) fn fatal(error: SorterError) -> ! {
    tracing::error!(%error, "sorter contract violation");
    panic!("{error}");
}
