//! fairgrid-sorter — client ordering for resource offers.
//!
//! Given clients (frameworks or roles, organized by slash-delimited role
//! path) the sorter decides who is offered resources first, using
//! weighted Dominant Resource Fairness, and keeps the per-client and
//! per-agent allocation totals that decision depends on.
//!
//! # Architecture
//!
//! ```text
//! Sorter (trait)
//!   └── DrfSorter
//!       ├── AllocationLedger (client × agent → Resources, pool totals)
//!       ├── WeightTree       (role path → weight, per-client cache)
//!       ├── RoleTree         (subtree aggregates, hierarchical only)
//!       └── share            (dominant share, sort keys)
//! ```
//!
//! All arithmetic on the hot path goes through [`ScalarQuantities`], a
//! sorted vector of fixed-point scalars.

pub mod drf;
pub mod error;
pub mod ledger;
pub mod quantities;
pub mod role_tree;
pub mod share;
pub mod sorter;
pub mod weights;

pub use drf::DrfSorter;
pub use error::SorterError;
pub use ledger::{AllocationLedger, ClientAllocation};
pub use quantities::ScalarQuantities;
pub use share::dominant_share;
pub use sorter::Sorter;
pub use weights::{DEFAULT_WEIGHT, WeightTree};

use fair_core::SorterConfig;
use fair_core::config::ConfigResult;

/// Build and initialize a sorter from configuration, applying its weights.
pub fn build_sorter(config: &SorterConfig) -> ConfigResult<Box<dyn Sorter>> {
    config.validate()?;
    let mut sorter = DrfSorter::new(config.kind);
    sorter.initialize(config.fairness_exclude_resource_names.clone());
    for (path, weight) in &config.weights {
        sorter.update_weight(path, *weight);
    }
    Ok(Box::new(sorter))
}
