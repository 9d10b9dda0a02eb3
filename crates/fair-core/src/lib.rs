//! fair-core — shared types for the FairGrid allocation engine.
//!
//! - **`scalar`** — fixed-point scalar quantities (three decimal digits)
//! - **`resources`** — structured resources with reservation/volume metadata
//! - **`role`** — slash-delimited role path helpers
//! - **`config`** — sorter configuration parsed from TOML

pub mod config;
pub mod resources;
pub mod role;
pub mod scalar;

pub use config::{ConfigError, SorterConfig, SorterKind};
pub use resources::{DiskInfo, Ranges, Reservation, Resource, Resources, ResourcesError, Value};
pub use role::RoleError;
pub use scalar::Scalar;

/// Identifier of a resource-holding node (agent) in the cluster.
pub type AgentId = String;
