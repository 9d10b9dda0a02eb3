//! The sorter contract.
//!
//! A sorter decides the order in which clients (frameworks or roles)
//! should be offered resources and keeps the running allocation totals
//! that order is computed from. Calls are synchronous and must be
//! serialized by the caller; every call observes all earlier mutations.

use std::collections::{BTreeSet, HashMap};

use fair_core::{AgentId, Resources};

use crate::quantities::ScalarQuantities;

pub trait Sorter: Send {
    /// Configure the scalar names ignored by fairness. Must be called
    /// exactly once, before anything else.
    fn initialize(&mut self, fairness_exclude_resource_names: Option<BTreeSet<String>>);

    /// Add an inactive client. No-op if already present.
    fn add(&mut self, client: &str);

    /// Remove a client and everything it holds. No-op if absent.
    fn remove(&mut self, client: &str);

    /// Include the client in `sort()`. No-op if already active.
    fn activate(&mut self, client: &str);

    /// Exclude the client from `sort()` while keeping its allocation.
    fn deactivate(&mut self, client: &str);

    /// Set the weight of a role path. Applies to every current and future
    /// client in the subtree unless a more specific path overrides it.
    fn update_weight(&mut self, path: &str, weight: f64);

    fn allocated(&mut self, client: &str, agent: &str, resources: &Resources);

    /// Swap part of a client's allocation on an agent, e.g. to attach
    /// volume metadata. `old` must be held by the client on that agent.
    fn update(&mut self, client: &str, agent: &str, old: &Resources, new: &Resources);

    fn unallocated(&mut self, client: &str, agent: &str, resources: &Resources);

    /// Everything the client holds, per agent.
    fn allocation(&self, client: &str) -> &HashMap<AgentId, Resources>;

    /// Stripped scalar total held by the client.
    fn allocation_scalar_quantities(&self, client: &str) -> &ScalarQuantities;

    /// Client → resources held on the agent.
    fn allocation_on(&self, agent: &str) -> HashMap<String, Resources>;

    /// What the client holds on the agent; empty if nothing.
    fn allocation_of(&self, client: &str, agent: &str) -> Resources;

    /// Stripped scalar total of the pool.
    fn total_scalar_quantities(&self) -> &ScalarQuantities;

    /// Add an agent's resources to the pool.
    fn add_agent(&mut self, agent: &str, resources: &Resources);

    /// Remove an agent's resources from the pool.
    fn remove_agent(&mut self, agent: &str, resources: &Resources);

    /// Active clients in the order they should be offered resources.
    fn sort(&mut self) -> Vec<String>;

    fn contains(&self, client: &str) -> bool;

    /// Number of clients, active or not.
    fn count(&self) -> usize;

    /// Effective weight of the client's role path.
    fn weight(&self, client: &str) -> f64;

    /// Weighted dominant share of the client against the current pool.
    fn share(&self, client: &str) -> f64;
}
