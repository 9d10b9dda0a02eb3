//! DRF sorter.
//!
//! One implementation of [`Sorter`] covers both ordering policies:
//!
//! - [`SorterKind::Hierarchical`] keeps a [`RoleTree`] of subtree
//!   aggregates and breaks share ties level by level along the role path.
//! - [`SorterKind::Flat`] breaks ties directly on client id.
//!
//! Shares are not maintained incrementally. Mutations only drop the cached
//! order; the next `sort()` recomputes every active client's share, which
//! costs O(C·R + C log C) and leaves allocation bookkeeping O(R) per call.

use std::collections::{BTreeSet, HashMap, HashSet};

use fair_core::{AgentId, Resources, SorterKind, role};
use tracing::{debug, info, trace};

use crate::error::{SorterError, fatal};
use crate::ledger::AllocationLedger;
use crate::quantities::ScalarQuantities;
use crate::role_tree::RoleTree;
use crate::share::{ClientKey, dominant_share};
use crate::sorter::Sorter;
use crate::weights::WeightTree;

#[derive(Debug)]
pub struct DrfSorter {
    kind: SorterKind,
    initialized: bool,
    excluded: BTreeSet<String>,
    ledger: AllocationLedger,
    weights: WeightTree,
    /// Present only for hierarchical ordering.
    roles: Option<RoleTree>,
    active: HashSet<String>,
    /// Last computed order; `None` once any mutation may have changed it.
    sorted: Option<Vec<String>>,
}

impl DrfSorter {
    pub fn new(kind: SorterKind) -> Self {
        Self {
            kind,
            initialized: false,
            excluded: BTreeSet::new(),
            ledger: AllocationLedger::new(),
            weights: WeightTree::new(),
            roles: match kind {
                SorterKind::Hierarchical => Some(RoleTree::new()),
                SorterKind::Flat => None,
            },
            active: HashSet::new(),
            sorted: None,
        }
    }

    pub fn hierarchical() -> Self {
        Self::new(SorterKind::Hierarchical)
    }

    pub fn flat() -> Self {
        Self::new(SorterKind::Flat)
    }

    /// Aggregate allocated on `agent` across all clients.
    pub fn agent_total(&self, agent: &str) -> Resources {
        self.ensure_initialized("agent_total");
        self.ledger.agent_total(agent)
    }

    /// Resources `agent` contributes to the pool.
    pub fn agent_pool(&self, agent: &str) -> Resources {
        self.ensure_initialized("agent_pool");
        self.ledger.pool_resources(agent)
    }

    /// Stripped quantities allocated to the subtree at `path`. Only
    /// tracked by hierarchical sorters.
    pub fn subtree_allocation(&self, path: &str) -> Option<&ScalarQuantities> {
        self.roles.as_ref()?.allocation(path)
    }

    fn ensure_initialized(&self, operation: &'static str) {
        if !self.initialized {
            fatal(SorterError::NotInitialized(operation));
        }
    }

    fn ensure_client(&self, client: &str) {
        if !self.ledger.is_tracked(client) {
            fatal(SorterError::UnknownClient(client.to_string()));
        }
    }

    fn ensure_path(path: &str) {
        if let Err(err) = role::validate(path) {
            fatal(SorterError::InvalidPath {
                path: path.to_string(),
                reason: err.to_string(),
            });
        }
    }

    fn invalidate(&mut self) {
        self.sorted = None;
    }

    fn weighted_share(&self, held: &ScalarQuantities, weight: f64) -> f64 {
        dominant_share(held, self.ledger.pool_quantities(), &self.excluded) / weight
    }
}

impl Default for DrfSorter {
    fn default() -> Self {
        Self::hierarchical()
    }
}

impl Sorter for DrfSorter {
    fn initialize(&mut self, fairness_exclude_resource_names: Option<BTreeSet<String>>) {
        if self.initialized {
            fatal(SorterError::AlreadyInitialized);
        }
        self.excluded = fairness_exclude_resource_names.unwrap_or_default();
        self.initialized = true;
        info!(kind = ?self.kind, excluded = ?self.excluded, "sorter initialized");
    }

    fn add(&mut self, client: &str) {
        self.ensure_initialized("add");
        Self::ensure_path(client);
        if !self.ledger.track(client) {
            debug!(client, "client already present");
            return;
        }
        self.weights.track(client);
        if let Some(tree) = &mut self.roles {
            tree.insert_client(client);
        }
        debug!(client, "client added");
    }

    fn remove(&mut self, client: &str) {
        self.ensure_initialized("remove");
        let Some(allocation) = self.ledger.untrack(client) else {
            debug!(client, "client not present, nothing to remove");
            return;
        };
        self.weights.untrack(client);
        if let Some(tree) = &mut self.roles {
            tree.remove_client(client, &allocation.scalar_quantities);
        }
        self.active.remove(client);
        self.invalidate();
        debug!(client, agents = allocation.resources.len(), "client removed");
    }

    fn activate(&mut self, client: &str) {
        self.ensure_initialized("activate");
        self.ensure_client(client);
        if self.active.insert(client.to_string()) {
            self.invalidate();
            debug!(client, "client activated");
        }
    }

    fn deactivate(&mut self, client: &str) {
        self.ensure_initialized("deactivate");
        self.ensure_client(client);
        if self.active.remove(client) {
            self.invalidate();
            debug!(client, "client deactivated");
        }
    }

    fn update_weight(&mut self, path: &str, weight: f64) {
        self.ensure_initialized("update_weight");
        Self::ensure_path(path);
        if !weight.is_finite() || weight <= 0.0 {
            fatal(SorterError::InvalidWeight {
                path: path.to_string(),
                weight,
            });
        }
        self.weights.set(path, weight);
        self.invalidate();
    }

    fn allocated(&mut self, client: &str, agent: &str, resources: &Resources) {
        self.ensure_initialized("allocated");
        let delta = self.ledger.allocate(client, agent, resources);
        if delta.is_empty() {
            return;
        }
        if let Some(tree) = &mut self.roles {
            tree.add_allocation(client, &delta);
        }
        self.invalidate();
    }

    fn update(&mut self, client: &str, agent: &str, old: &Resources, new: &Resources) {
        self.ensure_initialized("update");
        let (removed, added) = self.ledger.update(client, agent, old, new);
        if removed == added {
            trace!(client, agent, "allocation metadata updated");
            return;
        }
        if let Some(tree) = &mut self.roles {
            tree.sub_allocation(client, &removed);
            tree.add_allocation(client, &added);
        }
        self.invalidate();
        trace!(client, agent, %removed, %added, "allocation quantities updated");
    }

    fn unallocated(&mut self, client: &str, agent: &str, resources: &Resources) {
        self.ensure_initialized("unallocated");
        let delta = self.ledger.unallocate(client, agent, resources);
        if delta.is_empty() {
            return;
        }
        if let Some(tree) = &mut self.roles {
            tree.sub_allocation(client, &delta);
        }
        self.invalidate();
    }

    fn allocation(&self, client: &str) -> &HashMap<AgentId, Resources> {
        self.ensure_initialized("allocation");
        &self.ledger.client(client).resources
    }

    fn allocation_scalar_quantities(&self, client: &str) -> &ScalarQuantities {
        self.ensure_initialized("allocation_scalar_quantities");
        &self.ledger.client(client).scalar_quantities
    }

    fn allocation_on(&self, agent: &str) -> HashMap<String, Resources> {
        self.ensure_initialized("allocation_on");
        self.ledger.agent_allocation(agent)
    }

    fn allocation_of(&self, client: &str, agent: &str) -> Resources {
        self.ensure_initialized("allocation_of");
        self.ledger.client_agent_allocation(client, agent)
    }

    fn total_scalar_quantities(&self) -> &ScalarQuantities {
        self.ensure_initialized("total_scalar_quantities");
        self.ledger.pool_quantities()
    }

    fn add_agent(&mut self, agent: &str, resources: &Resources) {
        self.ensure_initialized("add_agent");
        self.ledger.add_to_pool(agent, resources);
        self.invalidate();
    }

    fn remove_agent(&mut self, agent: &str, resources: &Resources) {
        self.ensure_initialized("remove_agent");
        self.ledger.remove_from_pool(agent, resources);
        self.invalidate();
    }

    fn sort(&mut self) -> Vec<String> {
        self.ensure_initialized("sort");
        if let Some(order) = &self.sorted {
            return order.clone();
        }

        let pool = self.ledger.pool_quantities();
        let subtree_shares: Option<HashMap<String, f64>> = self.roles.as_ref().map(|tree| {
            tree.iter()
                .map(|(path, held)| {
                    let share = dominant_share(held, pool, &self.excluded) / self.weights.lookup(path);
                    (path.to_string(), share)
                })
                .collect()
        });

        let mut keys: Vec<ClientKey<'_>> = Vec::with_capacity(self.active.len());
        for client in &self.active {
            let held = &self.ledger.client(client).scalar_quantities;
            let share = dominant_share(held, pool, &self.excluded) / self.weights.client_weight(client);
            keys.push(match &subtree_shares {
                Some(subtrees) => ClientKey::hierarchical(client, share, subtrees),
                None => ClientKey::flat(client, share),
            });
        }
        // Keys form a total order, so the unstable sort is deterministic.
        keys.sort_unstable();

        let order: Vec<String> = keys.iter().map(|key| key.client.to_string()).collect();
        trace!(?order, "clients sorted");
        self.sorted = Some(order.clone());
        order
    }

    fn contains(&self, client: &str) -> bool {
        self.ensure_initialized("contains");
        self.ledger.is_tracked(client)
    }

    fn count(&self) -> usize {
        self.ensure_initialized("count");
        self.ledger.client_count()
    }

    fn weight(&self, client: &str) -> f64 {
        self.ensure_initialized("weight");
        self.weights.lookup(client)
    }

    fn share(&self, client: &str) -> f64 {
        self.ensure_initialized("share");
        let held = &self.ledger.client(client).scalar_quantities;
        self.weighted_share(held, self.weights.lookup(client))
    }
}
