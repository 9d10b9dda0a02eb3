//! Allocation ledger.
//!
//! Records, per client and per agent, the resources currently allocated,
//! together with each client's cached stripped scalar total. The ledger
//! also tracks the pool: the resources each agent contributes to the
//! sorter's view of the cluster.
//!
//! Invariant: for every agent, `total` equals the sum of `by_client`.

use std::collections::HashMap;

use fair_core::{AgentId, Resources};
use tracing::trace;

use crate::error::{SorterError, fatal};
use crate::quantities::ScalarQuantities;

/// Everything allocated to one client.
#[derive(Debug, Clone, Default)]
pub struct ClientAllocation {
    pub resources: HashMap<AgentId, Resources>,
    pub scalar_quantities: ScalarQuantities,
}

#[derive(Debug, Default)]
struct AgentAllocation {
    by_client: HashMap<String, Resources>,
    total: Resources,
}

#[derive(Debug, Default)]
pub struct AllocationLedger {
    clients: HashMap<String, ClientAllocation>,
    agents: HashMap<AgentId, AgentAllocation>,
    pool: HashMap<AgentId, Resources>,
    pool_quantities: ScalarQuantities,
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Clients ────────────────────────────────────────────────────

    /// Start tracking `client`. Returns false if it was already tracked.
    pub fn track(&mut self, client: &str) -> bool {
        if self.clients.contains_key(client) {
            return false;
        }
        self.clients.insert(client.to_string(), ClientAllocation::default());
        true
    }

    /// Stop tracking `client` and purge it from every agent record.
    pub fn untrack(&mut self, client: &str) -> Option<ClientAllocation> {
        let allocation = self.clients.remove(client)?;
        for (agent, resources) in &allocation.resources {
            if let Some(record) = self.agents.get_mut(agent) {
                record.by_client.remove(client);
                record.total -= resources;
                if record.by_client.is_empty() {
                    self.agents.remove(agent);
                }
            }
        }
        Some(allocation)
    }

    pub fn is_tracked(&self, client: &str) -> bool {
        self.clients.contains_key(client)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn client(&self, client: &str) -> &ClientAllocation {
        match self.clients.get(client) {
            Some(allocation) => allocation,
            None => fatal(SorterError::UnknownClient(client.to_string())),
        }
    }

    fn client_mut(&mut self, client: &str) -> &mut ClientAllocation {
        match self.clients.get_mut(client) {
            Some(allocation) => allocation,
            None => fatal(SorterError::UnknownClient(client.to_string())),
        }
    }

    // ── Allocations ────────────────────────────────────────────────

    /// Record `resources` as allocated. Returns the stripped delta.
    pub fn allocate(&mut self, client: &str, agent: &str, resources: &Resources) -> ScalarQuantities {
        let delta = ScalarQuantities::from_resources(resources);
        let allocation = self.client_mut(client);
        if resources.is_empty() {
            return delta;
        }

        *allocation.resources.entry(agent.to_string()).or_default() += resources;
        allocation.scalar_quantities += &delta;

        let record = self.agents.entry(agent.to_string()).or_default();
        *record.by_client.entry(client.to_string()).or_default() += resources;
        record.total += resources;

        trace!(client, agent, %resources, "allocated");
        delta
    }

    /// Remove `resources` from the record. Returns the stripped delta.
    pub fn unallocate(&mut self, client: &str, agent: &str, resources: &Resources) -> ScalarQuantities {
        self.check_held(client, agent, resources);
        let delta = ScalarQuantities::from_resources(resources);

        let allocation = self.client_mut(client);
        if let Some(held) = allocation.resources.get_mut(agent) {
            *held -= resources;
            if held.is_empty() {
                allocation.resources.remove(agent);
            }
        }
        allocation.scalar_quantities -= &delta;

        if let Some(record) = self.agents.get_mut(agent) {
            if let Some(held) = record.by_client.get_mut(client) {
                *held -= resources;
                if held.is_empty() {
                    record.by_client.remove(client);
                }
            }
            record.total -= resources;
            if record.by_client.is_empty() {
                self.agents.remove(agent);
            }
        }

        trace!(client, agent, %resources, "unallocated");
        delta
    }

    /// Replace `old` with `new` on `(client, agent)`. Returns the stripped
    /// quantities of `old` and `new`.
    pub fn update(
        &mut self,
        client: &str,
        agent: &str,
        old: &Resources,
        new: &Resources,
    ) -> (ScalarQuantities, ScalarQuantities) {
        let removed = self.unallocate(client, agent, old);
        let added = self.allocate(client, agent, new);
        (removed, added)
    }

    fn check_held(&self, client: &str, agent: &str, resources: &Resources) {
        let allocation = self.client(client);
        let held = allocation.resources.get(agent);
        let ok = match held {
            Some(held) => held.contains(resources),
            None => resources.is_empty(),
        };
        if !ok {
            fatal(SorterError::NotAllocated {
                client: client.to_string(),
                agent: agent.to_string(),
                resources: resources.clone(),
            });
        }
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Client → resources held on `agent`. Empty for unknown agents.
    pub fn agent_allocation(&self, agent: &str) -> HashMap<String, Resources> {
        self.agents
            .get(agent)
            .map(|record| record.by_client.clone())
            .unwrap_or_default()
    }

    /// Aggregate allocated on `agent` across clients.
    pub fn agent_total(&self, agent: &str) -> Resources {
        self.agents
            .get(agent)
            .map(|record| record.total.clone())
            .unwrap_or_default()
    }

    pub fn client_agent_allocation(&self, client: &str, agent: &str) -> Resources {
        self.client(client)
            .resources
            .get(agent)
            .cloned()
            .unwrap_or_default()
    }

    // ── Pool ───────────────────────────────────────────────────────

    pub fn add_to_pool(&mut self, agent: &str, resources: &Resources) {
        if resources.is_empty() {
            return;
        }
        *self.pool.entry(agent.to_string()).or_default() += resources;
        self.pool_quantities += &ScalarQuantities::from_resources(resources);
        trace!(agent, %resources, total = %self.pool_quantities, "added to pool");
    }

    pub fn remove_from_pool(&mut self, agent: &str, resources: &Resources) {
        if resources.is_empty() {
            return;
        }
        let Some(contributed) = self.pool.get_mut(agent).filter(|c| c.contains(resources)) else {
            fatal(SorterError::NotInPool {
                agent: agent.to_string(),
                resources: resources.clone(),
            });
        };
        *contributed -= resources;
        if contributed.is_empty() {
            self.pool.remove(agent);
        }
        self.pool_quantities -= &ScalarQuantities::from_resources(resources);
        trace!(agent, %resources, total = %self.pool_quantities, "removed from pool");
    }

    pub fn pool_quantities(&self) -> &ScalarQuantities {
        &self.pool_quantities
    }

    pub fn pool_resources(&self, agent: &str) -> Resources {
        self.pool.get(agent).cloned().unwrap_or_default()
    }
}
