//! Role tree aggregates.
//!
//! Arena storage keyed by path: one record for every prefix of every
//! client path, holding how many clients live at or below it and the
//! stripped quantities allocated to that whole subtree. Parents are found
//! by trimming the last path segment, so no node holds a link to another.

use std::collections::HashMap;

use fair_core::role;

use crate::quantities::ScalarQuantities;

#[derive(Debug, Default)]
struct RoleNode {
    clients: usize,
    allocation: ScalarQuantities,
}

#[derive(Debug, Default)]
pub struct RoleTree {
    nodes: HashMap<String, RoleNode>,
}

impl RoleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_client(&mut self, client: &str) {
        for path in role::prefixes(client) {
            self.nodes.entry(path.to_string()).or_default().clients += 1;
        }
    }

    /// Drop `client` and whatever it still held from every ancestor.
    /// Nodes left without clients are removed.
    pub fn remove_client(&mut self, client: &str, held: &ScalarQuantities) {
        for path in role::prefixes(client) {
            let Some(node) = self.nodes.get_mut(path) else { continue };
            node.allocation -= held;
            node.clients = node.clients.saturating_sub(1);
            if node.clients == 0 {
                self.nodes.remove(path);
            }
        }
    }

    pub fn add_allocation(&mut self, client: &str, delta: &ScalarQuantities) {
        for path in role::ancestors(client) {
            if let Some(node) = self.nodes.get_mut(path) {
                node.allocation += delta;
            }
        }
    }

    pub fn sub_allocation(&mut self, client: &str, delta: &ScalarQuantities) {
        for path in role::ancestors(client) {
            if let Some(node) = self.nodes.get_mut(path) {
                node.allocation -= delta;
            }
        }
    }

    /// Quantities allocated to the subtree at `path`.
    pub fn allocation(&self, path: &str) -> Option<&ScalarQuantities> {
        self.nodes.get(path).map(|node| &node.allocation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarQuantities)> {
        self.nodes.iter().map(|(p, n)| (p.as_str(), &n.allocation))
    }
}
