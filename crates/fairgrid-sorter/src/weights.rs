//! Role path weights.
//!
//! Explicit weights are stored per path. A client's effective weight is
//! the weight of the most specific ancestor-or-self path with an explicit
//! entry, or [`DEFAULT_WEIGHT`]. Effective weights of known clients are
//! cached; setting a weight drops the cached value of every client at or
//! below the updated path.

use std::collections::HashMap;

use fair_core::role;
use tracing::debug;

pub const DEFAULT_WEIGHT: f64 = 1.0;

#[derive(Debug, Default)]
pub struct WeightTree {
    explicit: HashMap<String, f64>,
    // client path → effective weight, `None` once invalidated.
    cache: HashMap<String, Option<f64>>,
}

impl WeightTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or overwrite the weight at `path`. Entries are never removed.
    pub fn set(&mut self, path: &str, weight: f64) {
        self.explicit.insert(path.to_string(), weight);

        let mut invalidated = 0usize;
        for (client, cached) in self.cache.iter_mut() {
            if role::is_at_or_below(client, path) {
                *cached = None;
                invalidated += 1;
            }
        }
        debug!(path, weight, invalidated, "role weight updated");
    }

    /// Effective weight of `path`, walking toward the root.
    pub fn lookup(&self, path: &str) -> f64 {
        role::ancestors(path)
            .find_map(|p| self.explicit.get(p).copied())
            .unwrap_or(DEFAULT_WEIGHT)
    }

    /// Start caching the effective weight of `client`.
    pub fn track(&mut self, client: &str) {
        self.cache.entry(client.to_string()).or_insert(None);
    }

    pub fn untrack(&mut self, client: &str) {
        self.cache.remove(client);
    }

    /// Effective weight of a tracked client, filling the cache on a miss.
    /// Untracked paths fall back to an uncached lookup.
    pub fn client_weight(&mut self, client: &str) -> f64 {
        if let Some(Some(weight)) = self.cache.get(client) {
            return *weight;
        }
        let weight = self.lookup(client);
        if let Some(slot) = self.cache.get_mut(client) {
            *slot = Some(weight);
        }
        weight
    }

    #[cfg(test)]
    fn is_cached(&self, client: &str) -> bool {
        matches!(self.cache.get(client), Some(Some(_)))
    }
}
