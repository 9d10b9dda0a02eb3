//! Allocation scenarios.
//!
//! A scenario describes a cluster snapshot: sorter settings, the agents
//! contributing to the pool, the clients, and the allocations already
//! granted. Replaying it yields the order the sorter would offer in.
//!
//! ```toml
//! [sorter]
//! kind = "hierarchical"
//!
//! [[agents]]
//! id = "agent-1"
//! resources = "cpus:10; mem:10"
//!
//! [[clients]]
//! name = "eng/web"
//!
//! [[allocations]]
//! client = "eng/web"
//! agent = "agent-1"
//! resources = "cpus:8"
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, bail};
use fair_core::{Resources, SorterConfig, SorterKind, role};
use fairgrid_sorter::{Sorter, build_sorter};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub sorter: SorterConfig,
    pub agents: Vec<AgentSpec>,
    pub clients: Vec<ClientSpec>,
    pub allocations: Vec<AllocationSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    pub id: String,
    pub resources: Resources,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSpec {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationSpec {
    pub client: String,
    pub agent: String,
    pub resources: Resources,
}

/// Result of replaying a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct SortReport {
    pub kind: SorterKind,
    pub total: String,
    /// Active clients, in offer order.
    pub order: Vec<ClientShare>,
    pub inactive: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientShare {
    pub client: String,
    pub share: f64,
    pub weight: f64,
    pub allocated: String,
}

impl Scenario {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = toml::from_str(content).context("failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reject input the sorter would treat as a contract violation.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.sorter.validate()?;

        let mut clients = HashSet::new();
        for client in &self.clients {
            role::validate(&client.name)
                .with_context(|| format!("invalid client name '{}'", client.name))?;
            if !clients.insert(client.name.as_str()) {
                bail!("client '{}' declared twice", client.name);
            }
        }

        for allocation in &self.allocations {
            if !clients.contains(allocation.client.as_str()) {
                bail!(
                    "allocation on agent '{}' references undeclared client '{}'",
                    allocation.agent,
                    allocation.client
                );
            }
        }
        Ok(())
    }

    /// Build a sorter and apply agents, clients and allocations in order.
    pub fn replay(&self) -> anyhow::Result<Box<dyn Sorter>> {
        let mut sorter = build_sorter(&self.sorter)?;

        for agent in &self.agents {
            sorter.add_agent(&agent.id, &agent.resources);
        }
        for client in &self.clients {
            sorter.add(&client.name);
            if client.active {
                sorter.activate(&client.name);
            }
        }
        for allocation in &self.allocations {
            sorter.allocated(&allocation.client, &allocation.agent, &allocation.resources);
        }

        debug!(
            agents = self.agents.len(),
            clients = self.clients.len(),
            allocations = self.allocations.len(),
            "scenario replayed"
        );
        Ok(sorter)
    }

    pub fn report(&self) -> anyhow::Result<SortReport> {
        let mut sorter = self.replay()?;
        let order = sorter.sort();

        let entries = order
            .iter()
            .map(|client| ClientShare {
                client: client.clone(),
                share: sorter.share(client),
                weight: sorter.weight(client),
                allocated: sorter.allocation_scalar_quantities(client).to_string(),
            })
            .collect();

        let inactive = self
            .clients
            .iter()
            .filter(|c| !c.active)
            .map(|c| c.name.clone())
            .collect();

        Ok(SortReport {
            kind: self.sorter.kind,
            total: sorter.total_scalar_quantities().to_string(),
            order: entries,
            inactive,
        })
    }
}

pub fn format_report(report: &SortReport) -> String {
    let mut out = format!("sorter: {:?}\npool:   {}\n\n", report.kind, report.total);
    if report.order.is_empty() {
        out.push_str("no active clients\n");
    }
    for (rank, entry) in report.order.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. {:<24} share {:.4}  weight {:<6} {}\n",
            rank + 1,
            entry.client,
            entry.share,
            entry.weight,
            entry.allocated,
        ));
    }
    if !report.inactive.is_empty() {
        out.push_str(&format!("\ninactive: {}\n", report.inactive.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FRAMEWORKS: &str = r#"
[sorter]
kind = "flat"

[[agents]]
id = "agent-1"
resources = "cpus:10; mem:10"

[[clients]]
name = "X"

[[clients]]
name = "Y"

[[clients]]
name = "idle"
active = false

[[allocations]]
client = "X"
agent = "agent-1"
resources = "cpus:8"

[[allocations]]
client = "Y"
agent = "agent-1"
resources = "mem:2"
"#;

    #[test]
    fn report_orders_by_share() {
        let scenario = Scenario::from_toml_str(TWO_FRAMEWORKS).unwrap();
        let report = scenario.report().unwrap();

        let order: Vec<&str> = report.order.iter().map(|e| e.client.as_str()).collect();
        assert_eq!(order, vec!["Y", "X"]);
        assert_eq!(report.order[0].share, 0.2);
        assert_eq!(report.order[1].share, 0.8);
        assert_eq!(report.inactive, vec!["idle"]);
        assert_eq!(report.kind, SorterKind::Flat);
        assert_eq!(report.total, "{cpus:10, mem:10}");
    }

    #[test]
    fn configured_weights_apply() {
        let content = TWO_FRAMEWORKS.replace(
            "kind = \"flat\"",
            "kind = \"flat\"\n\n[sorter.weights]\nX = 8.0",
        );
        let report = Scenario::from_toml_str(&content).unwrap().report().unwrap();
        assert_eq!(report.order[0].client, "X");
        assert_eq!(report.order[0].weight, 8.0);
        assert_eq!(report.order[0].share, 0.1);
    }

    #[test]
    fn empty_scenario_has_no_order() {
        let report = Scenario::from_toml_str("").unwrap().report().unwrap();
        assert!(report.order.is_empty());
        assert_eq!(report.kind, SorterKind::Hierarchical);
        assert!(format_report(&report).contains("no active clients"));
    }

    #[test]
    fn rejects_undeclared_client() {
        let content = TWO_FRAMEWORKS.replace("client = \"Y\"", "client = \"Z\"");
        let err = Scenario::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("undeclared client 'Z'"));
    }

    #[test]
    fn rejects_duplicate_client() {
        let content = format!("{TWO_FRAMEWORKS}\n[[clients]]\nname = \"X\"\n");
        let err = Scenario::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn rejects_malformed_resources() {
        let content = TWO_FRAMEWORKS.replace("cpus:8", "cpus:eight");
        assert!(Scenario::from_toml_str(&content).is_err());
    }

    #[test]
    fn demo_scenario_replays() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../demos/scenarios/shared-cluster.toml");
        let report = Scenario::from_file(&path).unwrap().report().unwrap();

        let order: Vec<&str> = report.order.iter().map(|e| e.client.as_str()).collect();
        assert_eq!(order, vec!["analytics", "eng/web", "eng/batch"]);
        assert_eq!(report.order[1].weight, 2.0);
        assert_eq!(report.order[2].weight, 0.5);
        assert_eq!(report.inactive, vec!["ops/backup"]);
    }

    #[test]
    fn text_report_lists_ranks() {
        let report = Scenario::from_toml_str(TWO_FRAMEWORKS).unwrap().report().unwrap();
        let text = format_report(&report);
        assert!(text.contains("  1. Y"));
        assert!(text.contains("  2. X"));
        assert!(text.contains("inactive: idle"));
    }
}
