// Single-grant compatibility checking
use super::types::Cycle;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub allocation: Vec<String>,
}

/// Single-instance resource, owned by at most one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub held_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompatibilityReason {
    NotFound,
    ResourceAllocated,
    NotNeeded,
    AlreadyAllocated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityWarning {
    PotentialDeadlock,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatibilityDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_by: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Cycle>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycle_chains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibilityReport {
    pub compatible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IncompatibilityReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<CompatibilityWarning>,
    pub educational_feedback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CompatibilityDetails>,
}

impl CompatibilityReport {
    fn rejected(reason: IncompatibilityReason, feedback: String) -> Self {
        Self {
            compatible: false,
            reason: Some(reason),
            warning: None,
            educational_feedback: feedback,
            details: None,
        }
    }
}

pub struct CompatibilityChecker;

impl CompatibilityChecker {
    /// Validate granting `resource_id` to `process_id`.
    ///
    /// Checks run in order and the first failure wins. A grant that would close
    /// a circular wait is still reported compatible, with a warning.
    pub fn check(
        process_id: &str,
        resource_id: &str,
        processes: &[ProcessRecord],
        resources: &[ResourceRecord],
    ) -> CompatibilityReport {
        let process = processes.iter().find(|p| p.id == process_id);
        let resource = resources.iter().find(|r| r.id == resource_id);

        let (Some(process), Some(resource)) = (process, resource) else {
            return CompatibilityReport::rejected(
                IncompatibilityReason::NotFound,
                format!("Process '{}' or resource '{}' does not exist", process_id, resource_id),
            );
        };

        if let Some(holder) = &resource.held_by {
            let mut report = CompatibilityReport::rejected(
                IncompatibilityReason::ResourceAllocated,
                format!(
                    "Mutual exclusion: {} is already held by {}. A resource instance can serve only one process at a time.",
                    label(&resource.name, &resource.id),
                    holder
                ),
            );
            report.details = Some(CompatibilityDetails {
                held_by: Some(holder.clone()),
                ..Default::default()
            });
            return report;
        }

        if !process.needs.iter().any(|r| r == resource_id) {
            return CompatibilityReport::rejected(
                IncompatibilityReason::NotNeeded,
                format!(
                    "{} does not need {}. Granting unneeded resources only increases contention.",
                    label(&process.name, &process.id),
                    label(&resource.name, &resource.id)
                ),
            );
        }

        if process.allocation.iter().any(|r| r == resource_id) {
            return CompatibilityReport::rejected(
                IncompatibilityReason::AlreadyAllocated,
                format!(
                    "{} already holds {}",
                    label(&process.name, &process.id),
                    label(&resource.name, &resource.id)
                ),
            );
        }

        let mut processes = processes.to_vec();
        let mut resources = resources.to_vec();
        if let Some(p) = processes.iter_mut().find(|p| p.id == process_id) {
            p.allocation.push(resource_id.to_string());
        }
        if let Some(r) = resources.iter_mut().find(|r| r.id == resource_id) {
            r.held_by = Some(process_id.to_string());
        }

        let cycles = probe_cycles(&processes, &resources);
        debug!(process = process_id, resource = resource_id, cycles = cycles.len(), "grant simulated");

        if cycles.is_empty() {
            return CompatibilityReport {
                compatible: true,
                reason: None,
                warning: None,
                educational_feedback: format!(
                    "{} can be granted to {} without creating a circular wait",
                    label(&resource.name, &resource.id),
                    label(&process.name, &process.id)
                ),
                details: None,
            };
        }

        let cycle_chains: Vec<String> = cycles.iter().map(|c| chain(c, &processes)).collect();
        warn!(process = process_id, resource = resource_id, chains = ?cycle_chains, "grant creates circular wait");

        CompatibilityReport {
            compatible: true,
            reason: None,
            warning: Some(CompatibilityWarning::PotentialDeadlock),
            educational_feedback: format!(
                "Granting {} to {} creates a circular wait: hold & wait plus circular wait means these processes can deadlock",
                label(&resource.name, &resource.id),
                label(&process.name, &process.id)
            ),
            details: Some(CompatibilityDetails {
                held_by: None,
                cycles,
                cycle_chains,
            }),
        }
    }
}

fn label(name: &str, id: &str) -> String {
    if name.is_empty() {
        id.to_string()
    } else {
        format!("{} ({})", name, id)
    }
}

fn chain(cycle: &Cycle, processes: &[ProcessRecord]) -> String {
    let describe = |id: &String| {
        processes
            .iter()
            .find(|p| &p.id == id)
            .map(|p| label(&p.name, &p.id))
            .unwrap_or_else(|| id.clone())
    };
    let mut parts: Vec<String> = cycle.sequence.iter().map(describe).collect();
    if let Some(first) = cycle.sequence.first() {
        parts.push(describe(first));
    }
    parts.join(" → ")
}

/// Edge p -> q for every resource p needs but lacks that q holds.
fn dependency_edges<'a>(
    processes: &'a [ProcessRecord],
    resources: &'a [ResourceRecord],
) -> Vec<(&'a str, Vec<&'a str>)> {
    let holders: AHashMap<&str, &str> = resources
        .iter()
        .filter_map(|r| r.held_by.as_deref().map(|h| (r.id.as_str(), h)))
        .collect();

    processes
        .iter()
        .map(|p| {
            let mut targets: Vec<&str> = Vec::new();
            for needed in p.needs.iter().filter(|r| !p.allocation.contains(*r)) {
                if let Some(&holder) = holders.get(needed.as_str()) {
                    if holder != p.id && !targets.contains(&holder) {
                        targets.push(holder);
                    }
                }
            }
            (p.id.as_str(), targets)
        })
        .collect()
}

/// DFS with an on-path set over the record-level dependency edges.
fn probe_cycles(processes: &[ProcessRecord], resources: &[ResourceRecord]) -> Vec<Cycle> {
    let edges = dependency_edges(processes, resources);
    let adjacency: AHashMap<&str, &[&str]> =
        edges.iter().map(|(from, to)| (*from, to.as_slice())).collect();

    let mut visited: AHashSet<&str> = AHashSet::new();
    let mut on_path: AHashSet<&str> = AHashSet::new();
    let mut cycles: Vec<Cycle> = Vec::new();

    for &(root, _) in &edges {
        if visited.contains(root) {
            continue;
        }
        visited.insert(root);
        on_path.insert(root);
        let mut path: Vec<(&str, usize)> = vec![(root, 0)];

        while let Some((node, next_edge)) = path.last_mut() {
            let node: &str = *node;
            let neighbors = adjacency.get(node).copied().unwrap_or(&[]);
            let Some(&next) = neighbors.get(*next_edge) else {
                on_path.remove(node);
                path.pop();
                continue;
            };
            *next_edge += 1;

            if on_path.contains(next) {
                let start = path.iter().position(|(n, _)| *n == next).unwrap_or(0);
                let cycle = Cycle {
                    sequence: path[start..].iter().map(|(n, _)| n.to_string()).collect(),
                };
                if !cycles.contains(&cycle) {
                    cycles.push(cycle);
                }
            } else if visited.insert(next) {
                on_path.insert(next);
                path.push((next, 0));
            }
        }
    }

    cycles
}
