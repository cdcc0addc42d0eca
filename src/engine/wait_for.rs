// Wait-for graph over deadlocked processes
use super::safety::SafetyReport;
use super::types::*;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A deadlocked process with what it holds and whom it waits for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    #[serde(skip)]
    pub process: String,
    #[serde(skip)]
    pub index: usize,
    pub holds: Vec<HoldEntry>,
    pub waits_for: Vec<String>,
    #[serde(skip)]
    pub(crate) waits_for_index: Vec<usize>,
}

/// Directed waits-for graph restricted to deadlocked processes.
///
/// Serializes as `{ process: { holds, waits_for } }` in process order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitForGraph {
    nodes: Vec<DependencyNode>,
}

impl WaitForGraph {
    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    pub fn node(&self, process: &str) -> Option<&DependencyNode> {
        self.nodes.iter().find(|n| n.process == process)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges(&self) -> Vec<WaitEdge> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.waits_for.iter().map(move |to| WaitEdge {
                    from: node.process.clone(),
                    to: to.clone(),
                })
            })
            .collect()
    }
}

impl Serialize for WaitForGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for node in &self.nodes {
            map.serialize_entry(&node.process, node)?;
        }
        map.end()
    }
}

/// Per deadlocked process: what it still needs, what it holds, and who blocks it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRelation {
    pub needs: OrderedMap<Units>,
    pub holds: OrderedMap<Units>,
    pub waits_for_resources: Vec<String>,
    pub blocks: Vec<String>,
}

pub struct WaitForGraphBuilder;

impl WaitForGraphBuilder {
    pub fn build(state: &AllocationState, report: &SafetyReport) -> WaitForGraph {
        Self::from_deadlocked(state, &report.deadlocked_indices())
    }

    /// Edge i -> j when j holds a unit of anything i still needs.
    /// Self-edges are excluded and both ends must be deadlocked.
    pub fn from_deadlocked(state: &AllocationState, deadlocked: &[usize]) -> WaitForGraph {
        let m = state.resource_count();
        let allocation = state.allocation();

        let nodes = deadlocked
            .iter()
            .map(|&i| {
                let waits_for_index: Vec<usize> = deadlocked
                    .iter()
                    .copied()
                    .filter(|&j| j != i)
                    .filter(|&j| (0..m).any(|k| state.need(i, k) > 0 && allocation[j][k] > 0))
                    .collect();

                DependencyNode {
                    process: state.processes()[i].clone(),
                    index: i,
                    holds: state.holdings(i),
                    waits_for: waits_for_index
                        .iter()
                        .map(|&j| state.processes()[j].clone())
                        .collect(),
                    waits_for_index,
                }
            })
            .collect();

        WaitForGraph { nodes }
    }

    pub fn relations(state: &AllocationState, deadlocked: &[usize]) -> OrderedMap<ResourceRelation> {
        let m = state.resource_count();
        let resources = state.resources();
        let allocation = state.allocation();
        let mut relations = OrderedMap::new();

        for &i in deadlocked {
            let mut needs = OrderedMap::new();
            let mut holds = OrderedMap::new();
            for j in 0..m {
                if state.need(i, j) > 0 {
                    needs.insert(resources[j].clone(), state.need(i, j));
                }
                if allocation[i][j] > 0 {
                    holds.insert(resources[j].clone(), allocation[i][j]);
                }
            }

            let mut waits_for_resources: Vec<String> = Vec::new();
            let mut blocks: Vec<String> = Vec::new();
            for j in (0..m).filter(|&j| state.need(i, j) > 0) {
                for &other in deadlocked.iter().filter(|&&other| other != i) {
                    if allocation[other][j] == 0 {
                        continue;
                    }
                    if !waits_for_resources.contains(&resources[j]) {
                        waits_for_resources.push(resources[j].clone());
                    }
                    let blocker = &state.processes()[other];
                    if !blocks.contains(blocker) {
                        blocks.push(blocker.clone());
                    }
                }
            }

            relations.insert(
                state.processes()[i].clone(),
                ResourceRelation {
                    needs,
                    holds,
                    waits_for_resources,
                    blocks,
                },
            );
        }

        relations
    }
}
