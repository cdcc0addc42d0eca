// Engine data model
use crate::error::{Error, Result};
use ahash::AHashSet;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Resource instance count. Matrices never hold negative values.
pub type Units = u32;

/// Process/resource allocation snapshot.
///
/// Construction validates shapes and the `allocation <= max_need` invariant,
/// so every algorithm in the engine can index freely afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAllocationState")]
pub struct AllocationState {
    processes: Vec<String>,
    resources: Vec<String>,
    allocation: Vec<Vec<Units>>,
    max_need: Vec<Vec<Units>>,
    available: Vec<Units>,
}

#[derive(Deserialize)]
struct RawAllocationState {
    processes: Vec<String>,
    resources: Vec<String>,
    allocation: Vec<Vec<Units>>,
    max_need: Vec<Vec<Units>>,
    available: Vec<Units>,
}

impl TryFrom<RawAllocationState> for AllocationState {
    type Error = Error;

    fn try_from(raw: RawAllocationState) -> Result<Self> {
        AllocationState::new(
            raw.processes,
            raw.resources,
            raw.allocation,
            raw.max_need,
            raw.available,
        )
    }
}

impl AllocationState {
    pub fn new(
        processes: Vec<String>,
        resources: Vec<String>,
        allocation: Vec<Vec<Units>>,
        max_need: Vec<Vec<Units>>,
        available: Vec<Units>,
    ) -> Result<Self> {
        let n = processes.len();
        let m = resources.len();

        check_unique("process", &processes)?;
        check_unique("resource", &resources)?;

        if allocation.len() != n {
            return Err(Error::ShapeMismatch(format!(
                "allocation has {} rows but there are {} processes",
                allocation.len(),
                n
            )));
        }
        if max_need.len() != n {
            return Err(Error::ShapeMismatch(format!(
                "max_need has {} rows but there are {} processes",
                max_need.len(),
                n
            )));
        }
        if available.len() != m {
            return Err(Error::ShapeMismatch(format!(
                "available has {} entries but there are {} resources",
                available.len(),
                m
            )));
        }

        for (i, (alloc_row, max_row)) in allocation.iter().zip(&max_need).enumerate() {
            if alloc_row.len() != m {
                return Err(Error::ShapeMismatch(format!(
                    "allocation row for {} has {} entries, expected {}",
                    processes[i],
                    alloc_row.len(),
                    m
                )));
            }
            if max_row.len() != m {
                return Err(Error::ShapeMismatch(format!(
                    "max_need row for {} has {} entries, expected {}",
                    processes[i],
                    max_row.len(),
                    m
                )));
            }
            for j in 0..m {
                if alloc_row[j] > max_row[j] {
                    return Err(Error::InvalidInput(format!(
                        "{} holds {} units of {} but its max need is {}",
                        processes[i], alloc_row[j], resources[j], max_row[j]
                    )));
                }
            }
        }

        // Work vectors are accumulated in `Units`, so no column may exceed it.
        for j in 0..m {
            let total = available[j] as u64
                + allocation.iter().map(|row| row[j] as u64).sum::<u64>();
            if total > Units::MAX as u64 {
                return Err(Error::InvalidInput(format!(
                    "{} has {} units in total, above the maximum of {}",
                    resources[j],
                    total,
                    Units::MAX
                )));
            }
        }

        Ok(Self {
            processes,
            resources,
            allocation,
            max_need,
            available,
        })
    }

    pub fn processes(&self) -> &[String] {
        &self.processes
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn allocation(&self) -> &[Vec<Units>] {
        &self.allocation
    }

    pub fn max_need(&self) -> &[Vec<Units>] {
        &self.max_need
    }

    pub fn available(&self) -> &[Units] {
        &self.available
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn process_index(&self, id: &str) -> Option<usize> {
        self.processes.iter().position(|p| p == id)
    }

    /// Outstanding units process `i` may still request of resource `j`.
    pub fn need(&self, i: usize, j: usize) -> Units {
        self.max_need[i][j] - self.allocation[i][j]
    }

    pub fn need_row(&self, i: usize) -> Vec<Units> {
        (0..self.resource_count()).map(|j| self.need(i, j)).collect()
    }

    pub fn need_matrix(&self) -> Vec<Vec<Units>> {
        (0..self.process_count()).map(|i| self.need_row(i)).collect()
    }

    /// Total units held by process `i` across all resources.
    pub fn held_total(&self, i: usize) -> u64 {
        self.allocation[i].iter().map(|&u| u as u64).sum()
    }

    pub fn max_need_total(&self, i: usize) -> u64 {
        self.max_need[i].iter().map(|&u| u as u64).sum()
    }

    /// `available[j] + sum_i allocation[i][j]` for every resource.
    pub fn totals(&self) -> Vec<u64> {
        (0..self.resource_count())
            .map(|j| {
                self.available[j] as u64
                    + self.allocation.iter().map(|row| row[j] as u64).sum::<u64>()
            })
            .collect()
    }

    /// Resources currently held by process `i`, in resource order.
    pub fn holdings(&self, i: usize) -> Vec<HoldEntry> {
        self.allocation[i]
            .iter()
            .enumerate()
            .filter(|(_, units)| **units > 0)
            .map(|(j, &units)| HoldEntry {
                resource: self.resources[j].clone(),
                amount: units,
            })
            .collect()
    }

    /// Move every unit held by process `i` back into `available`.
    pub(crate) fn release(&mut self, i: usize) -> Vec<HoldEntry> {
        let freed = self.holdings(i);
        for j in 0..self.resource_count() {
            self.available[j] += self.allocation[i][j];
            self.allocation[i][j] = 0;
        }
        freed
    }
}

fn check_unique(kind: &str, ids: &[String]) -> Result<()> {
    let mut seen = AHashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(Error::InvalidInput(format!("duplicate {} id '{}'", kind, id)));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldEntry {
    pub resource: String,
    pub amount: Units,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitEdge {
    pub from: String,
    pub to: String,
}

/// Process ids where each entry waits for the next and the last waits for the first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cycle {
    pub sequence: Vec<String>,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn contains(&self, process: &str) -> bool {
        self.sequence.iter().any(|p| p == process)
    }

    /// Render as `P1 → P2 → P1`.
    pub fn describe(&self) -> String {
        let mut parts: Vec<&str> = self.sequence.iter().map(String::as_str).collect();
        if let Some(first) = self.sequence.first() {
            parts.push(first);
        }
        parts.join(" → ")
    }
}

/// Insertion-ordered string map that serializes as a JSON object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        OrderedMap(Vec::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.0.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}
