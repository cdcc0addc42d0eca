// Random scenario generation
use super::types::*;
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

const MIN_TOTAL_UNITS: Units = 2;
const MAX_TOTAL_UNITS: Units = 5;
const MAX_UNITS_PER_PROCESS: Units = 3;
const MAX_EXTRA_NEED: Units = 2;
const CIRCULAR_WAIT_PROBABILITY: f64 = 0.7;
const CIRCULAR_WAIT_SAMPLE: usize = 3;

const CONDITIONS_EXPLANATION: &str = "Study this scenario and try to identify:

1. Mutual Exclusion: each resource unit can be used by only one process at a time
2. Hold & Wait: processes hold resources while waiting for others
3. No Preemption: resources are only released voluntarily by the process holding them
4. Circular Wait: there is a cycle of processes each waiting for a resource held by the next

If all four conditions hold, a deadlock can occur!";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Educational {
    pub explanation: String,
    pub process_descriptions: Vec<String>,
}

/// A generated allocation state plus the presentation metadata around it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    #[serde(flatten)]
    pub state: AllocationState,
    pub cores: Vec<String>,
    pub process_core_mapping: OrderedMap<String>,
    pub need: Vec<Vec<Units>>,
    pub total_resources: OrderedMap<u64>,
    /// True when max needs were raised to strengthen a circular dependency
    pub engineered_circular_wait: bool,
    pub educational: Educational,
}

/// Generates invariant-respecting allocation states from an injected RNG.
pub struct ScenarioGenerator<R> {
    rng: R,
}

impl ScenarioGenerator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> ScenarioGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn generate(
        &mut self,
        num_processes: usize,
        num_resources: usize,
        num_cores: usize,
    ) -> Result<Scenario> {
        if num_processes == 0 || num_resources == 0 || num_cores == 0 {
            return Err(Error::InvalidInput(format!(
                "processes, resources and cores must be positive (got {}, {}, {})",
                num_processes, num_resources, num_cores
            )));
        }

        let processes: Vec<String> = (1..=num_processes).map(|i| format!("P{}", i)).collect();
        let resources: Vec<String> = (1..=num_resources).map(|i| format!("R{}", i)).collect();
        let cores: Vec<String> = (1..=num_cores).map(|i| format!("Core{}", i)).collect();

        let mut pool: Vec<Units> = (0..num_resources)
            .map(|_| self.rng.gen_range(MIN_TOTAL_UNITS..=MAX_TOTAL_UNITS))
            .collect();

        let mut process_core_mapping = OrderedMap::new();
        for process in &processes {
            let core = &cores[self.rng.gen_range(0..num_cores)];
            process_core_mapping.insert(process.clone(), core.clone());
        }

        let mut allocation = Vec::with_capacity(num_processes);
        let mut max_need = Vec::with_capacity(num_processes);
        for _ in 0..num_processes {
            let mut alloc_row = Vec::with_capacity(num_resources);
            let mut max_row = Vec::with_capacity(num_resources);
            for remaining in pool.iter_mut() {
                let allocated = self.rng.gen_range(0..=(*remaining).min(MAX_UNITS_PER_PROCESS));
                let max_required = self.rng.gen_range(allocated..=allocated + MAX_EXTRA_NEED);
                *remaining -= allocated;
                alloc_row.push(allocated);
                max_row.push(max_required);
            }
            allocation.push(alloc_row);
            max_need.push(max_row);
        }

        let engineered_circular_wait = self.seed_circular_wait(&allocation, &mut max_need);

        let state = AllocationState::new(processes, resources, allocation, max_need, pool)?;
        let need = state.need_matrix();

        let mut total_resources = OrderedMap::new();
        for (resource, total) in state.resources().iter().zip(state.totals()) {
            total_resources.insert(resource.clone(), total);
        }

        let process_descriptions = (0..num_processes)
            .map(|i| describe_process(&state, &need, &process_core_mapping, i))
            .collect();

        debug!(
            processes = num_processes,
            resources = num_resources,
            cores = num_cores,
            engineered_circular_wait,
            "generated scenario"
        );

        Ok(Scenario {
            state,
            cores,
            process_core_mapping,
            need,
            total_resources,
            engineered_circular_wait,
            educational: Educational {
                explanation: CONDITIONS_EXPLANATION.to_string(),
                process_descriptions,
            },
        })
    }

    /// Raise max needs around sampled process pairs so that each holds
    /// something the next one still wants. Max needs only ever go up.
    fn seed_circular_wait(&mut self, allocation: &[Vec<Units>], max_need: &mut [Vec<Units>]) -> bool {
        if !self.rng.gen_bool(CIRCULAR_WAIT_PROBABILITY) {
            return false;
        }

        let n = allocation.len();
        let picked = sample(&mut self.rng, n, n.min(CIRCULAR_WAIT_SAMPLE)).into_vec();
        if picked.len() < 2 {
            return false;
        }

        let m = allocation[0].len();
        let mut bumped = false;
        for k in 0..picked.len() {
            let p1 = picked[k];
            let p2 = picked[(k + 1) % picked.len()];
            for r in 0..m.saturating_sub(1) {
                let p2_waits_on_p1 = allocation[p1][r] > 0 && max_need[p2][r] > allocation[p2][r];
                let p1_waits_on_p2 =
                    allocation[p2][r + 1] > 0 && max_need[p1][r + 1] > allocation[p1][r + 1];
                if p2_waits_on_p1 && p1_waits_on_p2 {
                    max_need[p1][r] += 1;
                    max_need[p2][r + 1] += 1;
                    bumped = true;
                }
            }
        }
        bumped
    }
}

fn describe_process(
    state: &AllocationState,
    need: &[Vec<Units>],
    cores: &OrderedMap<String>,
    i: usize,
) -> String {
    let process = &state.processes()[i];
    let resources = state.resources();

    let held: Vec<String> = state
        .holdings(i)
        .into_iter()
        .map(|h| format!("{} ({})", h.resource, h.amount))
        .collect();
    let needed: Vec<String> = need[i]
        .iter()
        .enumerate()
        .filter(|(_, units)| **units > 0)
        .map(|(j, units)| format!("{} ({})", resources[j], units))
        .collect();

    let core = cores.get(process).map(String::as_str).unwrap_or("unassigned core");
    let mut desc = format!("{} on {}: ", process, core);
    if held.is_empty() {
        desc.push_str("holds no resources");
    } else {
        desc.push_str(&format!("holds {}", held.join(", ")));
    }
    if !needed.is_empty() {
        desc.push_str(&format!(" and needs {}", needed.join(", ")));
    }
    desc
}
