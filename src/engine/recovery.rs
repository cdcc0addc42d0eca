// Deadlock recovery by process termination
use super::cycles::CycleFinder;
use super::safety::SafetyAnalyzer;
use super::types::*;
use super::wait_for::{ResourceRelation, WaitForGraph, WaitForGraphBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

const HELD_WEIGHT: f64 = 0.7;
const FULFILLMENT_WEIGHT: f64 = 0.3;

/// Termination priority of a deadlocked process. Lower scores are terminated first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityScore {
    pub process: String,
    #[serde(skip)]
    pub index: usize,
    pub score: f64,
}

/// Deadlocked set with its explanation graph and cycles.
#[derive(Debug, Clone, Serialize)]
pub struct DeadlockSnapshot {
    pub deadlocked: Vec<String>,
    pub dependencies: WaitForGraph,
    pub cycles: Vec<Cycle>,
    #[serde(skip)]
    pub(crate) deadlocked_index: Vec<usize>,
}

impl DeadlockSnapshot {
    /// SafetyAnalyzer + WaitForGraphBuilder + CycleFinder over `state`.
    pub fn capture(state: &AllocationState) -> Self {
        let report = SafetyAnalyzer::detect(state);
        let dependencies = WaitForGraphBuilder::build(state, &report);
        let cycles = CycleFinder::find(&dependencies);
        Self {
            deadlocked: report.deadlocked(state),
            deadlocked_index: report.deadlocked_indices(),
            dependencies,
            cycles,
        }
    }

    pub fn is_deadlocked(&self) -> bool {
        !self.deadlocked.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionStep {
    pub description: String,
    pub deadlocked: Vec<String>,
    pub dependencies: WaitForGraph,
    pub circular_waits: Vec<Cycle>,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminationStep {
    pub process: String,
    pub action: &'static str,
    pub priority_score: f64,
    pub resources_freed: Vec<HoldEntry>,
    pub detail: String,
    pub modified_allocation: Vec<Vec<Units>>,
    pub modified_available: Vec<Units>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_deadlock: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_dependencies: Option<WaitForGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_cycles: Option<Vec<Cycle>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContinueStep {
    pub process: String,
    pub action: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecoveryStep {
    Detection(DetectionStep),
    Recovery(TerminationStep),
    Continue(ContinueStep),
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryOutcome {
    pub recovered: bool,
    pub explanation: String,
    pub deadlocked: Vec<String>,
    pub deadlock_dependencies: WaitForGraph,
    pub circular_waits: Vec<Cycle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_relations: Option<OrderedMap<ResourceRelation>>,
    pub steps: Vec<RecoveryStep>,
    pub final_allocation: Vec<Vec<Units>>,
    pub final_available: Vec<Units>,
}

impl RecoveryOutcome {
    pub fn terminated(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                RecoveryStep::Recovery(t) => Some(t.process.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// `0.7 * held + 0.3 * fulfillment%`, sorted ascending. Ties keep process order.
pub fn termination_priority(state: &AllocationState, deadlocked: &[usize]) -> Vec<PriorityScore> {
    let mut scores: Vec<PriorityScore> = deadlocked
        .iter()
        .map(|&i| {
            let held = state.held_total(i) as f64;
            let need_total = state.max_need_total(i);
            let fulfillment = if need_total == 0 {
                100.0
            } else {
                held / need_total as f64 * 100.0
            };
            PriorityScore {
                process: state.processes()[i].clone(),
                index: i,
                score: HELD_WEIGHT * held + FULFILLMENT_WEIGHT * fulfillment,
            }
        })
        .collect();

    scores.sort_by(|a, b| a.score.total_cmp(&b.score));
    scores
}

pub struct RecoveryPlanner;

impl RecoveryPlanner {
    /// Terminate victims by priority until the deadlock clears.
    ///
    /// Works on a clone of `state`; the caller's state is untouched. Every
    /// termination only moves units from allocation to available, so per-resource
    /// totals are conserved. At most one termination per deadlocked process,
    /// O(n * n^2 * m) overall.
    pub fn recover(state: &AllocationState) -> RecoveryOutcome {
        let initial = DeadlockSnapshot::capture(state);

        if !initial.is_deadlocked() {
            return RecoveryOutcome {
                recovered: true,
                explanation: "No deadlock detected".to_string(),
                deadlocked: Vec::new(),
                deadlock_dependencies: initial.dependencies,
                circular_waits: initial.cycles,
                resource_relations: None,
                steps: Vec::new(),
                final_allocation: state.allocation().to_vec(),
                final_available: state.available().to_vec(),
            };
        }

        info!(deadlocked = ?initial.deadlocked, cycles = initial.cycles.len(), "deadlock detected");

        let mut steps = vec![RecoveryStep::Detection(DetectionStep {
            description: format!(
                "Deadlock detected among processes: {}",
                initial.deadlocked.join(", ")
            ),
            deadlocked: initial.deadlocked.clone(),
            dependencies: initial.dependencies.clone(),
            circular_waits: initial.cycles.clone(),
            detail: describe_cycles(&initial.cycles),
        })];

        let relations = WaitForGraphBuilder::relations(state, &initial.deadlocked_index);
        let victims = termination_priority(state, &initial.deadlocked_index);
        let mut working = state.clone();
        let mut terminated: Vec<usize> = Vec::new();
        let mut recovered = false;

        for victim in victims {
            let resources_freed = working.release(victim.index);
            terminated.push(victim.index);
            let remaining = DeadlockSnapshot::capture(&working);

            debug!(
                process = %victim.process,
                score = victim.score,
                remaining = remaining.deadlocked.len(),
                "terminated victim"
            );

            let mut step = TerminationStep {
                process: victim.process.clone(),
                action: "Terminate",
                priority_score: victim.score,
                resources_freed,
                detail: format!("Terminate process {} and release its resources", victim.process),
                modified_allocation: working.allocation().to_vec(),
                modified_available: working.available().to_vec(),
                remaining_deadlock: None,
                remaining_dependencies: None,
                remaining_cycles: None,
            };

            if remaining.is_deadlocked() {
                step.remaining_deadlock = Some(remaining.deadlocked);
                step.remaining_dependencies = Some(remaining.dependencies);
                step.remaining_cycles = Some(remaining.cycles);
                steps.push(RecoveryStep::Recovery(step));
                continue;
            }

            step.detail.push_str(". Deadlock resolved!");
            steps.push(RecoveryStep::Recovery(step));
            for &i in initial.deadlocked_index.iter().filter(|i| !terminated.contains(*i)) {
                let process = state.processes()[i].clone();
                steps.push(RecoveryStep::Continue(ContinueStep {
                    detail: format!("Process {} can continue execution", process),
                    process,
                    action: "Continue",
                }));
            }
            recovered = true;
            break;
        }

        let terminated_names: Vec<&str> = terminated
            .iter()
            .map(|&i| state.processes()[i].as_str())
            .collect();
        let explanation = if recovered {
            format!(
                "Detected the deadlock and recovered by terminating: {}",
                terminated_names.join(", ")
            )
        } else {
            warn!(terminated = ?terminated_names, "deadlock persists after terminating every deadlocked process");
            "Detected the deadlock, but it persists even after terminating every deadlocked process"
                .to_string()
        };

        RecoveryOutcome {
            recovered,
            explanation,
            deadlocked: initial.deadlocked,
            deadlock_dependencies: initial.dependencies,
            circular_waits: initial.cycles,
            resource_relations: Some(relations),
            steps,
            final_allocation: working.allocation().to_vec(),
            final_available: working.available().to_vec(),
        }
    }
}

fn describe_cycles(cycles: &[Cycle]) -> String {
    if cycles.is_empty() {
        return "No direct circular wait was found in the wait-for graph, but no deadlocked process can finish with the available resources".to_string();
    }
    let listed: Vec<String> = cycles
        .iter()
        .enumerate()
        .map(|(i, cycle)| format!("{}. {}", i + 1, cycle.describe()))
        .collect();
    format!("Resource allocation graph shows circular wait: {}", listed.join(", "))
}
