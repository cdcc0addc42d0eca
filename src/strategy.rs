//! Deadlock handling strategies
//!
//! `simulate` classifies a state; `solve` applies one of the classic
//! strategies (prevention, avoidance, detection & recovery) to it.

use crate::engine::{
    AllocationState, RecoveryOutcome, RecoveryPlanner, SafetyAnalyzer, SafetyStep, Units,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    Prevention,
    Avoidance,
    Detection,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Prevention, Strategy::Avoidance, Strategy::Detection];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Prevention => "Prevention",
            Strategy::Avoidance => "Avoidance",
            Strategy::Detection => "Detection",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Strategy::name).collect()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| Error::InvalidStrategy {
                given: s.to_string(),
                valid: Self::names(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlockStatus {
    DeadlockDetected,
    NoDeadlock,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub status: DeadlockStatus,
    pub deadlocked_processes: Vec<String>,
    pub options: Vec<&'static str>,
    pub explanation: String,
    pub hint: String,
}

/// Classify `state` as deadlocked or not.
pub fn simulate(state: &AllocationState) -> SimulationReport {
    let report = SafetyAnalyzer::detect(state);
    let deadlocked = report.deadlocked(state);

    if deadlocked.is_empty() {
        return SimulationReport {
            status: DeadlockStatus::NoDeadlock,
            deadlocked_processes: Vec::new(),
            options: Vec::new(),
            explanation: "No deadlock detected".to_string(),
            hint: "The system is running normally".to_string(),
        };
    }

    info!(deadlocked = ?deadlocked, "simulation found deadlock");
    SimulationReport {
        status: DeadlockStatus::DeadlockDetected,
        explanation: format!("Deadlock among processes: {}", deadlocked.join(", ")),
        deadlocked_processes: deadlocked,
        options: Strategy::names(),
        hint: "Try the Banker's algorithm to avoid the deadlock".to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreventionStep {
    pub process: String,
    pub action: &'static str,
    pub detail: String,
}

/// Advisory only: lists processes that would have to request everything up
/// front. The matrices are returned unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct PreventionPlan {
    pub strategy: &'static str,
    pub explanation: String,
    pub steps: Vec<PreventionStep>,
    pub modified_allocation: Vec<Vec<Units>>,
    pub modified_available: Vec<Units>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvoidancePlan {
    pub strategy: &'static str,
    pub explanation: String,
    pub steps: Vec<SafetyStep>,
    pub safe: bool,
    pub safe_sequence: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadlocked: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionPlan {
    pub strategy: &'static str,
    #[serde(flatten)]
    pub outcome: RecoveryOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SolveOutcome {
    Prevention(PreventionPlan),
    Avoidance(AvoidancePlan),
    Detection(DetectionPlan),
}

pub fn solve(state: &AllocationState, strategy: Strategy) -> SolveOutcome {
    info!(%strategy, processes = state.process_count(), resources = state.resource_count(), "solving");
    match strategy {
        Strategy::Prevention => SolveOutcome::Prevention(prevent(state)),
        Strategy::Avoidance => SolveOutcome::Avoidance(avoid(state)),
        Strategy::Detection => SolveOutcome::Detection(DetectionPlan {
            strategy: "Detection & Recovery",
            outcome: RecoveryPlanner::recover(state),
        }),
    }
}

/// `solve` with the strategy given by name.
pub fn solve_named(state: &AllocationState, strategy: &str) -> Result<SolveOutcome> {
    Ok(solve(state, strategy.parse()?))
}

fn prevent(state: &AllocationState) -> PreventionPlan {
    let report = SafetyAnalyzer::detect(state);
    let steps = report
        .deadlocked(state)
        .into_iter()
        .map(|process| PreventionStep {
            detail: format!(
                "Process {} waits until all of its resources are available at once",
                process
            ),
            process,
            action: "Prevent Hold & Wait",
        })
        .collect();

    PreventionPlan {
        strategy: "Prevention",
        explanation: "Eliminate the hold & wait condition by allocating every resource a process needs up front".to_string(),
        steps,
        modified_allocation: state.allocation().to_vec(),
        modified_available: state.available().to_vec(),
    }
}

fn avoid(state: &AllocationState) -> AvoidancePlan {
    let report = SafetyAnalyzer::analyze(state);
    let safe = report.is_safe();
    let safe_sequence = report.safe_sequence(state);
    let base = "Use the Banker's algorithm to decide whether the state is safe";

    if safe {
        return AvoidancePlan {
            strategy: "Avoidance (Banker's Algorithm)",
            explanation: format!("{}. Safe sequence found: {}", base, safe_sequence.join(" → ")),
            steps: report.into_trace(),
            safe,
            safe_sequence,
            deadlocked: None,
        };
    }

    let deadlocked = report.deadlocked(state);
    AvoidancePlan {
        strategy: "Avoidance (Banker's Algorithm)",
        explanation: format!("{}. No safe sequence exists; the system is in an unsafe state.", base),
        steps: report.into_trace(),
        safe,
        safe_sequence,
        deadlocked: Some(deadlocked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_a() -> AllocationState {
        AllocationState::new(
            vec!["P1".into(), "P2".into()],
            vec!["R1".into()],
            vec![vec![1], vec![0]],
            vec![vec![1], vec![1]],
            vec![0],
        )
        .unwrap()
    }

    fn scenario_b() -> AllocationState {
        AllocationState::new(
            vec!["P1".into(), "P2".into()],
            vec!["R1".into(), "R2".into()],
            vec![vec![1, 0], vec![0, 1]],
            vec![vec![1, 1], vec![1, 1]],
            vec![0, 0],
        )
        .unwrap()
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Avoidance".parse::<Strategy>().unwrap(), Strategy::Avoidance);
        match "Ostrich".parse::<Strategy>() {
            Err(Error::InvalidStrategy { given, valid }) => {
                assert_eq!(given, "Ostrich");
                assert_eq!(valid, vec!["Prevention", "Avoidance", "Detection"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_simulate_no_deadlock() {
        let report = simulate(&scenario_a());
        assert_eq!(report.status, DeadlockStatus::NoDeadlock);
        assert!(report.deadlocked_processes.is_empty());
        assert!(report.options.is_empty());
    }

    #[test]
    fn test_simulate_deadlock() {
        let report = simulate(&scenario_b());
        assert_eq!(report.status, DeadlockStatus::DeadlockDetected);
        assert_eq!(report.deadlocked_processes, vec!["P1", "P2"]);
        assert_eq!(report.options, Strategy::names());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "deadlock_detected");
    }

    #[test]
    fn test_avoidance_safe() {
        match solve(&scenario_a(), Strategy::Avoidance) {
            SolveOutcome::Avoidance(plan) => {
                assert!(plan.safe);
                assert_eq!(plan.safe_sequence, vec!["P1", "P2"]);
                assert_eq!(plan.steps.len(), 2);
                assert!(plan.deadlocked.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_avoidance_unsafe() {
        match solve(&scenario_b(), Strategy::Avoidance) {
            SolveOutcome::Avoidance(plan) => {
                assert!(!plan.safe);
                assert_eq!(plan.deadlocked, Some(vec!["P1".to_string(), "P2".to_string()]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_prevention_is_advisory() {
        let state = scenario_b();
        match solve(&state, Strategy::Prevention) {
            SolveOutcome::Prevention(plan) => {
                assert_eq!(plan.steps.len(), 2);
                assert_eq!(plan.steps[0].process, "P1");
                assert_eq!(plan.modified_allocation, state.allocation());
                assert_eq!(plan.modified_available, state.available());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_detection_recovers() {
        let outcome = solve_named(&scenario_b(), "Detection").unwrap();
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["strategy"], "Detection & Recovery");
        assert_eq!(json["recovered"], true);
        assert_eq!(json["final_available"], serde_json::json!([1, 0]));
    }

    #[test]
    fn test_unknown_strategy() {
        assert!(matches!(
            solve_named(&scenario_a(), "Detection & Recovery"),
            Err(Error::InvalidStrategy { .. })
        ));
    }
}
