//! Property-based tests for the deadlock engine
//!
//! Random allocation states are fed through safety analysis, cycle search and
//! recovery; the properties below must hold for every one of them.

use deadlock_sim_core::engine::{
    AllocationState, CycleFinder, RecoveryPlanner, RecoveryStep, SafetyAnalyzer,
    ScenarioGenerator, Units, WaitForGraphBuilder,
};
use proptest::prelude::*;

fn arb_state() -> impl Strategy<Value = AllocationState> {
    (1usize..7, 1usize..5).prop_flat_map(|(n, m)| {
        let rows = proptest::collection::vec(
            proptest::collection::vec((0 as Units..4, 0 as Units..3), m),
            n,
        );
        let available = proptest::collection::vec(0 as Units..3, m);
        (rows, available).prop_map(move |(rows, available)| {
            let allocation: Vec<Vec<Units>> = rows
                .iter()
                .map(|row| row.iter().map(|&(held, _)| held).collect())
                .collect();
            let max_need: Vec<Vec<Units>> = rows
                .iter()
                .map(|row| row.iter().map(|&(held, extra)| held + extra).collect())
                .collect();
            AllocationState::new(
                (1..=n).map(|i| format!("P{}", i)).collect(),
                (1..=m).map(|j| format!("R{}", j)).collect(),
                allocation,
                max_need,
                available,
            )
            .unwrap()
        })
    })
}

fn reversed(state: &AllocationState) -> AllocationState {
    let rev = |rows: &[Vec<Units>]| rows.iter().rev().cloned().collect::<Vec<_>>();
    AllocationState::new(
        state.processes().iter().rev().cloned().collect(),
        state.resources().to_vec(),
        rev(state.allocation()),
        rev(state.max_need()),
        state.available().to_vec(),
    )
    .unwrap()
}

fn column_totals(allocation: &[Vec<Units>], available: &[Units]) -> Vec<u64> {
    available
        .iter()
        .enumerate()
        .map(|(j, &free)| free as u64 + allocation.iter().map(|row| row[j] as u64).sum::<u64>())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn deadlocked_set_ignores_process_order(state in arb_state()) {
        let mut forward = SafetyAnalyzer::detect(&state).deadlocked(&state);
        let flipped = reversed(&state);
        let mut backward = SafetyAnalyzer::detect(&flipped).deadlocked(&flipped);

        forward.sort();
        backward.sort();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn safe_sequence_and_deadlocked_partition_processes(state in arb_state()) {
        let report = SafetyAnalyzer::analyze(&state);
        let sequence = report.safe_sequence(&state);
        let deadlocked = report.deadlocked(&state);

        prop_assert_eq!(sequence.len() + deadlocked.len(), state.process_count());
        prop_assert_eq!(report.trace().len(), sequence.len());
        for process in &deadlocked {
            prop_assert!(!sequence.contains(process));
        }
        prop_assert_eq!(report.is_safe(), deadlocked.is_empty());
    }

    #[test]
    fn cycles_only_contain_deadlocked_processes(state in arb_state()) {
        let report = SafetyAnalyzer::detect(&state);
        let deadlocked = report.deadlocked(&state);
        let graph = WaitForGraphBuilder::build(&state, &report);

        prop_assert_eq!(graph.len(), deadlocked.len());
        for cycle in CycleFinder::find(&graph) {
            prop_assert!(cycle.len() > 1);
            for process in &cycle.sequence {
                prop_assert!(deadlocked.contains(process));
            }
        }
    }

    #[test]
    fn recovery_conserves_units(state in arb_state()) {
        let totals = column_totals(state.allocation(), state.available());
        let deadlocked = SafetyAnalyzer::detect(&state).deadlocked(&state);
        let outcome = RecoveryPlanner::recover(&state);

        let terminations: Vec<_> = outcome
            .steps
            .iter()
            .filter_map(|step| match step {
                RecoveryStep::Recovery(t) => Some(t),
                _ => None,
            })
            .collect();

        prop_assert!(terminations.len() <= deadlocked.len());
        for step in &terminations {
            prop_assert!(deadlocked.contains(&step.process));
            prop_assert_eq!(
                column_totals(&step.modified_allocation, &step.modified_available),
                totals.clone()
            );
        }
        prop_assert_eq!(column_totals(&outcome.final_allocation, &outcome.final_available), totals);

        if deadlocked.is_empty() {
            prop_assert!(outcome.recovered);
            prop_assert!(outcome.steps.is_empty());
        }
        if outcome.recovered {
            let after = AllocationState::new(
                state.processes().to_vec(),
                state.resources().to_vec(),
                outcome.final_allocation.clone(),
                state.max_need().to_vec(),
                outcome.final_available.clone(),
            )
            .unwrap();
            prop_assert!(SafetyAnalyzer::detect(&after).is_safe());
        }
    }

    #[test]
    fn generated_scenarios_are_valid(seed in any::<u64>(), n in 1usize..8, m in 1usize..5, c in 1usize..4) {
        let scenario = ScenarioGenerator::seeded(seed).generate(n, m, c).unwrap();
        let state = &scenario.state;

        prop_assert_eq!(state.process_count(), n);
        prop_assert_eq!(state.resource_count(), m);
        prop_assert_eq!(scenario.cores.len(), c);

        let totals = column_totals(state.allocation(), state.available());
        for (j, resource) in state.resources().iter().enumerate() {
            let total = *scenario.total_resources.get(resource).unwrap();
            prop_assert_eq!(total, totals[j]);
            prop_assert!((2..=5).contains(&total));
        }
        for i in 0..n {
            for j in 0..m {
                prop_assert!(state.allocation()[i][j] <= state.max_need()[i][j]);
            }
        }
    }
}
