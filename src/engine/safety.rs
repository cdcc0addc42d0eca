// Safety analysis (generalized Banker's algorithm)
use super::types::*;
use serde::Serialize;
use tracing::debug;

/// One process found finishable during a safety pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyStep {
    /// 1-based position in the discovery order
    pub step: usize,
    pub process: String,
    pub need: Vec<Units>,
    pub work_before: Vec<Units>,
    pub work_after: Vec<Units>,
}

#[derive(Debug, Clone)]
pub struct SafetyReport {
    finished: Vec<bool>,
    order: Vec<usize>,
    trace: Vec<SafetyStep>,
}

impl SafetyReport {
    /// True when every process can run to completion.
    pub fn is_safe(&self) -> bool {
        self.finished.iter().all(|&f| f)
    }

    pub fn is_finished(&self, i: usize) -> bool {
        self.finished[i]
    }

    /// Indices of finishable processes in discovery order.
    pub fn finish_order(&self) -> &[usize] {
        &self.order
    }

    /// Indices of processes that could not finish, in process order.
    pub fn deadlocked_indices(&self) -> Vec<usize> {
        self.finished
            .iter()
            .enumerate()
            .filter(|(_, finished)| !**finished)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn deadlocked(&self, state: &AllocationState) -> Vec<String> {
        self.deadlocked_indices()
            .into_iter()
            .map(|i| state.processes()[i].clone())
            .collect()
    }

    /// Finishing order; a complete safe sequence only when `is_safe()`.
    pub fn safe_sequence(&self, state: &AllocationState) -> Vec<String> {
        self.order
            .iter()
            .map(|&i| state.processes()[i].clone())
            .collect()
    }

    /// Per-step detail, empty unless the analysis was traced.
    pub fn trace(&self) -> &[SafetyStep] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<SafetyStep> {
        self.trace
    }
}

pub struct SafetyAnalyzer;

impl SafetyAnalyzer {
    /// Full safety check, recording a step per finishable process.
    pub fn analyze(state: &AllocationState) -> SafetyReport {
        Self::run(state, true)
    }

    /// Detection only: same fixed point, no trace.
    pub fn detect(state: &AllocationState) -> SafetyReport {
        Self::run(state, false)
    }

    // Passes always scan by index so the discovery order is reproducible.
    // O(n^2 * m) worst case.
    fn run(state: &AllocationState, record_trace: bool) -> SafetyReport {
        let n = state.process_count();
        let m = state.resource_count();
        let mut work = state.available().to_vec();
        let mut finished = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut trace = Vec::new();

        loop {
            let mut progressed = false;

            for i in 0..n {
                if finished[i] {
                    continue;
                }
                if !(0..m).all(|j| state.need(i, j) <= work[j]) {
                    continue;
                }

                let work_before = if record_trace { work.clone() } else { Vec::new() };
                for (slot, &held) in work.iter_mut().zip(&state.allocation()[i]) {
                    *slot += held;
                }
                finished[i] = true;
                order.push(i);
                progressed = true;

                if record_trace {
                    trace.push(SafetyStep {
                        step: trace.len() + 1,
                        process: state.processes()[i].clone(),
                        need: state.need_row(i),
                        work_before,
                        work_after: work.clone(),
                    });
                }
            }

            if !progressed {
                break;
            }
        }

        debug!(
            finished = order.len(),
            total = n,
            "safety analysis reached fixed point"
        );

        SafetyReport {
            finished,
            order,
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(
        processes: &[&str],
        resources: &[&str],
        allocation: Vec<Vec<Units>>,
        max_need: Vec<Vec<Units>>,
        available: Vec<Units>,
    ) -> AllocationState {
        AllocationState::new(
            processes.iter().map(|s| s.to_string()).collect(),
            resources.iter().map(|s| s.to_string()).collect(),
            allocation,
            max_need,
            available,
        )
        .unwrap()
    }

    #[test]
    fn test_safe_two_process_state() {
        let s = state(&["P1", "P2"], &["R1"], vec![vec![1], vec![0]], vec![vec![1], vec![1]], vec![0]);
        let report = SafetyAnalyzer::analyze(&s);

        assert!(report.is_safe());
        assert!(report.deadlocked(&s).is_empty());
        assert_eq!(report.safe_sequence(&s), vec!["P1", "P2"]);

        let trace = report.trace();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].work_before, vec![0]);
        assert_eq!(trace[0].work_after, vec![1]);
        assert_eq!(trace[1].process, "P2");
        assert_eq!(trace[1].need, vec![1]);
        assert_eq!(trace[1].step, 2);
    }

    #[test]
    fn test_circular_hold_is_deadlocked() {
        let s = state(
            &["P1", "P2"],
            &["R1", "R2"],
            vec![vec![1, 0], vec![0, 1]],
            vec![vec![1, 1], vec![1, 1]],
            vec![0, 0],
        );
        let report = SafetyAnalyzer::analyze(&s);

        assert!(!report.is_safe());
        assert_eq!(report.deadlocked(&s), vec!["P1", "P2"]);
        assert!(report.trace().is_empty());
    }

    #[test]
    fn test_later_index_unblocks_earlier_in_next_pass() {
        // P1 needs what P2 holds; P2 can finish immediately.
        let s = state(
            &["P1", "P2"],
            &["R1"],
            vec![vec![0], vec![2]],
            vec![vec![2], vec![2]],
            vec![0],
        );
        let report = SafetyAnalyzer::analyze(&s);

        assert!(report.is_safe());
        assert_eq!(report.safe_sequence(&s), vec!["P2", "P1"]);
    }

    #[test]
    fn test_single_pass_picks_up_multiple_processes_in_index_order() {
        let s = state(
            &["P1", "P2", "P3"],
            &["R1"],
            vec![vec![1], vec![0], vec![1]],
            vec![vec![1], vec![2], vec![1]],
            vec![0],
        );
        let report = SafetyAnalyzer::analyze(&s);

        // P1 and P3 finish in the first pass, P2 in the second.
        assert_eq!(report.safe_sequence(&s), vec!["P1", "P3", "P2"]);
    }

    #[test]
    fn test_detect_matches_analyze_without_trace() {
        let s = state(
            &["P1", "P2", "P3"],
            &["R1", "R2"],
            vec![vec![1, 0], vec![0, 1], vec![0, 0]],
            vec![vec![1, 1], vec![1, 1], vec![0, 1]],
            vec![0, 0],
        );
        let traced = SafetyAnalyzer::analyze(&s);
        let plain = SafetyAnalyzer::detect(&s);

        assert_eq!(traced.deadlocked_indices(), plain.deadlocked_indices());
        assert_eq!(traced.finish_order(), plain.finish_order());
        assert!(plain.trace().is_empty());
        assert_eq!(plain.deadlocked(&s), vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn test_empty_state_is_safe() {
        let s = state(&[], &[], vec![], vec![], vec![]);
        assert!(SafetyAnalyzer::analyze(&s).is_safe());
    }
}
