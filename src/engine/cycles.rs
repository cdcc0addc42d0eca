// Cycle enumeration over the wait-for graph
use super::types::Cycle;
use super::wait_for::WaitForGraph;
use ahash::AHashMap;
use tracing::debug;

/// Single-pass DFS cycle enumeration.
///
/// One DFS root per node not yet visited, in graph order. `visited` is global
/// across roots: once a node has been closed it is never re-entered, so a cycle
/// reachable only through a node closed by an earlier root is not reported.
/// The result is the set of cycles on first-discovered paths, not every simple
/// cycle in the graph. Identical sequences are reported once.
///
/// Runs in O(n + e) using an explicit stack.
pub struct CycleFinder;

struct Frame {
    node: usize,
    next_edge: usize,
}

impl CycleFinder {
    pub fn find(graph: &WaitForGraph) -> Vec<Cycle> {
        let nodes = graph.nodes();
        let position: AHashMap<usize, usize> = nodes
            .iter()
            .enumerate()
            .map(|(pos, node)| (node.index, pos))
            .collect();
        let adjacency: Vec<Vec<usize>> = nodes
            .iter()
            .map(|node| {
                node.waits_for_index
                    .iter()
                    .filter_map(|target| position.get(target).copied())
                    .collect()
            })
            .collect();

        let mut visited = vec![false; nodes.len()];
        let mut on_path = vec![false; nodes.len()];
        let mut cycles: Vec<Cycle> = Vec::new();

        for root in 0..nodes.len() {
            if visited[root] {
                continue;
            }

            let mut stack = vec![Frame { node: root, next_edge: 0 }];
            visited[root] = true;
            on_path[root] = true;

            while let Some(frame) = stack.last_mut() {
                let current = frame.node;
                let Some(&next) = adjacency[current].get(frame.next_edge) else {
                    on_path[current] = false;
                    stack.pop();
                    continue;
                };
                frame.next_edge += 1;

                if on_path[next] {
                    // Back edge: the path from `next` to `current` closes a cycle.
                    let start = stack.iter().position(|f| f.node == next).unwrap_or(0);
                    let cycle = Cycle {
                        sequence: stack[start..]
                            .iter()
                            .map(|f| nodes[f.node].process.clone())
                            .collect(),
                    };
                    if cycle.len() > 1 && !cycles.contains(&cycle) {
                        cycles.push(cycle);
                    }
                } else if !visited[next] {
                    visited[next] = true;
                    on_path[next] = true;
                    stack.push(Frame { node: next, next_edge: 0 });
                }
            }
        }

        debug!(cycles = cycles.len(), nodes = nodes.len(), "cycle search complete");
        cycles
    }
}
