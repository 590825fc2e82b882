//! Pure dependency-graph operations: build, ready-set, topological sort.
//!
//! No I/O, no traits, no back-pointers — two parallel maps plus a node set,
//! the way a plain decision function in this codebase is built (see
//! `worker/cycle.rs`'s `plan_cycle`). Deliberately hand-rolled rather than
//! built on a graph crate.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    nodes: HashSet<String>,
    /// blocked -> [blocker]
    blocked_by: HashMap<String, Vec<String>>,
    /// blocker -> [blocked]
    unblocks: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build a graph from a node list and a per-node blocker lookup.
    ///
    /// For each node `n`, `blockers_of(n)` returns candidate blocker keys.
    /// An edge `b -> n` is added only if `b` is itself a node and `b != n`;
    /// self-loops and external blockers (not in the node set) are dropped
    /// here. Duplicate edges collapse silently.
    pub fn build<'a, I, F>(node_ids: I, blockers_of: F) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(&str) -> Vec<String>,
    {
        let nodes: HashSet<String> = node_ids.into_iter().map(str::to_string).collect();
        let mut blocked_by: HashMap<String, Vec<String>> = HashMap::new();
        let mut unblocks: HashMap<String, Vec<String>> = HashMap::new();

        for n in &nodes {
            let mut seen = HashSet::new();
            for b in blockers_of(n) {
                if b == *n || !nodes.contains(&b) || !seen.insert(b.clone()) {
                    continue;
                }
                blocked_by.entry(n.clone()).or_default().push(b.clone());
                unblocks.entry(b).or_default().push(n.clone());
            }
        }

        Self {
            nodes,
            blocked_by,
            unblocks,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn blockers_of(&self, node: &str) -> &[String] {
        self.blocked_by.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every node not in `completed` whose blockers are all in `completed`,
    /// lexicographically sorted for determinism.
    pub fn ready(&self, completed: &HashSet<String>) -> Vec<String> {
        let mut out: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| !completed.contains(*n))
            .filter(|n| {
                self.blockers_of(n)
                    .iter()
                    .all(|b| completed.contains(b))
            })
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Kahn's algorithm with lexicographic tie-breaking at every level.
    /// On a cycle, returns `Error::Cycle` carrying how many nodes were
    /// processed before the algorithm stalled.
    pub fn topo_sort(&self) -> Result<Vec<String>> {
        let mut indegree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.blockers_of(n).len()))
            .collect();

        let mut ready: Vec<&str> = indegree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&n, _)| n)
            .collect();
        ready.sort_unstable();

        let mut out = Vec::with_capacity(self.nodes.len());
        while let Some(n) = {
            ready.sort_unstable();
            if ready.is_empty() {
                None
            } else {
                Some(ready.remove(0))
            }
        } {
            out.push(n.to_string());
            for m in self.unblocks.get(n).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(d) = indegree.get_mut(m.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(m.as_str());
                    }
                }
            }
        }

        if out.len() != self.nodes.len() {
            return Err(Error::Cycle {
                processed: out.len(),
                total: self.nodes.len(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges_graph(edges: &[(&str, &str)], nodes: &[&str]) -> DependencyGraph {
        let blockers: HashMap<String, Vec<String>> = nodes
            .iter()
            .map(|&n| {
                let bs: Vec<String> = edges
                    .iter()
                    .filter(|(_, to)| *to == n)
                    .map(|(from, _)| from.to_string())
                    .collect();
                (n.to_string(), bs)
            })
            .collect();
        DependencyGraph::build(nodes.iter().copied(), |n| {
            blockers.get(n).cloned().unwrap_or_default()
        })
    }

    #[test]
    fn simple_chain() {
        let g = edges_graph(&[("A", "B"), ("B", "C")], &["A", "B", "C"]);
        assert_eq!(g.ready(&HashSet::new()), vec!["A"]);
        let mut completed: HashSet<String> = HashSet::new();
        completed.insert("A".into());
        assert_eq!(g.ready(&completed), vec!["B"]);
        completed.insert("B".into());
        assert_eq!(g.ready(&completed), vec!["C"]);
        assert_eq!(g.topo_sort().unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn diamond_lexicographic_tiebreak() {
        let g = edges_graph(
            &[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")],
            &["A", "B", "C", "D"],
        );
        assert_eq!(g.ready(&HashSet::new()), vec!["A"]);
        let mut completed: HashSet<String> = HashSet::new();
        completed.insert("A".into());
        assert_eq!(g.ready(&completed), vec!["B", "C"]);
        completed.insert("B".into());
        completed.insert("C".into());
        assert_eq!(g.ready(&completed), vec!["D"]);
    }

    #[test]
    fn cycle_yields_empty_ready_and_fails_topo_sort() {
        let g = edges_graph(&[("A", "B"), ("B", "A")], &["A", "B"]);
        assert!(g.ready(&HashSet::new()).is_empty());
        assert!(matches!(g.topo_sort(), Err(Error::Cycle { .. })));
    }

    #[test]
    fn self_loop_and_duplicate_edges_are_dropped() {
        let g = DependencyGraph::build(["A"], |_| vec!["A".to_string(), "A".to_string()]);
        assert!(g.blockers_of("A").is_empty());
    }

    #[test]
    fn external_blocker_dropped_at_build_time() {
        let g = DependencyGraph::build(["A"], |_| vec!["Z".to_string()]);
        assert!(g.blockers_of("A").is_empty());
        assert_eq!(g.ready(&HashSet::new()), vec!["A"]);
    }

    #[test]
    fn empty_graph_yields_empty_outputs() {
        let g = DependencyGraph::build(Vec::<&str>::new(), |_| vec![]);
        assert!(g.ready(&HashSet::new()).is_empty());
        assert!(g.topo_sort().unwrap().is_empty());
    }

    #[test]
    fn ready_subset_and_blockers_satisfied_invariant() {
        let g = edges_graph(
            &[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")],
            &["A", "B", "C", "D"],
        );
        let mut completed: HashSet<String> = HashSet::new();
        completed.insert("A".into());
        for c in [vec![], vec!["A".to_string()]] {
            let completed: HashSet<String> = c.into_iter().collect();
            for n in g.ready(&completed) {
                assert!(!completed.contains(&n));
                assert!(g.blockers_of(&n).iter().all(|b| completed.contains(b)));
            }
        }
    }
}
