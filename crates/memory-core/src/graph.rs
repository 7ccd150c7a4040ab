//! Graph store (C4)
//!
//! Adjacency list of labelled bidirectional edges, persisted as
//! `id -> [{target, label}]`. Every forward edge has a paired reverse edge
//! with a deterministically derived (or explicitly supplied) reverse label.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};
use crate::model::{Direction, Edge};

/// On-disk adjacency map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GraphFile(HashMap<String, Vec<Edge>>);

/// In-memory graph for one scope.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    adjacency: HashMap<String, Vec<Edge>>,
}

/// Derive the reverse label for a forward label when the caller did not
/// supply one explicitly. Only the well-known pair `part-of`/`contains` is
/// special-cased; everything else gets a `"{label}-by"` suffix. No attempt
/// is made to guess a richer grammar (spec.md §9, open question).
pub fn derive_reverse_label(label: &str) -> String {
    match label {
        "part-of" => "contains".to_string(),
        "contains" => "part-of".to_string(),
        other => format!("{other}-by"),
    }
}

impl Graph {
    fn path(root: &Path) -> PathBuf {
        root.join("graph.json")
    }

    /// Load the graph for a scope root. A missing or corrupt file loads as
    /// empty (§4.4, "Corrupt graph file -> start empty and continue").
    pub fn load(root: &Path) -> Self {
        let path = Self::path(root);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str::<GraphFile>(&raw) {
            Ok(file) => Graph { adjacency: file.0 },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt graph, starting empty");
                Self::default()
            }
        }
    }

    /// Atomically persist the graph.
    pub fn save(&self, root: &Path) -> Result<()> {
        let file = GraphFile(self.adjacency.clone());
        let json = serde_json::to_string_pretty(&file)?;
        crate::fsutil::atomic_write(&Self::path(root), json.as_bytes())?;
        Ok(())
    }

    /// Create a labelled edge `a -> b` plus its reverse `b -> a`.
    ///
    /// `known_ids` is the set of ids that exist in the current index, used
    /// to validate both endpoints per §4.4.
    pub fn link(
        &mut self,
        a: &str,
        b: &str,
        label: &str,
        reverse_label: Option<&str>,
        known_ids: &HashSet<String>,
    ) -> Result<()> {
        if a == b {
            return Err(MemoryError::SelfLink(a.to_string()));
        }
        if !known_ids.contains(a) {
            return Err(MemoryError::GraphNotFound(a.to_string()));
        }
        if !known_ids.contains(b) {
            return Err(MemoryError::GraphNotFound(b.to_string()));
        }

        let forward_exists = self
            .adjacency
            .get(a)
            .map(|edges| edges.iter().any(|e| e.target == b && e.label == label))
            .unwrap_or(false);
        if forward_exists {
            return Err(MemoryError::DuplicateEdge {
                source: a.to_string(),
                target: b.to_string(),
                label: label.to_string(),
            });
        }

        let reverse = reverse_label
            .map(|s| s.to_string())
            .unwrap_or_else(|| derive_reverse_label(label));

        self.adjacency.entry(a.to_string()).or_default().push(Edge {
            target: b.to_string(),
            label: label.to_string(),
        });
        self.adjacency.entry(b.to_string()).or_default().push(Edge {
            target: a.to_string(),
            label: reverse,
        });
        Ok(())
    }

    /// Remove every edge between `a` and `b`, in both directions.
    pub fn unlink(&mut self, a: &str, b: &str) {
        if let Some(edges) = self.adjacency.get_mut(a) {
            edges.retain(|e| e.target != b);
        }
        if let Some(edges) = self.adjacency.get_mut(b) {
            edges.retain(|e| e.target != a);
        }
    }

    /// All edges touching `id`, filtered by direction.
    ///
    /// `out` returns this node's own adjacency list. `in` scans every other
    /// node's adjacency list for edges pointing at `id`. `both` is the union.
    pub fn edges(&self, id: &str, direction: Direction) -> Vec<Edge> {
        let mut result = Vec::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            if let Some(edges) = self.adjacency.get(id) {
                result.extend(edges.iter().cloned());
            }
        }
        if matches!(direction, Direction::In | Direction::Both) {
            for (source, edges) in &self.adjacency {
                if source == id {
                    continue;
                }
                for e in edges {
                    if e.target == id {
                        result.push(Edge {
                            target: source.clone(),
                            label: e.label.clone(),
                        });
                    }
                }
            }
        }
        result
    }

    /// Remove every edge whose either endpoint is `id` (called on delete).
    pub fn cascade_delete(&mut self, id: &str) {
        self.adjacency.remove(id);
        for edges in self.adjacency.values_mut() {
            edges.retain(|e| e.target != id);
        }
    }

    /// Drop adjacency for ids outside `known_ids`, and drop edges pointing
    /// at an unknown target. Restores the link-time invariant that both
    /// endpoints exist after an index entry was deleted out of band.
    /// Returns the number of edges removed.
    pub fn prune_dangling(&mut self, known_ids: &HashSet<String>) -> usize {
        self.adjacency.retain(|id, _| known_ids.contains(id));
        let mut removed = 0;
        for edges in self.adjacency.values_mut() {
            let before = edges.len();
            edges.retain(|e| known_ids.contains(&e.target));
            removed += before - edges.len();
        }
        removed
    }

    /// BFS from `root` up to `depth` hops. Returns nodes reached (with hop
    /// distance) and the edges traversed to reach them.
    pub fn expand(&self, root: &str, depth: usize) -> ExpandResult {
        let mut visited: HashMap<String, usize> = HashMap::new();
        visited.insert(root.to_string(), 0);
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(root.to_string());
        let mut traversed = Vec::new();

        while let Some(current) = queue.pop_front() {
            let current_depth = visited[&current];
            if current_depth >= depth {
                continue;
            }
            for edge in self.edges(&current, Direction::Both) {
                if !visited.contains_key(&edge.target) {
                    visited.insert(edge.target.clone(), current_depth + 1);
                    traversed.push((current.clone(), edge.clone()));
                    queue.push_back(edge.target.clone());
                }
            }
        }

        let mut nodes: Vec<(String, usize)> = visited.into_iter().collect();
        nodes.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        ExpandResult {
            nodes,
            edges: traversed,
        }
    }
}

/// Result of [`Graph::expand`].
#[derive(Debug, Clone)]
pub struct ExpandResult {
    /// `(id, hop_distance)` pairs, including the root at distance 0.
    pub nodes: Vec<(String, usize)>,
    /// `(source_id, edge)` pairs describing traversal order.
    pub edges: Vec<(String, Edge)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ids(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn link_creates_bidirectional_edge() {
        let mut g = Graph::default();
        let known = ids(&["a", "b"]);
        g.link("a", "b", "relates-to", None, &known).unwrap();

        let out_a = g.edges("a", Direction::Out);
        assert!(out_a.iter().any(|e| e.target == "b" && e.label == "relates-to"));

        let in_b = g.edges("b", Direction::In);
        assert!(in_b.iter().any(|e| e.target == "a" && e.label == "relates-to"));

        let out_b = g.edges("b", Direction::Out);
        assert!(out_b.iter().any(|e| e.target == "a" && e.label == "relates-to-by"));
    }

    #[test]
    fn part_of_reverses_to_contains() {
        let mut g = Graph::default();
        let known = ids(&["a", "b"]);
        g.link("a", "b", "part-of", None, &known).unwrap();
        let out_b = g.edges("b", Direction::Out);
        assert!(out_b.iter().any(|e| e.label == "contains"));
    }

    #[test]
    fn explicit_reverse_label_is_honoured() {
        let mut g = Graph::default();
        let known = ids(&["a", "b"]);
        g.link("a", "b", "warned-by", Some("warns"), &known).unwrap();
        let out_b = g.edges("b", Direction::Out);
        assert!(out_b.iter().any(|e| e.label == "warns"));
    }

    #[test]
    fn self_link_rejected() {
        let mut g = Graph::default();
        let known = ids(&["a"]);
        let err = g.link("a", "a", "x", None, &known).unwrap_err();
        assert!(matches!(err, MemoryError::SelfLink(_)));
    }

    #[test]
    fn unknown_endpoint_rejected() {
        let mut g = Graph::default();
        let known = ids(&["a"]);
        let err = g.link("a", "b", "x", None, &known).unwrap_err();
        assert!(matches!(err, MemoryError::GraphNotFound(_)));
    }

    #[test]
    fn duplicate_forward_edge_rejected() {
        let mut g = Graph::default();
        let known = ids(&["a", "b"]);
        g.link("a", "b", "x", None, &known).unwrap();
        let err = g.link("a", "b", "x", None, &known).unwrap_err();
        assert!(matches!(err, MemoryError::DuplicateEdge { .. }));
    }

    #[test]
    fn unlink_removes_both_directions() {
        let mut g = Graph::default();
        let known = ids(&["a", "b"]);
        g.link("a", "b", "x", None, &known).unwrap();
        g.unlink("a", "b");
        assert!(g.edges("a", Direction::Out).is_empty());
        assert!(g.edges("b", Direction::Out).is_empty());
    }

    #[test]
    fn cascade_delete_removes_all_referencing_edges() {
        let mut g = Graph::default();
        let known = ids(&["a", "b", "c"]);
        g.link("a", "b", "x", None, &known).unwrap();
        g.link("c", "a", "y", None, &known).unwrap();
        g.cascade_delete("a");
        assert!(g.edges("b", Direction::Both).iter().all(|e| e.target != "a"));
        assert!(g.edges("c", Direction::Both).iter().all(|e| e.target != "a"));
    }

    #[test]
    fn expand_respects_depth() {
        let mut g = Graph::default();
        let known = ids(&["a", "b", "c", "d"]);
        g.link("a", "b", "x", None, &known).unwrap();
        g.link("b", "c", "x", None, &known).unwrap();
        g.link("c", "d", "x", None, &known).unwrap();

        let result = g.expand("a", 2);
        let reached: HashSet<String> = result.nodes.iter().map(|(id, _)| id.clone()).collect();
        assert!(reached.contains("a"));
        assert!(reached.contains("b"));
        assert!(reached.contains("c"));
        assert!(!reached.contains("d"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let mut g = Graph::default();
        let known = ids(&["a", "b"]);
        g.link("a", "b", "x", None, &known).unwrap();
        g.save(dir.path()).unwrap();

        let loaded = Graph::load(dir.path());
        assert!(!loaded.edges("a", Direction::Out).is_empty());
    }

    #[test]
    fn prune_dangling_drops_edges_and_adjacency_for_unknown_ids() {
        let mut g = Graph::default();
        let known = ids(&["a", "b", "c"]);
        g.link("a", "b", "x", None, &known).unwrap();
        g.link("b", "c", "x", None, &known).unwrap();

        // "c" was deleted out of band; only "a" and "b" remain known.
        let still_known = ids(&["a", "b"]);
        let removed = g.prune_dangling(&still_known);
        assert!(removed > 0);
        assert!(g.edges("b", Direction::Both).iter().all(|e| e.target != "c"));
        assert!(g.edges("c", Direction::Both).is_empty());
    }

    #[test]
    fn corrupt_graph_loads_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("graph.json"), b"{not json").unwrap();
        let loaded = Graph::load(dir.path());
        assert!(loaded.edges("anything", Direction::Both).is_empty());
    }
}
