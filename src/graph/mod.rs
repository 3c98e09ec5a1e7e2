//! Component D — the translator graph and its lifecycle.
//!
//! Grounded on Design Notes §9's explicit re-architecture instruction: the
//! active graph is modeled as a versioned, immutable snapshot (`Arc`)
//! rather than the source's process-wide mutable global. Handlers capture
//! a snapshot on entry and release it on drop; the switcher publishes a
//! new snapshot and waits for the old one's reference count (tracked via
//! `wind_count`, the analog of the original's "winds") to reach zero
//! before tearing it down.

pub mod switch;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A single node in the translator graph: a type string, a name, and its
/// typed options (spec §4.4).
#[derive(Debug, Clone)]
pub struct Translator {
    pub type_name: String,
    pub name: String,
    pub options: HashMap<String, String>,
    pub children: Vec<String>,
}

/// A static DAG of translators, identified by the name of its top node.
#[derive(Debug, Clone)]
pub struct Graph {
    pub version: u64,
    pub top: String,
    pub nodes: HashMap<String, Translator>,
}

impl Graph {
    pub fn node(&self, name: &str) -> Option<&Translator> {
        self.nodes.get(name)
    }

    /// True if `other` differs from `self` only in option values (same
    /// topology and types) — the condition for reconfiguring in place
    /// instead of reconstructing (spec §4.4).
    pub fn is_reconfiguration_of(&self, other: &Graph) -> bool {
        if self.nodes.len() != other.nodes.len() {
            return false;
        }
        for (name, node) in &self.nodes {
            match other.nodes.get(name) {
                Some(other_node) => {
                    if node.type_name != other_node.type_name || node.children != other_node.children {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

/// A live, reference-counted handle on an active graph.
///
/// Cloning increments `wind_count`; dropping decrements it. The
/// graph-switch task waits for an old snapshot's `wind_count` to reach
/// zero before finalizing the switch (spec §4.4's "old graph idle" arrow).
pub struct GraphSnapshot {
    pub graph: Graph,
    wind_count: Arc<AtomicU64>,
}

impl GraphSnapshot {
    pub fn new(graph: Graph) -> GraphSnapshot {
        GraphSnapshot { graph, wind_count: Arc::new(AtomicU64::new(0)) }
    }

    /// Captures a reference-counted "wind" on this snapshot for the
    /// duration of one request.
    pub fn enter(&self) -> WindGuard {
        self.wind_count.fetch_add(1, Ordering::AcqRel);
        WindGuard { count: self.wind_count.clone() }
    }

    pub fn winds(&self) -> u64 {
        self.wind_count.load(Ordering::Acquire)
    }
}

/// RAII guard representing one in-flight request against a graph
/// snapshot; dropping it decrements the snapshot's wind count.
pub struct WindGuard {
    count: Arc<AtomicU64>,
}

impl Drop for WindGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_graph(version: u64, option_value: &str) -> Graph {
        let mut nodes = HashMap::new();
        nodes.insert(
            "posix".to_string(),
            Translator {
                type_name: "storage/posix".to_string(),
                name: "posix".to_string(),
                options: HashMap::from([("reserve".to_string(), option_value.to_string())]),
                children: vec![],
            },
        );
        Graph { version, top: "posix".to_string(), nodes }
    }

    #[test]
    fn same_topology_different_options_is_a_reconfiguration() {
        let a = leaf_graph(1, "1%");
        let b = leaf_graph(2, "5%");
        assert!(a.is_reconfiguration_of(&b));
    }

    #[test]
    fn different_topology_is_not_a_reconfiguration() {
        let a = leaf_graph(1, "1%");
        let mut b = leaf_graph(2, "1%");
        b.nodes.get_mut("posix").unwrap().type_name = "storage/other".to_string();
        assert!(!a.is_reconfiguration_of(&b));
    }

    #[test]
    fn wind_guard_tracks_in_flight_requests() {
        let snapshot = GraphSnapshot::new(leaf_graph(1, "1%"));
        assert_eq!(snapshot.winds(), 0);
        let guard = snapshot.enter();
        assert_eq!(snapshot.winds(), 1);
        drop(guard);
        assert_eq!(snapshot.winds(), 0);
    }
}
