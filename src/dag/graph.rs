// src/dag/graph.rs

use std::collections::{BTreeMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::{StateId, StateNode};
use crate::errors::{PrimerError, Result};

/// Registered state nodes keyed by identifier.
///
/// Parents are linked by name and resolved lazily, so a node may be
/// registered before the nodes it depends on.
#[derive(Debug, Default)]
pub struct StateGraph {
    nodes: BTreeMap<StateId, StateNode>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node; fails if its id is already taken.
    pub fn register(&mut self, node: StateNode) -> Result<()> {
        if self.nodes.contains_key(node.id()) {
            return Err(PrimerError::DuplicateState(node.id().clone()));
        }
        debug!(state = %node.id(), parents = ?node.parents(), "registered state");
        self.nodes.insert(node.id().clone(), node);
        Ok(())
    }

    /// Insert or overwrite a node (last registration wins).
    ///
    /// Returns the node that was replaced, if any.
    pub fn replace(&mut self, node: StateNode) -> Option<StateNode> {
        let replaced = self.nodes.insert(node.id().clone(), node);
        if let Some(old) = &replaced {
            debug!(state = %old.id(), "replaced state");
        }
        replaced
    }

    pub fn lookup(&self, id: &StateId) -> Result<&StateNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| PrimerError::UnknownState(id.clone()))
    }

    pub fn contains(&self, id: &StateId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes, ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = &StateNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check the declared graph reachable from `target`.
    ///
    /// Every id reachable through declared parents must be registered, and
    /// the reachable subgraph must be acyclic.
    pub fn validate_from(&self, target: &StateId) -> Result<()> {
        let mut reachable: HashSet<&StateId> = HashSet::new();
        let mut stack: Vec<&StateId> = vec![target];

        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            let node = self.lookup(id)?;
            stack.extend(node.parents());
        }

        // Edge direction: parent -> dependent.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for &id in reachable.iter() {
            graph.add_node(id.as_str());
        }
        for &id in reachable.iter() {
            for parent in self.lookup(id)?.parents() {
                graph.add_edge(parent.as_str(), id.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => {
                let start = StateId::new(cycle.node_id());
                let path = self
                    .declared_cycle_through(&start)
                    .unwrap_or_else(|| vec![start.clone(), start]);
                Err(PrimerError::CycleDetected { path })
            }
        }
    }

    /// Find a declared path `start -> ... -> start` following parents.
    fn declared_cycle_through(&self, start: &StateId) -> Option<Vec<StateId>> {
        let mut path = vec![start.clone()];
        let mut visited = HashSet::new();
        if self.walk_back_to(start, start, &mut path, &mut visited) {
            Some(path)
        } else {
            None
        }
    }

    fn walk_back_to(
        &self,
        current: &StateId,
        start: &StateId,
        path: &mut Vec<StateId>,
        visited: &mut HashSet<StateId>,
    ) -> bool {
        let Some(node) = self.nodes.get(current) else {
            return false;
        };
        for parent in node.parents() {
            if parent == start {
                path.push(parent.clone());
                return true;
            }
            if !visited.insert(parent.clone()) {
                continue;
            }
            path.push(parent.clone());
            if self.walk_back_to(parent, start, path, visited) {
                return true;
            }
            path.pop();
        }
        false
    }
}
