//! The graph-store seam: [`GraphBackend`] captures the primitive graph edits
//! a store must expose, so the category kernel and `Hierarchy` never depend
//! on any one storage strategy. [`MemoryBackend`] is the only implementation
//! this crate ships; a query-emitting backend for an external graph database
//! is an equally valid implementor left to callers.

use serde::{Deserialize, Serialize};

use crate::attr::{AttrMap, IntoAttrValue};
use crate::error::GraphError;
use crate::graph::{AttrGraph, NodeId};

/// A cheap, `Copy` handle to one graph tracked by a [`GraphBackend`]. Callers
/// pass these around instead of cross-referencing graphs directly; the
/// backend is free to store the graph however it likes behind the handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphHandle(usize);

/// The contract the core requires of any graph store.
///
/// Node ids stay caller-visible strings at this boundary; a backend that
/// wants a denser internal representation interns them itself and is
/// responsible for translating back out again.
pub trait GraphBackend {
    fn create_graph(&mut self, directed: bool) -> GraphHandle;
    fn remove_graph(&mut self, handle: GraphHandle) -> Result<(), GraphError>;

    /// A read-only view of the full graph value. `Hierarchy` snapshots this
    /// to run the pure category-kernel functions against.
    fn snapshot(&self, handle: GraphHandle) -> Result<&AttrGraph, GraphError>;

    /// Replaces the stored graph wholesale. `Hierarchy` uses this to write
    /// back the result of a rewrite or a propagation repair.
    fn replace(&mut self, handle: GraphHandle, graph: AttrGraph) -> Result<(), GraphError>;

    fn add_node(&mut self, handle: GraphHandle, n: NodeId) -> Result<(), GraphError>;
    fn remove_node(&mut self, handle: GraphHandle, n: &str) -> Result<(), GraphError>;
    fn add_edge(&mut self, handle: GraphHandle, u: &str, v: &str) -> Result<(), GraphError>;
    fn remove_edge(&mut self, handle: GraphHandle, u: &str, v: &str) -> Result<(), GraphError>;
    fn clone_node(&mut self, handle: GraphHandle, n: &str, clone_id: NodeId) -> Result<(), GraphError>;
    fn merge_nodes(&mut self, handle: GraphHandle, nodes: &[NodeId], merged_id: NodeId) -> Result<(), GraphError>;

    fn add_node_attrs(&mut self, handle: GraphHandle, n: &str, key: &str, val: AttrMap) -> Result<(), GraphError>;
    fn has_edge(&self, handle: GraphHandle, u: &str, v: &str) -> Result<bool, GraphError>;
    fn neighbors(&self, handle: GraphHandle, n: &str) -> Result<Vec<NodeId>, GraphError>;
    fn list_nodes(&self, handle: GraphHandle) -> Result<Vec<NodeId>, GraphError>;
    fn list_edges(&self, handle: GraphHandle) -> Result<Vec<(NodeId, NodeId)>, GraphError>;

    /// Optional transaction bracket; a backend with no partial-failure
    /// window within a primitive can leave these as no-ops. `Hierarchy`
    /// calls them around every batch of related primitive calls so a
    /// transactional backend can group them.
    fn begin_tx(&mut self) {}
    fn commit_tx(&mut self) {}
}

/// The default, in-process backend: every managed graph lives behind an
/// arena of [`GraphHandle`]s so callers can hand graph identities around as
/// cheap `Copy` values instead of cross-referencing `AttrGraph`s directly.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    arena: Vec<Option<AttrGraph>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend { arena: Vec::new() }
    }

    fn get(&self, handle: GraphHandle) -> Result<&AttrGraph, GraphError> {
        self.arena
            .get(handle.0)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| GraphError::UnknownNode(format!("graph handle {}", handle.0)))
    }

    fn get_mut(&mut self, handle: GraphHandle) -> Result<&mut AttrGraph, GraphError> {
        self.arena
            .get_mut(handle.0)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| GraphError::UnknownNode(format!("graph handle {}", handle.0)))
    }
}

impl GraphBackend for MemoryBackend {
    fn create_graph(&mut self, directed: bool) -> GraphHandle {
        self.arena.push(Some(AttrGraph::new(directed)));
        GraphHandle(self.arena.len() - 1)
    }

    fn remove_graph(&mut self, handle: GraphHandle) -> Result<(), GraphError> {
        let slot = self
            .arena
            .get_mut(handle.0)
            .ok_or_else(|| GraphError::UnknownNode(format!("graph handle {}", handle.0)))?;
        if slot.take().is_none() {
            return Err(GraphError::UnknownNode(format!("graph handle {}", handle.0)));
        }
        Ok(())
    }

    fn snapshot(&self, handle: GraphHandle) -> Result<&AttrGraph, GraphError> {
        self.get(handle)
    }

    fn replace(&mut self, handle: GraphHandle, graph: AttrGraph) -> Result<(), GraphError> {
        *self.get_mut(handle)? = graph;
        Ok(())
    }

    fn add_node(&mut self, handle: GraphHandle, n: NodeId) -> Result<(), GraphError> {
        self.get_mut(handle)?.add_node(n)
    }

    fn remove_node(&mut self, handle: GraphHandle, n: &str) -> Result<(), GraphError> {
        self.get_mut(handle)?.remove_node(n)
    }

    fn add_edge(&mut self, handle: GraphHandle, u: &str, v: &str) -> Result<(), GraphError> {
        self.get_mut(handle)?.add_edge(u, v)
    }

    fn remove_edge(&mut self, handle: GraphHandle, u: &str, v: &str) -> Result<(), GraphError> {
        self.get_mut(handle)?.remove_edge(u, v)
    }

    fn clone_node(&mut self, handle: GraphHandle, n: &str, clone_id: NodeId) -> Result<(), GraphError> {
        self.get_mut(handle)?.clone_node(n, clone_id)
    }

    fn merge_nodes(&mut self, handle: GraphHandle, nodes: &[NodeId], merged_id: NodeId) -> Result<(), GraphError> {
        self.get_mut(handle)?.merge_nodes(nodes, merged_id)
    }

    fn add_node_attrs(&mut self, handle: GraphHandle, n: &str, key: &str, val: AttrMap) -> Result<(), GraphError> {
        let g = self.get_mut(handle)?;
        if let Some(v) = val.get(key) {
            g.add_node_attrs(n, key, v.clone().into_attr_value())?;
        }
        Ok(())
    }

    fn has_edge(&self, handle: GraphHandle, u: &str, v: &str) -> Result<bool, GraphError> {
        Ok(self.get(handle)?.has_edge(u, v))
    }

    fn neighbors(&self, handle: GraphHandle, n: &str) -> Result<Vec<NodeId>, GraphError> {
        let g = self.get(handle)?;
        if !g.has_node(n) {
            return Err(GraphError::UnknownNode(n.to_string()));
        }
        Ok(g.neighbors(n).cloned().collect())
    }

    fn list_nodes(&self, handle: GraphHandle) -> Result<Vec<NodeId>, GraphError> {
        Ok(self.get(handle)?.nodes().cloned().collect())
    }

    fn list_edges(&self, handle: GraphHandle) -> Result<Vec<(NodeId, NodeId)>, GraphError> {
        Ok(self.get(handle)?.edges().map(|(u, v)| (u.clone(), v.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_reuses_distinct_handles() {
        let mut b = MemoryBackend::new();
        let g1 = b.create_graph(true);
        let g2 = b.create_graph(true);
        b.add_node(g1, "a".to_string()).unwrap();
        assert!(b.list_nodes(g1).unwrap().contains(&"a".to_string()));
        assert!(b.list_nodes(g2).unwrap().is_empty());
    }

    #[test]
    fn remove_graph_invalidates_handle() {
        let mut b = MemoryBackend::new();
        let g = b.create_graph(true);
        b.remove_graph(g).unwrap();
        assert!(b.snapshot(g).is_err());
    }

    #[test]
    fn snapshot_and_replace_round_trip() {
        let mut b = MemoryBackend::new();
        let g = b.create_graph(true);
        b.add_node(g, "a".to_string()).unwrap();
        let mut snap = b.snapshot(g).unwrap().clone();
        snap.add_node("b").unwrap();
        b.replace(g, snap).unwrap();
        assert_eq!(b.list_nodes(g).unwrap().len(), 2);
    }
}
