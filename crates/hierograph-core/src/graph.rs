//! The concrete attributed multigraph value that the category kernel, rules
//! and rewriter all operate on directly.
//!
//! Node identity at this layer is a caller-chosen string, matching how
//! [`Rule`](crate::rule::Rule) and the mini command language name nodes. A
//! [`GraphBackend`](crate::backend::GraphBackend) implementation is free to
//! intern these into a denser arena handle internally; `AttrGraph` itself
//! stays a plain value so the kernel functions in `category` can be pure.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::attr::{attrs_union, AttrMap, AttrVal, IntoAttrValue};
use crate::error::GraphError;

/// A caller-chosen node identifier, unique within one [`AttrGraph`].
pub type NodeId = String;

/// An ordered node pair identifying one edge. For an undirected graph this is
/// always stored canonicalized as `(min(u, v), max(u, v))`.
pub type EdgeId = (NodeId, NodeId);

/// An attributed directed-or-undirected multigraph with at most one edge per
/// (canonicalized) node pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrGraph {
    directed: bool,
    nodes: BTreeMap<NodeId, AttrMap>,
    edges: BTreeMap<EdgeId, AttrMap>,
}

impl AttrGraph {
    pub fn new(directed: bool) -> Self {
        AttrGraph {
            directed,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    /// Normalize an edge endpoint pair per the graph's directedness.
    pub fn canonical_pair(&self, u: &str, v: &str) -> EdgeId {
        if self.directed || u <= v {
            (u.to_string(), v.to_string())
        } else {
            (v.to_string(), u.to_string())
        }
    }

    pub fn has_node(&self, n: &str) -> bool {
        self.nodes.contains_key(n)
    }

    pub fn has_edge(&self, u: &str, v: &str) -> bool {
        self.edges.contains_key(&self.canonical_pair(u, v))
    }

    pub fn node_attrs(&self, n: &str) -> Result<&AttrMap, GraphError> {
        self.nodes.get(n).ok_or_else(|| GraphError::UnknownNode(n.to_string()))
    }

    pub fn edge_attrs(&self, u: &str, v: &str) -> Result<&AttrMap, GraphError> {
        let key = self.canonical_pair(u, v);
        self.edges
            .get(&key)
            .ok_or_else(|| GraphError::UnknownEdge(u.to_string(), v.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.edges.keys().map(|(u, v)| (u, v))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes adjacent to `n`: for a directed graph this is out-neighbors only.
    pub fn neighbors<'a>(&'a self, n: &'a str) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.edges.keys().filter_map(move |(u, v)| {
            if u == n {
                Some(v)
            } else if !self.directed && v == n {
                Some(u)
            } else {
                None
            }
        })
    }

    pub fn add_node(&mut self, n: impl Into<NodeId>) -> Result<(), GraphError> {
        let n = n.into();
        if self.nodes.contains_key(&n) {
            return Err(GraphError::Duplicate(n));
        }
        self.nodes.insert(n, AttrMap::new());
        Ok(())
    }

    pub fn add_node_with_attrs(&mut self, n: impl Into<NodeId>, attrs: AttrMap) -> Result<(), GraphError> {
        let n = n.into();
        if self.nodes.contains_key(&n) {
            return Err(GraphError::Duplicate(n));
        }
        self.nodes.insert(n, attrs);
        Ok(())
    }

    /// Removes a node and every edge incident to it.
    pub fn remove_node(&mut self, n: &str) -> Result<(), GraphError> {
        if self.nodes.remove(n).is_none() {
            return Err(GraphError::UnknownNode(n.to_string()));
        }
        self.edges.retain(|(u, v), _| u != n && v != n);
        Ok(())
    }

    pub fn add_edge(&mut self, u: &str, v: &str) -> Result<(), GraphError> {
        if !self.nodes.contains_key(u) {
            return Err(GraphError::UnknownNode(u.to_string()));
        }
        if !self.nodes.contains_key(v) {
            return Err(GraphError::UnknownNode(v.to_string()));
        }
        let key = self.canonical_pair(u, v);
        if self.edges.contains_key(&key) {
            return Err(GraphError::Duplicate(format!("{}->{}", key.0, key.1)));
        }
        self.edges.insert(key, AttrMap::new());
        Ok(())
    }

    pub fn remove_edge(&mut self, u: &str, v: &str) -> Result<(), GraphError> {
        let key = self.canonical_pair(u, v);
        if self.edges.remove(&key).is_none() {
            return Err(GraphError::UnknownEdge(u.to_string(), v.to_string()));
        }
        Ok(())
    }

    /// Adds a copy of `n` under a fresh id `clone_id`, with the same
    /// attributes and the same incident edges (each re-pointed to the
    /// clone in addition to the original).
    pub fn clone_node(&mut self, n: &str, clone_id: impl Into<NodeId>) -> Result<(), GraphError> {
        let clone_id = clone_id.into();
        let attrs = self.node_attrs(n)?.clone();
        self.add_node_with_attrs(clone_id.clone(), attrs)?;
        let incident: Vec<(NodeId, NodeId, AttrMap)> = self
            .edges
            .iter()
            .filter(|((u, v), _)| u == n || v == n)
            .map(|((u, v), a)| (u.clone(), v.clone(), a.clone()))
            .collect();
        for (u, v, a) in incident {
            let (cu, cv) = if u == n { (clone_id.clone(), v) } else { (u, clone_id.clone()) };
            let key = self.canonical_pair(&cu, &cv);
            self.edges.insert(key, a);
        }
        Ok(())
    }

    /// Merges `nodes` (must have length >= 1) into a single node `merged_id`.
    /// The merged node's attributes are the union of all merged nodes'
    /// attributes; every edge incident to any merged node is redirected to
    /// `merged_id`, with attribute maps unioned where redirection collapses
    /// two edges onto the same pair. A self-loop results if two merged nodes
    /// were themselves adjacent.
    pub fn merge_nodes(&mut self, nodes: &[NodeId], merged_id: impl Into<NodeId>) -> Result<(), GraphError> {
        let merged_id = merged_id.into();
        let merge_set: BTreeSet<&NodeId> = nodes.iter().collect();

        let mut merged_attrs = AttrMap::new();
        for n in nodes {
            let a = self.node_attrs(n)?;
            merged_attrs = attrs_union(&merged_attrs, a);
        }

        let old_edges: Vec<(EdgeId, AttrMap)> = std::mem::take(&mut self.edges).into_iter().collect();
        for n in nodes {
            self.nodes.remove(n);
        }
        self.nodes.insert(merged_id.clone(), merged_attrs);

        for ((u, v), a) in old_edges {
            let ru = if merge_set.contains(&u) { merged_id.clone() } else { u };
            let rv = if merge_set.contains(&v) { merged_id.clone() } else { v };
            let key = self.canonical_pair(&ru, &rv);
            self.edges
                .entry(key)
                .and_modify(|existing| *existing = attrs_union(existing, &a))
                .or_insert(a);
        }
        Ok(())
    }

    pub fn add_node_attrs(&mut self, n: &str, key: &str, val: impl IntoAttrValue) -> Result<(), GraphError> {
        let v = val.into_attr_value();
        let attrs = self.nodes.get_mut(n).ok_or_else(|| GraphError::UnknownNode(n.to_string()))?;
        attrs
            .entry(key.to_string())
            .and_modify(|existing| *existing = existing.union(&v))
            .or_insert(v);
        Ok(())
    }

    pub fn remove_node_attrs(&mut self, n: &str, key: &str, val: impl IntoAttrValue) -> Result<(), GraphError> {
        let v = val.into_attr_value();
        let attrs = self.nodes.get_mut(n).ok_or_else(|| GraphError::UnknownNode(n.to_string()))?;
        if let Some(existing) = attrs.get_mut(key) {
            *existing = existing.difference(&v);
        }
        Ok(())
    }

    pub fn update_node_attrs(&mut self, n: &str, key: &str, val: impl IntoAttrValue) -> Result<(), GraphError> {
        let v = val.into_attr_value();
        let attrs = self.nodes.get_mut(n).ok_or_else(|| GraphError::UnknownNode(n.to_string()))?;
        attrs.insert(key.to_string(), v);
        Ok(())
    }

    pub fn add_edge_attrs(&mut self, u: &str, v: &str, key: &str, val: impl IntoAttrValue) -> Result<(), GraphError> {
        let val = val.into_attr_value();
        let edge_key = self.canonical_pair(u, v);
        let attrs = self
            .edges
            .get_mut(&edge_key)
            .ok_or_else(|| GraphError::UnknownEdge(u.to_string(), v.to_string()))?;
        attrs
            .entry(key.to_string())
            .and_modify(|existing| *existing = existing.union(&val))
            .or_insert(val);
        Ok(())
    }

    pub fn remove_edge_attrs(&mut self, u: &str, v: &str, key: &str, val: impl IntoAttrValue) -> Result<(), GraphError> {
        let val = val.into_attr_value();
        let edge_key = self.canonical_pair(u, v);
        let attrs = self
            .edges
            .get_mut(&edge_key)
            .ok_or_else(|| GraphError::UnknownEdge(u.to_string(), v.to_string()))?;
        if let Some(existing) = attrs.get_mut(key) {
            *existing = existing.difference(&val);
        }
        Ok(())
    }

    pub fn update_edge_attrs(&mut self, u: &str, v: &str, key: &str, val: impl IntoAttrValue) -> Result<(), GraphError> {
        let val = val.into_attr_value();
        let edge_key = self.canonical_pair(u, v);
        let attrs = self
            .edges
            .get_mut(&edge_key)
            .ok_or_else(|| GraphError::UnknownEdge(u.to_string(), v.to_string()))?;
        attrs.insert(key.to_string(), val);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrVal;

    fn sample() -> AttrGraph {
        let mut g = AttrGraph::new(true);
        g.add_node("a").unwrap();
        g.add_node("b").unwrap();
        g.add_edge("a", "b").unwrap();
        g
    }

    #[test]
    fn undirected_canonicalizes_pair() {
        let mut g = AttrGraph::new(false);
        g.add_node("x").unwrap();
        g.add_node("y").unwrap();
        g.add_edge("y", "x").unwrap();
        assert!(g.has_edge("x", "y"));
        assert!(g.has_edge("y", "x"));
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut g = sample();
        g.remove_node("a").unwrap();
        assert!(!g.has_node("a"));
        assert!(!g.has_edge("a", "b"));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn clone_node_duplicates_attrs_and_edges() {
        let mut g = sample();
        g.add_node_attrs("a", "color", "red").unwrap();
        g.clone_node("a", "a2").unwrap();
        assert_eq!(g.node_attrs("a2").unwrap().get("color").unwrap(), &AttrVal::singleton("red"));
        assert!(g.has_edge("a2", "b"));
        assert!(g.has_edge("a", "b"));
    }

    #[test]
    fn merge_nodes_unions_attrs_and_redirects_edges() {
        let mut g = AttrGraph::new(true);
        g.add_node("1").unwrap();
        g.add_node("4").unwrap();
        g.add_node("ext").unwrap();
        g.add_node_attrs("1", "k", 1i64).unwrap();
        g.add_node_attrs("4", "k", 2i64).unwrap();
        g.add_edge("ext", "1").unwrap();
        g.add_edge("4", "ext").unwrap();
        g.add_edge("1", "4").unwrap();

        g.merge_nodes(&["1".to_string(), "4".to_string()], "m").unwrap();

        assert!(!g.has_node("1"));
        assert!(!g.has_node("4"));
        assert_eq!(
            g.node_attrs("m").unwrap().get("k").unwrap(),
            &AttrVal::from_scalars([crate::attr::Scalar::Int(1), crate::attr::Scalar::Int(2)])
        );
        assert!(g.has_edge("ext", "m"));
        assert!(g.has_edge("m", "ext"));
        assert!(g.has_edge("m", "m"));
    }

    #[test]
    fn node_attrs_idempotent_add() {
        let mut g = sample();
        g.add_node_attrs("a", "k", 1i64).unwrap();
        let once = g.node_attrs("a").unwrap().clone();
        g.add_node_attrs("a", "k", 1i64).unwrap();
        let twice = g.node_attrs("a").unwrap().clone();
        assert_eq!(once, twice);
    }
}
