//! `Hierarchy`: a DAG of typed graphs connected by typing homomorphisms,
//! with the propagation that keeps every typing homomorphism valid after a
//! local rewrite.

mod propagate;

use std::collections::BTreeMap;

use daggy::{Dag, Walker};
use tracing::{debug, instrument};

use crate::attr::AttrMap;
use crate::backend::{GraphBackend, GraphHandle};
use crate::category::{self, Mapping};
use crate::config::EngineConfig;
use crate::error::HierarchyError;
use crate::graph::NodeId;
use crate::rule::Rule;
use crate::rewrite::{RewriteDelta, Rewriter};

pub use propagate::CancellationToken;

/// One graph tracked by the hierarchy: its backend handle plus the
/// hierarchy-level attributes attached to the graph *as a node of H*.
#[derive(Clone, Debug)]
struct GraphNode {
    id: String,
    handle: GraphHandle,
    #[allow(dead_code)]
    attrs: AttrMap,
}

/// A typing edge: the homomorphism plus whatever attributes the caller
/// attached to the edge itself.
#[derive(Clone, Debug)]
pub(crate) struct TypingEdge {
    pub mapping: Mapping,
    #[allow(dead_code)]
    pub attrs: AttrMap,
}

pub(crate) type HIndex = daggy::NodeIndex<u32>;

/// A DAG of typed graphs. No global state: every operation is a method on
/// an owned `Hierarchy<B>` value.
pub struct Hierarchy<B: GraphBackend> {
    backend: B,
    dag: Dag<GraphNode, TypingEdge, u32>,
    by_id: BTreeMap<String, HIndex>,
    config: EngineConfig,
}

impl<B: GraphBackend> Hierarchy<B> {
    pub fn new(backend: B) -> Self {
        Hierarchy { backend, dag: Dag::new(), by_id: BTreeMap::new(), config: EngineConfig::default() }
    }

    pub fn with_config(backend: B, config: EngineConfig) -> Self {
        Hierarchy { backend, dag: Dag::new(), by_id: BTreeMap::new(), config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn index_of(&self, id: &str) -> Result<HIndex, HierarchyError> {
        self.by_id.get(id).copied().ok_or_else(|| HierarchyError::UnknownGraphId(id.to_string()))
    }

    fn handle_of(&self, id: &str) -> Result<GraphHandle, HierarchyError> {
        Ok(self.dag[self.index_of(id)?].handle)
    }

    #[instrument(skip(self, nodes, edges, attrs))]
    pub fn add_graph(
        &mut self,
        id: &str,
        directed: bool,
        nodes: Vec<NodeId>,
        edges: Vec<(NodeId, NodeId)>,
        attrs: AttrMap,
    ) -> Result<(), HierarchyError> {
        if self.by_id.contains_key(id) {
            return Err(HierarchyError::DuplicateGraphId(id.to_string()));
        }
        let handle = self.backend.create_graph(directed);
        for n in nodes {
            self.backend.add_node(handle, n)?;
        }
        for (u, v) in edges {
            self.backend.add_edge(handle, &u, &v)?;
        }
        let idx = self.dag.add_node(GraphNode { id: id.to_string(), handle, attrs });
        self.by_id.insert(id.to_string(), idx);
        debug!(graph = id, "graph added to hierarchy");
        Ok(())
    }

    /// Removes `id` and its typings. With `reconnect`, installs the
    /// composed typing edge for every predecessor-successor pair routed
    /// through `id`, provided it is consistent with every other path now
    /// joining that predecessor to that successor — otherwise the whole
    /// call fails and the hierarchy is left unchanged (never a silent
    /// overwrite).
    #[instrument(skip(self))]
    pub fn remove_graph(&mut self, id: &str, reconnect: bool) -> Result<(), HierarchyError> {
        let idx = self.index_of(id)?;

        if reconnect {
            let preds: Vec<(HIndex, Mapping)> = self
                .dag
                .parents(idx)
                .iter(&self.dag)
                .map(|(e, n)| (n, self.dag[e].mapping.clone()))
                .collect();
            let succs: Vec<(HIndex, Mapping)> = self
                .dag
                .children(idx)
                .iter(&self.dag)
                .map(|(e, n)| (n, self.dag[e].mapping.clone()))
                .collect();

            let mut planned: Vec<(HIndex, HIndex, Mapping)> = Vec::new();
            for (p, p_map) in &preds {
                for (s, s_map) in &succs {
                    let composed = category::compose(p_map, s_map);
                    if let Some(existing) = self.existing_path_mapping(*p, *s, Some(idx)) {
                        if existing != composed {
                            return Err(HierarchyError::PathsDoNotCommute(
                                self.dag[*p].id.clone(),
                                self.dag[*s].id.clone(),
                            ));
                        }
                    }
                    planned.push((*p, *s, composed));
                }
            }
            for (p, s, mapping) in planned {
                let attrs = AttrMap::new();
                // `update_edge` is inherited from the underlying
                // `petgraph::Graph` via `Deref` and always succeeds; it
                // cannot introduce a cycle here since `p` and `s` already
                // coexist in topological order through the node being
                // removed.
                self.dag.update_edge(p, s, TypingEdge { mapping, attrs });
            }
        }

        self.backend.remove_graph(self.dag[idx].handle)?;
        self.dag.remove_node(idx);
        self.by_id.remove(id);
        debug!(graph = id, reconnect, "graph removed from hierarchy");
        Ok(())
    }

    /// Composes the mapping along one existing directed path `from -> to`,
    /// ignoring any path that passes through `exclude`. Returns `None` if
    /// no such path exists yet (nothing to check commutation against).
    fn existing_path_mapping(&self, from: HIndex, to: HIndex, exclude: Option<HIndex>) -> Option<Mapping> {
        fn dfs<B: GraphBackend>(
            h: &Hierarchy<B>,
            current: HIndex,
            to: HIndex,
            exclude: Option<HIndex>,
            acc: &Mapping,
            visiting: &mut std::collections::BTreeSet<HIndex>,
        ) -> Option<Mapping> {
            if current == to {
                return Some(acc.clone());
            }
            if !visiting.insert(current) {
                return None;
            }
            for (edge, child) in h.dag.children(current).iter(&h.dag) {
                if Some(child) == exclude {
                    continue;
                }
                let next = category::compose(acc, &h.dag[edge].mapping);
                if let Some(found) = dfs(h, child, to, exclude, &next, visiting) {
                    visiting.remove(&current);
                    return Some(found);
                }
            }
            visiting.remove(&current);
            None
        }
        let identity_from = category::identity(self.backend.snapshot(self.dag[from].handle).ok()?);
        let mut visiting = std::collections::BTreeSet::new();
        dfs(self, from, to, exclude, &identity_from, &mut visiting)
    }

    /// Inserts a typing edge after verifying `mapping` is a homomorphism and
    /// that adding it preserves commutation of every path pair now joining
    /// `src` to `tgt`. On failure the hierarchy is left exactly as before.
    #[instrument(skip(self, mapping, attrs))]
    pub fn add_typing(
        &mut self,
        src: &str,
        tgt: &str,
        mapping: Mapping,
        attrs: AttrMap,
        check: bool,
    ) -> Result<(), HierarchyError> {
        let check = check && self.config.check_typing_on_add;
        let src_idx = self.index_of(src)?;
        let tgt_idx = self.index_of(tgt)?;

        if check {
            let src_g = self.backend.snapshot(self.dag[src_idx].handle)?;
            let tgt_g = self.backend.snapshot(self.dag[tgt_idx].handle)?;
            category::check_homomorphism(&mapping, src_g, tgt_g)?;

            if let Some(existing) = self.existing_path_mapping(src_idx, tgt_idx, None) {
                if existing != mapping {
                    return Err(HierarchyError::PathsDoNotCommute(src.to_string(), tgt.to_string()));
                }
            }
        }

        self.dag
            .add_edge(src_idx, tgt_idx, TypingEdge { mapping, attrs })
            .map_err(|_| HierarchyError::CycleIntroduced)?;
        debug!(src, tgt, "typing edge added");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn check_typing(&self, src: &str, tgt: &str) -> Result<(), HierarchyError> {
        let src_idx = self.index_of(src)?;
        let tgt_idx = self.index_of(tgt)?;
        let mapping = self
            .existing_path_mapping(src_idx, tgt_idx, None)
            .ok_or_else(|| HierarchyError::PathsDoNotCommute(src.to_string(), tgt.to_string()))?;
        let src_g = self.backend.snapshot(self.dag[src_idx].handle)?;
        let tgt_g = self.backend.snapshot(self.dag[tgt_idx].handle)?;
        category::check_homomorphism(&mapping, src_g, tgt_g)?;
        Ok(())
    }

    /// The current contents of the graph tracked under `id`.
    pub fn graph(&self, id: &str) -> Result<&crate::graph::AttrGraph, HierarchyError> {
        let idx = self.index_of(id)?;
        Ok(self.backend.snapshot(self.dag[idx].handle)?)
    }

    pub fn successors(&self, id: &str) -> Result<Vec<String>, HierarchyError> {
        let idx = self.index_of(id)?;
        Ok(self.dag.children(idx).iter(&self.dag).map(|(_, n)| self.dag[n].id.clone()).collect())
    }

    pub fn predecessors(&self, id: &str) -> Result<Vec<String>, HierarchyError> {
        let idx = self.index_of(id)?;
        Ok(self.dag.parents(idx).iter(&self.dag).map(|(_, n)| self.dag[n].id.clone()).collect())
    }

    /// Applies `rule` at `match_` to the graph `graph_id`, then propagates
    /// the effect up to every predecessor and down to every successor so
    /// all typing homomorphisms remain valid.
    #[instrument(skip(self, rule, match_, rhs_typing, cancel))]
    pub fn rewrite(
        &mut self,
        graph_id: &str,
        rule: &Rule,
        match_: &Mapping,
        rhs_typing: Option<&BTreeMap<String, Mapping>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), HierarchyError> {
        let idx = self.index_of(graph_id)?;
        let handle = self.dag[idx].handle;

        self.backend.begin_tx();
        let before = self.backend.snapshot(handle)?.clone();
        let result = Rewriter::rewrite(rule, &before, match_)?;
        self.backend.replace(handle, result.graph)?;
        self.backend.commit_tx();

        debug!(
            graph = graph_id,
            removed_nodes = result.delta.removed_nodes.len(),
            added_nodes = result.delta.added_nodes.len(),
            merges = result.delta.merge_groups.len(),
            "rewrite applied, propagating"
        );

        propagate::propagate_up(self, idx, &result.g_to_result, &result.delta, cancel)?;

        if !result.delta.merge_groups.is_empty() || !result.delta.added_nodes.is_empty() || !result.delta.added_edges.is_empty() {
            let mut added_node_attrs = BTreeMap::new();
            for n in &result.delta.added_nodes {
                if let Some(rhs_node) = result.rhs_to_result.iter().find(|(_, v)| *v == n).map(|(k, _)| k) {
                    if let Ok(attrs) = rule.rhs.node_attrs(rhs_node) {
                        added_node_attrs.insert(n.clone(), attrs.clone());
                    }
                }
            }
            let mut added_edge_attrs = BTreeMap::new();
            for (u, v) in &result.delta.added_edges {
                let ru = result.rhs_to_result.iter().find(|(_, val)| *val == u).map(|(k, _)| k);
                let rv = result.rhs_to_result.iter().find(|(_, val)| *val == v).map(|(k, _)| k);
                if let (Some(ru), Some(rv)) = (ru, rv) {
                    if let Ok(attrs) = rule.rhs.edge_attrs(ru, rv) {
                        added_edge_attrs.insert((u.clone(), v.clone()), attrs.clone());
                    }
                }
            }
            propagate::propagate_down(self, idx, &result.delta, &added_node_attrs, &added_edge_attrs, rhs_typing, cancel)?;
        } else {
            debug!("rewrite delta has no merges or additions, skipping downward propagation");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn chain() -> Hierarchy<MemoryBackend> {
        let mut h = Hierarchy::new(MemoryBackend::new());
        h.add_graph("T", true, vec!["a".into()], vec![], AttrMap::new()).unwrap();
        h.add_graph("G", true, vec!["1".into(), "2".into()], vec![("1".to_string(), "2".to_string())], AttrMap::new())
            .unwrap();
        let mut mapping = Mapping::new();
        mapping.insert("1".to_string(), "a".to_string());
        mapping.insert("2".to_string(), "a".to_string());
        h.add_typing("G", "T", mapping, AttrMap::new(), true).unwrap();
        h
    }

    #[test]
    fn add_typing_rejects_non_homomorphism() {
        let mut h = Hierarchy::new(MemoryBackend::new());
        h.add_graph("T", true, vec!["a".into()], vec![], AttrMap::new()).unwrap();
        h.add_graph("G", true, vec!["1".into(), "2".into()], vec![("1".to_string(), "2".to_string())], AttrMap::new())
            .unwrap();
        let mut bad = Mapping::new();
        bad.insert("1".to_string(), "a".to_string());
        // "2" has no image: not total.
        let err = h.add_typing("G", "T", bad, AttrMap::new(), true).unwrap_err();
        assert!(matches!(err, HierarchyError::Homomorphism(_)));
    }

    #[test]
    fn successors_and_predecessors() {
        let h = chain();
        assert_eq!(h.successors("G").unwrap(), vec!["T".to_string()]);
        assert_eq!(h.predecessors("T").unwrap(), vec!["G".to_string()]);
    }

    #[test]
    fn rewrite_propagates_node_removal_upward() {
        let mut h = chain();
        let pattern = h.backend().snapshot(h.handle_of("G").unwrap()).unwrap().clone();
        let mut rule = Rule::identity(pattern);
        rule.remove_node("2").unwrap();

        let m = category::identity(h.backend().snapshot(h.handle_of("G").unwrap()).unwrap());
        h.rewrite("G", &rule, &m, None, None).unwrap();

        let g_after = h.backend().snapshot(h.handle_of("G").unwrap()).unwrap();
        assert!(!g_after.has_node("2"));
        // T's node "a" is typed by both 1 and 2; after 2's removal, T must
        // still type-check against the smaller G.
        h.check_typing("G", "T").unwrap();
    }
}
