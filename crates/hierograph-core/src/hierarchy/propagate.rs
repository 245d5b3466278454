//! Upward and downward propagation: the repair that keeps every typing
//! homomorphism valid after a local rewrite, driven by an explicit
//! topologically-ordered worklist rather than naive recursion.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use daggy::Walker;
use petgraph::Direction;
use tracing::debug;

use crate::attr::AttrMap;
use crate::backend::GraphBackend;
use crate::category::Mapping;
use crate::error::HierarchyError;
use crate::graph::NodeId;
use crate::rewrite::RewriteDelta;
use crate::util::induced_stream_toposort;

use super::{HIndex, Hierarchy};

/// A thin cooperative-cancellation handle: propagation checks it between
/// graphs and aborts before starting the next one. Cloning shares the same
/// flag, so a caller can hold one end and cancel from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn check_cancelled<B: GraphBackend>(
    h: &Hierarchy<B>,
    node: HIndex,
    cancel: Option<&CancellationToken>,
) -> Result<(), HierarchyError> {
    if let Some(token) = cancel {
        if token.is_cancelled() {
            return Err(HierarchyError::Cancelled(h.dag[node].id.clone()));
        }
    }
    Ok(())
}

// --- upward: removed-node, removed-edge, clone ----------------------------

#[derive(Clone, Debug, Default)]
struct UpDelta {
    removed_nodes: Vec<NodeId>,
    removed_edges: Vec<(NodeId, NodeId)>,
    clone_groups: Vec<(NodeId, Vec<NodeId>)>,
    /// Renames surviving nodes' images for the level this delta targets
    /// directly (only populated at the seed level, where the rewrite's own
    /// pushout may have renamed a surviving node via a merge internal to
    /// the rewritten graph itself).
    id_rename: Mapping,
}

pub(super) fn propagate_up<B: GraphBackend>(
    h: &mut Hierarchy<B>,
    start: HIndex,
    g_to_result: &Mapping,
    delta: &RewriteDelta,
    cancel: Option<&CancellationToken>,
) -> Result<(), HierarchyError> {
    let order = induced_stream_toposort(&h.dag, &[start], Direction::Incoming, |_| true)?;

    let seed = UpDelta {
        removed_nodes: delta.removed_nodes.clone(),
        removed_edges: delta.removed_edges.clone(),
        clone_groups: delta.clone_groups.clone(),
        id_rename: g_to_result.clone(),
    };
    let mut pending: BTreeMap<HIndex, Vec<(HIndex, UpDelta)>> = BTreeMap::new();
    for (_, parent) in h.dag.parents(start).iter(&h.dag) {
        pending.entry(parent).or_default().push((start, seed.clone()));
    }

    for node in order.into_iter().skip(1) {
        let Some(incoming) = pending.remove(&node) else { continue };
        check_cancelled(h, node, cancel)?;

        let mut combined = UpDelta::default();
        for (child, child_delta) in &incoming {
            let repaired = repair_predecessor(h, node, *child, child_delta)?;
            combined.removed_nodes.extend(repaired.removed_nodes);
            combined.removed_edges.extend(repaired.removed_edges);
            combined.clone_groups.extend(repaired.clone_groups);
        }
        debug!(graph = %h.dag[node].id, "upward propagation repaired");

        for (_, parent) in h.dag.parents(node).iter(&h.dag) {
            pending.entry(parent).or_default().push((node, combined.clone()));
        }
    }
    Ok(())
}

fn repair_predecessor<B: GraphBackend>(
    h: &mut Hierarchy<B>,
    t_idx: HIndex,
    g_idx: HIndex,
    delta: &UpDelta,
) -> Result<UpDelta, HierarchyError> {
    let edge_idx = h
        .dag
        .find_edge(t_idx, g_idx)
        .expect("t_idx was reached as a parent of g_idx, so the edge exists");
    let old_h = h.dag.edge_weight(edge_idx).unwrap().mapping.clone();
    let t_handle = h.dag[t_idx].handle;
    let mut t_graph = h.backend.snapshot(t_handle)?.clone();

    let removed_set: BTreeSet<&NodeId> = delta.removed_nodes.iter().collect();
    let removed_edge_set: BTreeSet<(&NodeId, &NodeId)> =
        delta.removed_edges.iter().map(|(u, v)| (u, v)).collect();

    let mut out = UpDelta::default();

    // 1. removed-node repair
    for t in t_graph.nodes().cloned().collect::<Vec<_>>() {
        if let Some(g_node) = old_h.get(&t) {
            if removed_set.contains(g_node) {
                t_graph.remove_node(&t)?;
                out.removed_nodes.push(t);
            }
        }
    }

    // 2. removed-edge repair
    for (u, v) in t_graph.edges().map(|(u, v)| (u.clone(), v.clone())).collect::<Vec<_>>() {
        if let (Some(gu), Some(gv)) = (old_h.get(&u), old_h.get(&v)) {
            if removed_edge_set.contains(&(gu, gv)) {
                t_graph.remove_edge(&u, &v)?;
                out.removed_edges.push((u, v));
            }
        }
    }

    // 3. clone repair: replicate per surviving combination. `clone_node`
    // duplicates a node's *current* incident edges, so cloning every
    // affected node of `t_graph` in turn (rather than computing the cross
    // product by hand) already produces an edge for every pair of clones
    // that the original edge's endpoints were cloned into.
    let mut new_h = Mapping::new();
    for (original, copies) in &delta.clone_groups {
        let ts: Vec<NodeId> =
            t_graph.nodes().filter(|t| old_h.get(*t) == Some(original)).cloned().collect();
        for t in ts {
            let mut group = vec![t.clone()];
            for (i, _) in copies.iter().enumerate().skip(1) {
                let new_id = format!("{t}~{i}");
                t_graph.clone_node(&t, new_id.clone())?;
                group.push(new_id);
            }
            for (g_copy, t_copy) in copies.iter().zip(group.iter()) {
                new_h.insert(t_copy.clone(), g_copy.clone());
            }
            out.clone_groups.push((t, group));
        }
    }

    // Every remaining surviving node keeps its old image, renamed through
    // the seed level's `id_rename` if the rewrite's own pushout merged it.
    for t in t_graph.nodes() {
        if new_h.contains_key(t) {
            continue;
        }
        if let Some(g_node) = old_h.get(t) {
            let renamed = delta.id_rename.get(g_node).cloned().unwrap_or_else(|| g_node.clone());
            new_h.insert(t.clone(), renamed);
        }
    }

    h.backend.replace(t_handle, t_graph)?;
    h.dag.edge_weight_mut(edge_idx).unwrap().mapping = new_h;

    Ok(out)
}

// --- downward: merge, added-node, added-edge ------------------------------

#[derive(Clone, Debug, Default)]
struct DownDelta {
    merge_groups: Vec<(Vec<NodeId>, NodeId)>,
    added_nodes: Vec<NodeId>,
    added_edges: Vec<(NodeId, NodeId)>,
    added_node_attrs: BTreeMap<NodeId, AttrMap>,
    added_edge_attrs: BTreeMap<(NodeId, NodeId), AttrMap>,
    /// Caller-supplied images (keyed by result-graph node id) for added
    /// nodes, honored instead of minting a fresh node in the successor.
    explicit_images: BTreeMap<NodeId, NodeId>,
}

pub(super) fn propagate_down<B: GraphBackend>(
    h: &mut Hierarchy<B>,
    start: HIndex,
    delta: &RewriteDelta,
    added_node_attrs: &BTreeMap<NodeId, AttrMap>,
    added_edge_attrs: &BTreeMap<(NodeId, NodeId), AttrMap>,
    rhs_typing: Option<&BTreeMap<String, Mapping>>,
    cancel: Option<&CancellationToken>,
) -> Result<(), HierarchyError> {
    let order = induced_stream_toposort(&h.dag, &[start], Direction::Outgoing, |_| true)?;

    let seed = DownDelta {
        merge_groups: delta.merge_groups.clone(),
        added_nodes: delta.added_nodes.clone(),
        added_edges: delta.added_edges.clone(),
        added_node_attrs: added_node_attrs.clone(),
        added_edge_attrs: added_edge_attrs.clone(),
    };
    let mut pending: BTreeMap<HIndex, Vec<(HIndex, DownDelta)>> = BTreeMap::new();
    for (_, child) in h.dag.children(start).iter(&h.dag) {
        let mut seeded = seed.clone();
        if let Some(hint) = rhs_typing.and_then(|m| m.get(&h.dag[child].id)) {
            seeded.explicit_images = hint.clone();
        }
        pending.entry(child).or_default().push((start, seeded));
    }

    for node in order.into_iter().skip(1) {
        let Some(incoming) = pending.remove(&node) else { continue };
        check_cancelled(h, node, cancel)?;

        let mut combined = DownDelta::default();
        for (parent, parent_delta) in &incoming {
            let repaired = repair_successor(h, node, *parent, parent_delta)?;
            combined.merge_groups.extend(repaired.merge_groups);
            combined.added_nodes.extend(repaired.added_nodes);
            combined.added_edges.extend(repaired.added_edges);
            combined.added_node_attrs.extend(repaired.added_node_attrs);
            combined.added_edge_attrs.extend(repaired.added_edge_attrs);
        }
        debug!(graph = %h.dag[node].id, "downward propagation repaired");

        if combined.merge_groups.is_empty() && combined.added_nodes.is_empty() && combined.added_edges.is_empty() {
            continue;
        }
        for (_, child) in h.dag.children(node).iter(&h.dag) {
            pending.entry(child).or_default().push((node, combined.clone()));
        }
    }
    Ok(())
}

fn repair_successor<B: GraphBackend>(
    h: &mut Hierarchy<B>,
    u_idx: HIndex,
    g_idx: HIndex,
    delta: &DownDelta,
) -> Result<DownDelta, HierarchyError> {
    let edge_idx = h
        .dag
        .find_edge(g_idx, u_idx)
        .expect("g_idx was reached as a child's parent, so the edge exists");
    let mut new_h = h.dag.edge_weight(edge_idx).unwrap().mapping.clone();
    let u_handle = h.dag[u_idx].handle;
    let mut u_graph = h.backend.snapshot(u_handle)?.clone();

    let mut out = DownDelta::default();

    // 1. merge repair
    for (originals, merged_into) in &delta.merge_groups {
        let images: Vec<NodeId> = originals.iter().filter_map(|o| new_h.get(o).cloned()).collect();
        let mut distinct: Vec<NodeId> = Vec::new();
        for img in &images {
            if !distinct.contains(img) {
                distinct.push(img.clone());
            }
        }
        let merged_u = if distinct.len() > 1 {
            let name = distinct.join("_");
            u_graph.merge_nodes(&distinct, name.clone())?;
            name
        } else if let Some(only) = distinct.into_iter().next() {
            only
        } else {
            continue;
        };
        for o in originals {
            new_h.remove(o);
        }
        new_h.insert(merged_into.clone(), merged_u.clone());
        out.merge_groups.push((vec![merged_u.clone()], merged_u));
    }

    // 2. added-node repair
    for added in &delta.added_nodes {
        if new_h.contains_key(added) {
            continue;
        }
        let attrs = delta.added_node_attrs.get(added).cloned().unwrap_or_default();
        let image = if let Some(hinted) = delta.explicit_images.get(added) {
            hinted.clone()
        } else {
            if !u_graph.has_node(added) {
                u_graph.add_node_with_attrs(added.clone(), attrs.clone())?;
            }
            added.clone()
        };
        new_h.insert(added.clone(), image.clone());
        out.added_nodes.push(image.clone());
        out.added_node_attrs.insert(image, attrs);
    }

    // 3. added-edge repair
    for (ru, rv) in &delta.added_edges {
        let (Some(iu), Some(iv)) = (new_h.get(ru).cloned(), new_h.get(rv).cloned()) else {
            continue;
        };
        if !u_graph.has_edge(&iu, &iv) {
            u_graph.add_edge(&iu, &iv)?;
        }
        let attrs = delta.added_edge_attrs.get(&(ru.clone(), rv.clone())).cloned().unwrap_or_default();
        for (key, val) in &attrs {
            u_graph.update_edge_attrs(&iu, &iv, key, val.clone())?;
        }
        out.added_edge_attrs.insert((iu.clone(), iv.clone()), attrs);
        out.added_edges.push((iu, iv));
    }

    h.backend.replace(u_handle, u_graph)?;
    h.dag.edge_weight_mut(edge_idx).unwrap().mapping = new_h;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::category;
    use crate::rule::Rule;

    fn setup() -> (Hierarchy<MemoryBackend>, crate::graph::AttrGraph) {
        let mut h = Hierarchy::new(MemoryBackend::new());
        h.add_graph("T", true, vec!["alpha".into(), "beta".into()], vec![("alpha".into(), "beta".into())], AttrMap::new())
            .unwrap();
        h.add_graph("G", true, vec!["1".into(), "2".into()], vec![("1".into(), "2".into())], AttrMap::new())
            .unwrap();
        let mut mapping = Mapping::new();
        mapping.insert("alpha".to_string(), "1".to_string());
        mapping.insert("beta".to_string(), "1".to_string());
        h.add_typing("T", "G", mapping, AttrMap::new(), true).unwrap();
        let g = h.backend().snapshot(h.handle_of("G").unwrap()).unwrap().clone();
        (h, g)
    }

    #[test]
    fn clone_propagates_upward_with_edge_replicated() {
        let (mut h, g) = setup();
        let mut rule = Rule::identity(g.clone());
        rule.clone_node("1", Some("1b".to_string())).unwrap();

        let m = category::identity(&g);
        h.rewrite("G", &rule, &m, None, None).unwrap();

        let t_graph = h.backend().snapshot(h.handle_of("T").unwrap()).unwrap();
        // alpha and beta both typed onto "1", so both must have been cloned.
        assert_eq!(t_graph.node_count(), 4);
    }

    #[test]
    fn merge_propagates_downward() {
        let mut h = Hierarchy::new(MemoryBackend::new());
        h.add_graph("G", true, vec!["1".into(), "2".into()], vec![], AttrMap::new()).unwrap();
        h.add_graph("U", true, vec!["x".into(), "y".into()], vec![], AttrMap::new()).unwrap();
        let mut mapping = Mapping::new();
        mapping.insert("1".to_string(), "x".to_string());
        mapping.insert("2".to_string(), "y".to_string());
        h.add_typing("G", "U", mapping, AttrMap::new(), true).unwrap();

        let g = h.backend().snapshot(h.handle_of("G").unwrap()).unwrap().clone();
        let mut rule = Rule::identity(g.clone());
        rule.merge_nodes("1", "2", Some("m".to_string())).unwrap();
        let m = category::identity(&g);
        h.rewrite("G", &rule, &m, None, None).unwrap();

        let u_graph = h.backend().snapshot(h.handle_of("U").unwrap()).unwrap();
        assert_eq!(u_graph.node_count(), 1);
    }
}
