//! The sesqui-pushout (SqPO) rewriter: pullback-complement on the left,
//! pushout on the right, with cloning permitted.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::category::{self, Mapping};
use crate::error::RuleError;
use crate::graph::{AttrGraph, NodeId};
use crate::rule::Rule;

/// A summary of everything a rewrite changed, threaded into
/// [`Hierarchy::rewrite`](crate::hierarchy::Hierarchy::rewrite) so
/// propagation can repair typing homomorphisms without recomputing the
/// diff between the graph before and after.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteDelta {
    /// Original-graph nodes with no surviving image anywhere in the result.
    pub removed_nodes: Vec<NodeId>,
    /// Original-graph edges between surviving nodes with no surviving
    /// image edge.
    pub removed_edges: Vec<(NodeId, NodeId)>,
    /// `(original_node, clone_ids)` for every original node cloned by the
    /// rule's left-hand side (`clone_ids` includes the original's own id
    /// as its first element).
    pub clone_groups: Vec<(NodeId, Vec<NodeId>)>,
    /// `(original_node_ids, merged_into)` for every set of nodes the
    /// rule's right-hand side merged together.
    pub merge_groups: Vec<(Vec<NodeId>, NodeId)>,
    /// Right-hand-side nodes with no preserved-part preimage, and their id
    /// in the result graph.
    pub added_nodes: Vec<NodeId>,
    /// Result-graph edges introduced by the right-hand side with no
    /// preserved-part preimage.
    pub added_edges: Vec<(NodeId, NodeId)>,
}

/// The outcome of one [`Rewriter::rewrite`] call.
pub struct RewriteResult {
    pub graph: AttrGraph,
    /// `rhs -> result`, a homomorphism from the rule's right-hand side.
    pub rhs_to_result: Mapping,
    /// `g_m -> result`, the gluing map from the pullback-complement.
    pub gm_to_result: Mapping,
    /// `original_g -> result`, the net effect on every surviving node of
    /// the matched graph (composition of `m_g: g_m -> g` inverted through
    /// `gm_to_result`, restricted to surviving material).
    pub g_to_result: Mapping,
    pub delta: RewriteDelta,
}

/// Implements the sesqui-pushout rewriting step of §4.E.
pub struct Rewriter;

impl Rewriter {
    /// Applies `rule` to `graph` at the match `m: lhs -> graph`.
    #[instrument(skip(rule, graph, m))]
    pub fn rewrite(rule: &Rule, graph: &AttrGraph, m: &Mapping) -> Result<RewriteResult, RuleError> {
        let (g_m, p_m, m_g) = category::pullback_complement(&rule.p, &rule.lhs, graph, &rule.p_lhs, m)?;
        debug!(gm_nodes = g_m.node_count(), "pullback-complement computed");

        let (result, gm_to_result, rhs_to_result) =
            category::pushout(&rule.p, &g_m, &rule.rhs, &p_m, &rule.p_rhs);
        debug!(result_nodes = result.node_count(), "pushout computed");

        let mut g_to_result = Mapping::new();
        for (gm_node, g_node) in &m_g {
            if let Some(result_node) = gm_to_result.get(gm_node) {
                g_to_result.insert(g_node.clone(), result_node.clone());
            }
        }

        let delta = compute_delta(rule, graph, &g_m, &p_m, &m_g, &gm_to_result, &rhs_to_result);

        Ok(RewriteResult { graph: result, rhs_to_result, gm_to_result, g_to_result, delta })
    }
}

fn compute_delta(
    rule: &Rule,
    graph: &AttrGraph,
    g_m: &AttrGraph,
    p_m: &Mapping,
    m_g: &Mapping,
    gm_to_result: &Mapping,
    rhs_to_result: &Mapping,
) -> RewriteDelta {
    let mut clone_groups_by_original: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for gm_node in g_m.nodes() {
        if let Some(original) = m_g.get(gm_node) {
            clone_groups_by_original.entry(original.clone()).or_default().push(gm_node.clone());
        }
    }
    let clone_groups: Vec<(NodeId, Vec<NodeId>)> = clone_groups_by_original
        .into_iter()
        .filter(|(_, copies)| copies.len() > 1)
        .map(|(original, mut copies)| {
            copies.sort();
            (original, copies)
        })
        .collect();

    let surviving: std::collections::BTreeSet<NodeId> = m_g.values().cloned().collect();
    let removed_nodes: Vec<NodeId> = graph.nodes().filter(|n| !surviving.contains(*n)).cloned().collect();

    let mut removed_edges = Vec::new();
    for (u, v) in graph.edges() {
        if !surviving.contains(u) || !surviving.contains(v) {
            continue;
        }
        let copies_u: Vec<&NodeId> = m_g.iter().filter(|(_, orig)| *orig == u).map(|(gm, _)| gm).collect();
        let copies_v: Vec<&NodeId> = m_g.iter().filter(|(_, orig)| *orig == v).map(|(gm, _)| gm).collect();
        let still_present = copies_u.iter().any(|cu| copies_v.iter().any(|cv| g_m.has_edge(cu, cv)));
        if !still_present {
            removed_edges.push((u.clone(), v.clone()));
        }
    }

    let mut p_rhs_preimages: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for (p_node, r_node) in &rule.p_rhs {
        p_rhs_preimages.entry(r_node.clone()).or_default().push(p_node.clone());
    }
    let mut merge_groups = Vec::new();
    for (r_node, p_nodes) in &p_rhs_preimages {
        if p_nodes.len() > 1 {
            let originals: Vec<NodeId> = p_nodes.iter().filter_map(|pn| p_m.get(pn)).cloned().collect();
            if let Some(merged_into) = rhs_to_result.get(r_node) {
                merge_groups.push((originals, merged_into.clone()));
            }
        }
    }

    let p_rhs_images: std::collections::BTreeSet<&NodeId> = rule.p_rhs.values().collect();
    let added_nodes: Vec<NodeId> = rule
        .rhs
        .nodes()
        .filter(|n| !p_rhs_images.contains(n))
        .filter_map(|n| rhs_to_result.get(n))
        .cloned()
        .collect();

    let p_edges: std::collections::BTreeSet<(NodeId, NodeId)> = rule
        .p
        .edges()
        .filter_map(|(u, v)| Some((rule.p_rhs.get(u)?.clone(), rule.p_rhs.get(v)?.clone())))
        .collect();
    let added_edges: Vec<(NodeId, NodeId)> = rule
        .rhs
        .edges()
        .filter(|(u, v)| !p_edges.contains(&((*u).clone(), (*v).clone())))
        .filter_map(|(u, v)| Some((rhs_to_result.get(u)?.clone(), rhs_to_result.get(v)?.clone())))
        .collect();

    RewriteDelta { removed_nodes, removed_edges, clone_groups, merge_groups, added_nodes, added_edges }
}
