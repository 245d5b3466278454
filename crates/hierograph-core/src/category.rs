//! The category-theoretic kernel: homomorphism checking, composition,
//! pullback, pushout and pullback-complement over [`AttrGraph`]s.
//!
//! Every construction here is a pure function of its graph and mapping
//! arguments — no graph store, no hierarchy state — so `Rule`, `Rewriter`
//! and `Hierarchy` can all share one implementation of the math.

use std::collections::{BTreeMap, BTreeSet};

use crate::attr::attrs_intersect;
use crate::error::{InvalidHomomorphism, RuleError};
use crate::graph::{AttrGraph, NodeId};

/// A node map between two graphs. Total over its stated domain is a
/// precondition of `check_homomorphism`, not of the type itself.
pub type Mapping = BTreeMap<NodeId, NodeId>;

/// Verifies `h` is a homomorphism `a -> b`: total on `N(a)`, every edge has
/// an image edge in `b`, and attributes are preserved by subset.
pub fn check_homomorphism(h: &Mapping, a: &AttrGraph, b: &AttrGraph) -> Result<(), InvalidHomomorphism> {
    for n in a.nodes() {
        let image = h.get(n).ok_or_else(|| InvalidHomomorphism::NotTotal(n.clone()))?;
        if !b.has_node(image) {
            return Err(InvalidHomomorphism::NotTotal(n.clone()));
        }
        let a_attrs = a.node_attrs(n).expect("node listed by a.nodes() must exist");
        let b_attrs = b.node_attrs(image).expect("checked has_node above");
        if !crate::attr::attrs_subset(a_attrs, b_attrs) {
            return Err(InvalidHomomorphism::NodeAttrNotSubset(n.clone()));
        }
    }
    for (u, v) in a.edges() {
        let (iu, iv) = (
            h.get(u).ok_or_else(|| InvalidHomomorphism::NotTotal(u.clone()))?,
            h.get(v).ok_or_else(|| InvalidHomomorphism::NotTotal(v.clone()))?,
        );
        if !b.has_edge(iu, iv) {
            return Err(InvalidHomomorphism::MissingEdgeImage(u.clone(), v.clone()));
        }
        let a_attrs = a.edge_attrs(u, v).expect("edge listed by a.edges() must exist");
        let b_attrs = b.edge_attrs(iu, iv).expect("checked has_edge above");
        if !crate::attr::attrs_subset(a_attrs, b_attrs) {
            return Err(InvalidHomomorphism::EdgeAttrNotSubset(u.clone(), v.clone()));
        }
    }
    Ok(())
}

/// `f: A -> B` followed by `g: B -> C`, giving `A -> C`.
pub fn compose(f: &Mapping, g: &Mapping) -> Mapping {
    f.iter()
        .filter_map(|(a, b)| g.get(b).map(|c| (a.clone(), c.clone())))
        .collect()
}

/// The identity homomorphism of a graph onto itself.
pub fn identity(a: &AttrGraph) -> Mapping {
    a.nodes().map(|n| (n.clone(), n.clone())).collect()
}

/// `h` restricted to the given subset of its domain.
pub fn restrict(h: &Mapping, domain: &BTreeSet<NodeId>) -> Mapping {
    h.iter()
        .filter(|(k, _)| domain.contains(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn pullback_node_id(b: &str, c: &str) -> NodeId {
    format!("{}×{}", b, c)
}

/// The categorical pullback of `h: b -> d` and `k: c -> d`.
///
/// Returns `(a, a_b, a_c)` where `a_b: a -> b` and `a_c: a -> c`, with
/// `h ∘ a_b == k ∘ a_c`.
pub fn pullback(b: &AttrGraph, c: &AttrGraph, h: &Mapping, k: &Mapping) -> (AttrGraph, Mapping, Mapping) {
    let mut a = AttrGraph::new(b.directed());
    let mut a_b = Mapping::new();
    let mut a_c = Mapping::new();

    let mut pairs: Vec<(NodeId, NodeId)> = Vec::new();
    for bn in b.nodes() {
        let Some(hb) = h.get(bn) else { continue };
        for cn in c.nodes() {
            if k.get(cn) == Some(hb) {
                pairs.push((bn.clone(), cn.clone()));
            }
        }
    }

    for (bn, cn) in &pairs {
        let id = pullback_node_id(bn, cn);
        let attrs = attrs_intersect(b.node_attrs(bn).unwrap(), c.node_attrs(cn).unwrap());
        a.add_node_with_attrs(id.clone(), attrs).expect("pair ids are unique by construction");
        a_b.insert(id.clone(), bn.clone());
        a_c.insert(id, cn.clone());
    }

    for (bn1, cn1) in &pairs {
        for (bn2, cn2) in &pairs {
            if b.has_edge(bn1, bn2) && c.has_edge(cn1, cn2) {
                let u = pullback_node_id(bn1, cn1);
                let v = pullback_node_id(bn2, cn2);
                if !a.has_edge(&u, &v) {
                    a.add_edge(&u, &v).expect("both endpoints were just added");
                    let attrs = attrs_intersect(b.edge_attrs(bn1, bn2).unwrap(), c.edge_attrs(cn1, cn2).unwrap());
                    for (key, val) in attrs {
                        a.update_edge_attrs(&u, &v, &key, val).unwrap();
                    }
                }
            }
        }
    }

    (a, a_b, a_c)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    B,
    C,
}

/// A minimal union-find over tagged `(Side, NodeId)` elements, used by
/// [`pushout`] to compute the quotient identifying `h(a) ~ k(a)`.
struct UnionFind {
    parent: BTreeMap<(Side, NodeId), (Side, NodeId)>,
}

impl UnionFind {
    fn new() -> Self {
        UnionFind { parent: BTreeMap::new() }
    }

    fn make(&mut self, x: (Side, NodeId)) {
        self.parent.entry(x.clone()).or_insert(x);
    }

    fn find(&mut self, x: (Side, NodeId)) -> (Side, NodeId) {
        let p = self.parent.get(&x).cloned().unwrap_or_else(|| x.clone());
        if p == x {
            x
        } else {
            let root = self.find(p);
            self.parent.insert(x, root.clone());
            root
        }
    }

    fn union(&mut self, x: (Side, NodeId), y: (Side, NodeId)) {
        self.make(x.clone());
        self.make(y.clone());
        let (rx, ry) = (self.find(x), self.find(y));
        if rx != ry {
            // Deterministic: the smaller element (by derived Ord) becomes root.
            if rx < ry {
                self.parent.insert(ry, rx);
            } else {
                self.parent.insert(rx, ry);
            }
        }
    }
}

/// The categorical pushout of `h: a -> b` and `k: a -> c`.
///
/// Returns `(d, b_d, c_d)` where `b_d: b -> d` and `c_d: c -> d`, with
/// `b_d ∘ h == c_d ∘ k`. Node identity in `b` and `c` is quotiented by the
/// least equivalence relation identifying `h(n) ~ k(n)` for every `n` in `a`.
pub fn pushout(a: &AttrGraph, b: &AttrGraph, c: &AttrGraph, h: &Mapping, k: &Mapping) -> (AttrGraph, Mapping, Mapping) {
    let mut uf = UnionFind::new();
    for n in b.nodes() {
        uf.make((Side::B, n.clone()));
    }
    for n in c.nodes() {
        uf.make((Side::C, n.clone()));
    }
    for n in a.nodes() {
        if let (Some(hb), Some(kc)) = (h.get(n), k.get(n)) {
            uf.union((Side::B, hb.clone()), (Side::C, kc.clone()));
        }
    }

    // Representative id per class: the lexicographically smallest member id
    // across both sides, so the choice is deterministic and independent of
    // traversal order.
    let mut class_members: BTreeMap<(Side, NodeId), Vec<NodeId>> = BTreeMap::new();
    for n in b.nodes() {
        let root = uf.find((Side::B, n.clone()));
        class_members.entry(root).or_default().push(n.clone());
    }
    for n in c.nodes() {
        let root = uf.find((Side::C, n.clone()));
        class_members.entry(root).or_default().push(n.clone());
    }
    let mut rep_of_root: BTreeMap<(Side, NodeId), NodeId> = BTreeMap::new();
    for (root, members) in &class_members {
        let rep = members.iter().min().cloned().unwrap();
        rep_of_root.insert(root.clone(), rep);
    }

    let mut d = AttrGraph::new(b.directed());
    let mut b_d = Mapping::new();
    let mut c_d = Mapping::new();

    for n in b.nodes() {
        let root = uf.find((Side::B, n.clone()));
        let rep = rep_of_root.get(&root).unwrap().clone();
        if !d.has_node(&rep) {
            d.add_node(rep.clone()).unwrap();
        }
        let attrs = b.node_attrs(n).unwrap().clone();
        for (key, val) in attrs {
            d.add_node_attrs(&rep, &key, val).unwrap();
        }
        b_d.insert(n.clone(), rep);
    }
    for n in c.nodes() {
        let root = uf.find((Side::C, n.clone()));
        let rep = rep_of_root.get(&root).unwrap().clone();
        if !d.has_node(&rep) {
            d.add_node(rep.clone()).unwrap();
        }
        let attrs = c.node_attrs(n).unwrap().clone();
        for (key, val) in attrs {
            d.add_node_attrs(&rep, &key, val).unwrap();
        }
        c_d.insert(n.clone(), rep);
    }

    for (u, v) in b.edges() {
        let (du, dv) = (b_d[u].clone(), b_d[v].clone());
        if !d.has_edge(&du, &dv) {
            d.add_edge(&du, &dv).unwrap();
        }
        let attrs = b.edge_attrs(u, v).unwrap().clone();
        for (key, val) in attrs {
            d.add_edge_attrs(&du, &dv, &key, val).unwrap();
        }
    }
    for (u, v) in c.edges() {
        let (du, dv) = (c_d[u].clone(), c_d[v].clone());
        if !d.has_edge(&du, &dv) {
            d.add_edge(&du, &dv).unwrap();
        }
        let attrs = c.edge_attrs(u, v).unwrap().clone();
        for (key, val) in attrs {
            d.add_edge_attrs(&du, &dv, &key, val).unwrap();
        }
    }

    (d, b_d, c_d)
}

/// The pullback-complement of `p_l: p -> l` followed by the match
/// `l_g: l -> g`, used by the [`Rewriter`](crate::rewrite::Rewriter) to
/// compute the "left-hand complement" `g_m`: `g` with exactly the
/// `l`-only material removed, except what `p` preserves, plus clones where
/// `p` covers an `l`-node multiple times.
///
/// Returns `(g_m, p_m, m_g)` with `p_m: p -> g_m` and `m_g: g_m -> g`.
pub fn pullback_complement(
    p: &AttrGraph,
    l: &AttrGraph,
    g: &AttrGraph,
    p_l: &Mapping,
    l_g: &Mapping,
) -> Result<(AttrGraph, Mapping, Mapping), RuleError> {
    check_homomorphism(p_l, p, l)?;
    check_homomorphism(l_g, l, g)?;

    let mut preimages: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for pn in p.nodes() {
        preimages.entry(p_l[pn].clone()).or_default().push(pn.clone());
    }

    let mut gm = g.clone();
    let mut p_m: Mapping = Mapping::new();
    let mut m_g: Mapping = Mapping::new();
    // For every l-node, the list of its surviving copies in g_m, in the same
    // order as its preimages in `preimages`.
    let mut copies_of: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();

    // Clone pass: every l-node with k >= 1 preimages gets k copies.
    for ln in l.nodes() {
        let gn = &l_g[ln];
        let empty = Vec::new();
        let pre = preimages.get(ln).unwrap_or(&empty);
        if pre.is_empty() {
            continue;
        }
        let mut copies = vec![gn.clone()];
        for i in 1..pre.len() {
            let new_id = format!("{}~{}", gn, i);
            gm.clone_node(gn, new_id.clone())?;
            m_g.insert(new_id.clone(), gn.clone());
            copies.push(new_id);
        }
        m_g.entry(gn.clone()).or_insert_with(|| gn.clone());
        for (pn, copy) in pre.iter().zip(copies.iter()) {
            p_m.insert(pn.clone(), copy.clone());
        }
        copies_of.insert(ln.clone(), copies);
    }

    // Delete pass: every l-node with zero preimages is removed outright.
    for ln in l.nodes() {
        if !preimages.contains_key(ln) {
            let gn = l_g[ln].clone();
            if gm.has_node(&gn) {
                gm.remove_node(&gn)?;
            }
        }
    }

    // Edge pass: for every l-edge, keep exactly the clone-copy combinations
    // backed by an actual p-edge preimage; drop the rest.
    let p_edges: BTreeSet<(NodeId, NodeId)> = p.edges().map(|(u, v)| (u.clone(), v.clone())).collect();
    for (lu, lv) in l.edges() {
        let (Some(cu), Some(cv)) = (copies_of.get(lu), copies_of.get(lv)) else {
            // One endpoint had zero preimages: its node (and every incident
            // edge) was already removed above.
            continue;
        };
        let empty = Vec::new();
        let pre_u = preimages.get(lu).unwrap_or(&empty);
        let pre_v = preimages.get(lv).unwrap_or(&empty);
        for (i, pu) in pre_u.iter().enumerate() {
            for (j, pv) in pre_v.iter().enumerate() {
                let has_p_edge = p_edges.contains(&(pu.clone(), pv.clone()));
                if !has_p_edge && gm.has_edge(&cu[i], &cv[j]) {
                    gm.remove_edge(&cu[i], &cv[j])?;
                }
            }
        }
    }

    Ok((gm, p_m, m_g))
}
