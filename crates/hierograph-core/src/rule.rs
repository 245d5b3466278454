//! A rewriting rule as a span of graphs `L <- P -> R`, with the algebra of
//! local edits that keep the span coherent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::attr::{AttrMap, IntoAttrValue};
use crate::category::{self, Mapping};
use crate::command::Command;
use crate::error::RuleError;
use crate::graph::{AttrGraph, NodeId};

fn preimages(map: &Mapping, target: &str) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = map.iter().filter(|(_, v)| v.as_str() == target).map(|(k, _)| k.clone()).collect();
    out.sort();
    out
}

/// A rewriting rule: `p` is the preserved part, `lhs` the pattern matched
/// against a target graph, `rhs` the replacement; `p_lhs`/`p_rhs` are the two
/// legs of the span, each a homomorphism out of `p`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    pub lhs: AttrGraph,
    pub p: AttrGraph,
    pub rhs: AttrGraph,
    pub p_lhs: Mapping,
    pub p_rhs: Mapping,
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.lhs == other.lhs && self.p == other.p && self.rhs == other.rhs && self.p_lhs == other.p_lhs && self.p_rhs == other.p_rhs
    }
}
impl Eq for Rule {}

impl Rule {
    /// A rule with `p = lhs = rhs` and identity legs: the identity rule for
    /// `pattern`, ready to be mutated by the edit operations below.
    pub fn identity(pattern: AttrGraph) -> Self {
        let p_lhs = category::identity(&pattern);
        let p_rhs = p_lhs.clone();
        Rule {
            lhs: pattern.clone(),
            p: pattern.clone(),
            rhs: pattern,
            p_lhs,
            p_rhs,
        }
    }

    /// Builds a rule from a pattern plus an ordered list of edit commands,
    /// canonicalized (clones, then deletes, then merges, then additions,
    /// then attribute edits — a stable partition, so relative order within
    /// one group is preserved) before being applied.
    #[instrument(skip(commands))]
    pub fn from_transform(pattern: AttrGraph, commands: Vec<Command>) -> Result<Self, RuleError> {
        let mut rule = Rule::identity(pattern);
        for command in Command::canonicalize(commands) {
            rule.apply_command(command)?;
        }
        Ok(rule)
    }

    fn apply_command(&mut self, command: Command) -> Result<(), RuleError> {
        match command {
            Command::Clone { node, new_name } => {
                self.clone_node(&node, new_name)?;
            }
            Command::Merge { nodes, new_name } => {
                self.merge_node_list(&nodes, new_name)?;
            }
            Command::AddNode { name, attrs } => {
                self.add_node(&name, attrs.unwrap_or_default())?;
            }
            Command::DeleteNode { node } => {
                self.remove_node(&node)?;
            }
            Command::AddEdge { u, v, attrs } => {
                self.add_edge(&u, &v, attrs.unwrap_or_default())?;
            }
            Command::DeleteEdge { u, v } => {
                self.remove_edge(&u, &v)?;
            }
            Command::AddNodeAttrs { node, attrs } => {
                self.add_node_attrs(&node, attrs)?;
            }
            Command::DeleteNodeAttrs { node, attrs } => {
                self.remove_node_attrs(&node, attrs)?;
            }
            Command::AddEdgeAttrs { u, v, attrs } => {
                self.add_edge_attrs(&u, &v, attrs)?;
            }
            Command::DeleteEdgeAttrs { u, v, attrs } => {
                self.remove_edge_attrs(&u, &v, attrs)?;
            }
        }
        Ok(())
    }

    // --- general P-coherent edit surface -------------------------------

    pub fn add_node(&mut self, node_id: &str, attrs: AttrMap) -> Result<(), RuleError> {
        if self.rhs.has_node(node_id) || self.p_lhs.values().any(|v| v == node_id) {
            return Err(RuleError::DuplicateNode(node_id.to_string()));
        }
        self.rhs.add_node_with_attrs(node_id, attrs)?;
        Ok(())
    }

    pub fn remove_node(&mut self, n_lhs: &str) -> Result<(), RuleError> {
        for k in preimages(&self.p_lhs, n_lhs) {
            if self.p.has_node(&k) {
                self.p.remove_node(&k)?;
            }
            if let Some(r) = self.p_rhs.get(&k).cloned() {
                if self.rhs.has_node(&r) {
                    self.rhs.remove_node(&r)?;
                    for affected in preimages(&self.p_rhs, &r) {
                        self.p_rhs.remove(&affected);
                    }
                }
            }
            self.p_lhs.remove(&k);
        }
        Ok(())
    }

    pub fn add_edge(&mut self, u_lhs: &str, v_lhs: &str, attrs: AttrMap) -> Result<(), RuleError> {
        let keys_u = preimages(&self.p_lhs, u_lhs);
        let keys_v = preimages(&self.p_lhs, v_lhs);
        if keys_u.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(u_lhs.to_string()));
        }
        if keys_v.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(v_lhs.to_string()));
        }
        for k1 in &keys_u {
            for k2 in &keys_v {
                let r1 = self.p_rhs[k1].clone();
                let r2 = self.p_rhs[k2].clone();
                if self.rhs.has_edge(&r1, &r2) {
                    return Err(RuleError::EdgeAlreadyExists(r1, r2));
                }
                self.rhs.add_edge(&r1, &r2)?;
                for (key, val) in &attrs {
                    self.rhs.update_edge_attrs(&r1, &r2, key, val.clone())?;
                }
            }
        }
        Ok(())
    }

    pub fn remove_edge(&mut self, u_lhs: &str, v_lhs: &str) -> Result<(), RuleError> {
        let keys_u = preimages(&self.p_lhs, u_lhs);
        let keys_v = preimages(&self.p_lhs, v_lhs);
        for k1 in &keys_u {
            if !self.p.has_node(k1) {
                return Err(RuleError::UnknownNode(k1.clone()));
            }
            for k2 in &keys_v {
                if !self.p.has_node(k2) {
                    return Err(RuleError::UnknownNode(k2.clone()));
                }
                if !self.p.has_edge(k1, k2) {
                    return Err(RuleError::EdgeMissing(k1.clone(), k2.clone()));
                }
                let r1 = self.p_rhs[k1].clone();
                let r2 = self.p_rhs[k2].clone();
                if !self.rhs.has_edge(&r1, &r2) {
                    return Err(RuleError::EdgeMissing(r1, r2));
                }
                self.p.remove_edge(k1, k2)?;
                self.rhs.remove_edge(&r1, &r2)?;
            }
        }
        Ok(())
    }

    pub fn clone_node(&mut self, n_lhs: &str, new_name: Option<String>) -> Result<NodeId, RuleError> {
        let keys = preimages(&self.p_lhs, n_lhs);
        if keys.len() > 1 {
            return Err(RuleError::CannotCloneMergedNode(n_lhs.to_string()));
        }
        let new_name = new_name.unwrap_or_else(|| format!("{}_clone", n_lhs));
        if let Some(k) = keys.into_iter().next() {
            let r = self.p_rhs[&k].clone();
            self.rhs.clone_node(&r, new_name.clone())?;
            let new_p = format!("{}_clone", k);
            self.p.clone_node(&k, new_p.clone())?;
            self.p_lhs.insert(new_p.clone(), n_lhs.to_string());
            self.p_rhs.insert(new_p, new_name.clone());
        } else {
            self.rhs.clone_node(n_lhs, new_name.clone())?;
        }
        Ok(new_name)
    }

    pub fn merge_nodes(&mut self, n1_lhs: &str, n2_lhs: &str, new_name: Option<String>) -> Result<NodeId, RuleError> {
        let keys_1 = preimages(&self.p_lhs, n1_lhs);
        let keys_2 = preimages(&self.p_lhs, n2_lhs);
        let mut to_merge: Vec<NodeId> = Vec::new();
        for k1 in &keys_1 {
            if !self.p.has_node(k1) {
                return Err(RuleError::UnknownNode(k1.clone()));
            }
            for k2 in &keys_2 {
                if !self.p.has_node(k2) {
                    return Err(RuleError::UnknownNode(k2.clone()));
                }
                for r in [self.p_rhs[k1].clone(), self.p_rhs[k2].clone()] {
                    if !to_merge.contains(&r) {
                        to_merge.push(r);
                    }
                }
            }
        }
        let new_name = new_name.unwrap_or_else(|| to_merge.join("_"));
        self.rhs.merge_nodes(&to_merge, new_name.clone())?;
        for k in keys_1.into_iter().chain(keys_2) {
            self.p_rhs.insert(k, new_name.clone());
        }
        Ok(new_name)
    }

    /// Folds `merge_nodes` left-to-right over `ids`. Warns and does nothing
    /// if fewer than two ids are given — this is a diagnostic, not an error.
    pub fn merge_node_list(&mut self, ids: &[NodeId], new_name: Option<String>) -> Result<Option<NodeId>, RuleError> {
        if ids.len() < 2 {
            warn!(count = ids.len(), "merge_node_list called with fewer than two nodes, ignoring");
            return Ok(None);
        }
        let mut name = self.merge_nodes(&ids[0], &ids[1], new_name)?;
        for id in &ids[2..] {
            name = self.merge_nodes(id, &name, Some(name.clone()))?;
        }
        Ok(Some(name))
    }

    pub fn add_node_attrs(&mut self, n_lhs: &str, attrs: AttrMap) -> Result<(), RuleError> {
        if !self.lhs.has_node(n_lhs) {
            return Err(RuleError::UnknownNode(n_lhs.to_string()));
        }
        let keys = preimages(&self.p_lhs, n_lhs);
        if keys.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(n_lhs.to_string()));
        }
        for k in keys {
            let r = self.p_rhs[&k].clone();
            for (key, val) in &attrs {
                self.rhs.add_node_attrs(&r, key, val.clone())?;
            }
        }
        Ok(())
    }

    pub fn remove_node_attrs(&mut self, n_lhs: &str, attrs: AttrMap) -> Result<(), RuleError> {
        if !self.lhs.has_node(n_lhs) {
            return Err(RuleError::UnknownNode(n_lhs.to_string()));
        }
        let keys = preimages(&self.p_lhs, n_lhs);
        if keys.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(n_lhs.to_string()));
        }
        for k in keys {
            for (key, val) in &attrs {
                self.p.remove_node_attrs(&k, key, val.clone())?;
            }
            let r = self.p_rhs[&k].clone();
            for (key, val) in &attrs {
                self.rhs.remove_node_attrs(&r, key, val.clone())?;
            }
        }
        Ok(())
    }

    pub fn update_node_attrs(&mut self, n_lhs: &str, attrs: AttrMap) -> Result<(), RuleError> {
        if !self.lhs.has_node(n_lhs) {
            return Err(RuleError::UnknownNode(n_lhs.to_string()));
        }
        let keys = preimages(&self.p_lhs, n_lhs);
        if keys.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(n_lhs.to_string()));
        }
        for k in keys {
            let r = self.p_rhs[&k].clone();
            for (key, val) in &attrs {
                self.rhs.update_node_attrs(&r, key, val.clone())?;
            }
        }
        Ok(())
    }

    pub fn add_edge_attrs(&mut self, u_lhs: &str, v_lhs: &str, attrs: AttrMap) -> Result<(), RuleError> {
        if !self.lhs.has_edge(u_lhs, v_lhs) {
            return Err(RuleError::EdgeMissing(u_lhs.to_string(), v_lhs.to_string()));
        }
        let keys_u = preimages(&self.p_lhs, u_lhs);
        let keys_v = preimages(&self.p_lhs, v_lhs);
        if keys_u.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(u_lhs.to_string()));
        }
        if keys_v.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(v_lhs.to_string()));
        }
        for k1 in &keys_u {
            for k2 in &keys_v {
                let r1 = self.p_rhs[k1].clone();
                let r2 = self.p_rhs[k2].clone();
                for (key, val) in &attrs {
                    self.rhs.add_edge_attrs(&r1, &r2, key, val.clone())?;
                }
            }
        }
        Ok(())
    }

    pub fn remove_edge_attrs(&mut self, u_lhs: &str, v_lhs: &str, attrs: AttrMap) -> Result<(), RuleError> {
        if !self.lhs.has_edge(u_lhs, v_lhs) {
            return Err(RuleError::EdgeMissing(u_lhs.to_string(), v_lhs.to_string()));
        }
        let keys_u = preimages(&self.p_lhs, u_lhs);
        let keys_v = preimages(&self.p_lhs, v_lhs);
        if keys_u.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(u_lhs.to_string()));
        }
        if keys_v.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(v_lhs.to_string()));
        }
        for k1 in &keys_u {
            for k2 in &keys_v {
                for (key, val) in &attrs {
                    self.p.remove_edge_attrs(k1, k2, key, val.clone())?;
                }
                let r1 = self.p_rhs[k1].clone();
                let r2 = self.p_rhs[k2].clone();
                for (key, val) in &attrs {
                    self.rhs.remove_edge_attrs(&r1, &r2, key, val.clone())?;
                }
            }
        }
        Ok(())
    }

    pub fn update_edge_attrs(&mut self, u_lhs: &str, v_lhs: &str, attrs: AttrMap) -> Result<(), RuleError> {
        if !self.lhs.has_edge(u_lhs, v_lhs) {
            return Err(RuleError::EdgeMissing(u_lhs.to_string(), v_lhs.to_string()));
        }
        let keys_u = preimages(&self.p_lhs, u_lhs);
        let keys_v = preimages(&self.p_lhs, v_lhs);
        if keys_u.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(u_lhs.to_string()));
        }
        if keys_v.is_empty() {
            return Err(RuleError::CannotEditDeletedNode(v_lhs.to_string()));
        }
        for k1 in &keys_u {
            for k2 in &keys_v {
                let r1 = self.p_rhs[k1].clone();
                let r2 = self.p_rhs[k2].clone();
                for (key, val) in &attrs {
                    self.rhs.update_edge_attrs(&r1, &r2, key, val.clone())?;
                }
            }
        }
        Ok(())
    }

    // --- rhs-only edit surface (Open Question 3: kept distinct from the
    // general P-coherent API above, never folded into it) ----------------

    pub fn add_node_rhs(&mut self, node_id: &str, attrs: AttrMap) -> Result<(), RuleError> {
        self.rhs.add_node_with_attrs(node_id, attrs)?;
        Ok(())
    }

    pub fn remove_node_rhs(&mut self, n: &str) -> Result<(), RuleError> {
        for p_node in preimages(&self.p_rhs, n) {
            self.p.remove_node(&p_node)?;
            self.p_rhs.remove(&p_node);
        }
        self.rhs.remove_node(n)?;
        Ok(())
    }

    pub fn add_edge_rhs(&mut self, n1: &str, n2: &str, attrs: AttrMap) -> Result<(), RuleError> {
        self.rhs.add_edge(n1, n2)?;
        for (k, v) in attrs {
            self.rhs.update_edge_attrs(n1, n2, &k, v)?;
        }
        Ok(())
    }

    pub fn remove_edge_rhs(&mut self, n1: &str, n2: &str) -> Result<(), RuleError> {
        self.rhs.remove_edge(n1, n2)?;
        for pn1 in preimages(&self.p_rhs, n1) {
            for pn2 in preimages(&self.p_rhs, n2) {
                let _ = self.p.remove_edge(&pn1, &pn2);
            }
        }
        Ok(())
    }

    pub fn clone_rhs_node(&mut self, node: &str, new_name: Option<String>) -> Result<NodeId, RuleError> {
        if !self.rhs.has_node(node) {
            return Err(RuleError::UnknownNode(node.to_string()));
        }
        let new_name = new_name.unwrap_or_else(|| format!("{}_clone", node));
        let keys = preimages(&self.p_rhs, node);
        self.rhs.clone_node(node, new_name.clone())?;
        match keys.len() {
            0 => {}
            1 => {
                let k = &keys[0];
                let new_p = format!("{}_clone", k);
                self.p.clone_node(k, new_p.clone())?;
                self.p_rhs.insert(new_p.clone(), new_name.clone());
                self.p_lhs.insert(new_p, self.p_lhs[k].clone());
            }
            _ => return Err(RuleError::CannotCloneMergedNode(node.to_string())),
        }
        Ok(new_name)
    }

    pub fn merge_nodes_rhs(&mut self, n1: &str, n2: &str, new_name: &str) -> Result<(), RuleError> {
        if !self.rhs.has_node(n1) {
            return Err(RuleError::UnknownNode(n1.to_string()));
        }
        if !self.rhs.has_node(n2) {
            return Err(RuleError::UnknownNode(n2.to_string()));
        }
        self.rhs.merge_nodes(&[n1.to_string(), n2.to_string()], new_name.to_string())?;
        for (_, target) in self.p_rhs.iter_mut() {
            if target == n1 || target == n2 {
                *target = new_name.to_string();
            }
        }
        Ok(())
    }

    pub fn add_node_attrs_rhs(&mut self, n: &str, attrs: AttrMap) -> Result<(), RuleError> {
        if !self.rhs.has_node(n) {
            return Err(RuleError::UnknownNode(n.to_string()));
        }
        for (k, v) in attrs {
            self.rhs.add_node_attrs(n, &k, v)?;
        }
        Ok(())
    }

    pub fn remove_node_attrs_rhs(&mut self, n: &str, attrs: AttrMap) -> Result<(), RuleError> {
        if !self.rhs.has_node(n) {
            return Err(RuleError::UnknownNode(n.to_string()));
        }
        for p_node in preimages(&self.p_rhs, n) {
            for (k, v) in &attrs {
                self.p.remove_node_attrs(&p_node, k, v.clone())?;
            }
        }
        for (k, v) in attrs {
            self.rhs.remove_node_attrs(n, &k, v)?;
        }
        Ok(())
    }

    pub fn add_edge_attrs_rhs(&mut self, n1: &str, n2: &str, attrs: AttrMap) -> Result<(), RuleError> {
        for (k, v) in attrs {
            self.rhs.add_edge_attrs(n1, n2, &k, v)?;
        }
        Ok(())
    }

    pub fn remove_edge_attrs_rhs(&mut self, n1: &str, n2: &str, attrs: AttrMap) -> Result<(), RuleError> {
        for (k, v) in attrs {
            self.rhs.remove_edge_attrs(n1, n2, &k, v)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Rule serialization is infallible")
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Runs the [`Rewriter`](crate::rewrite::Rewriter) at `match_` against
    /// `graph`, returning the new graph. See [`crate::rewrite`] for the
    /// variant that also returns the homomorphisms and the `RewriteDelta`.
    pub fn apply_to(&self, graph: &AttrGraph, match_: &Mapping) -> Result<AttrGraph, RuleError> {
        Ok(crate::rewrite::Rewriter::rewrite(self, graph, match_)?.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrVal;

    fn fixture() -> AttrGraph {
        let mut g = AttrGraph::new(true);
        for n in ["1", "2", "3", "4"] {
            g.add_node(n).unwrap();
        }
        g.add_edge("1", "2").unwrap();
        g.add_edge("3", "2").unwrap();
        g.add_edge("2", "3").unwrap();
        g.add_edge("4", "1").unwrap();
        g
    }

    #[test]
    fn remove_node_drops_from_p_and_rhs() {
        let mut rule = Rule::identity(fixture());
        rule.remove_node("2").unwrap();
        assert!(!rule.rhs.has_node("2"));
        assert!(!rule.p.has_node("2"));
        assert!(preimages(&rule.p_lhs, "2").is_empty());
    }

    #[test]
    fn add_edge_rejects_deleted_endpoint() {
        let mut rule = Rule::identity(fixture());
        rule.remove_node("2").unwrap();
        let err = rule.add_edge("2", "3", AttrMap::new()).unwrap_err();
        assert!(matches!(err, RuleError::CannotEditDeletedNode(_)));
    }

    #[test]
    fn remove_edge_missing_is_an_error() {
        let mut rule = Rule::identity(fixture());
        let err = rule.remove_edge("1", "3").unwrap_err();
        assert!(matches!(err, RuleError::EdgeMissing(_, _)));
    }

    #[test]
    fn clone_then_delete_matches_scenario_2() {
        let mut rule = Rule::identity(fixture());
        rule.clone_node("2", Some("21".to_string())).unwrap();
        rule.remove_node("3").unwrap();
        assert!(rule.rhs.has_node("2"));
        assert!(rule.rhs.has_node("21"));
        assert!(!rule.rhs.has_node("3"));
        assert!(rule.rhs.has_edge("1", "21") || rule.rhs.has_edge("1", "2"));
    }

    #[test]
    fn merge_nodes_unions_attrs() {
        let mut rule = Rule::identity(fixture());
        rule.add_node_attrs("1", [("k".to_string(), AttrVal::singleton(1i64))].into_iter().collect())
            .unwrap();
        rule.add_node_attrs("4", [("k".to_string(), AttrVal::singleton(2i64))].into_iter().collect())
            .unwrap();
        let merged = rule.merge_nodes("1", "4", Some("m".to_string())).unwrap();
        assert_eq!(merged, "m");
        assert!(rule.rhs.has_node("m"));
    }

    #[test]
    fn merge_node_list_warns_below_two() {
        let mut rule = Rule::identity(fixture());
        let result = rule.merge_node_list(&["1".to_string()], None).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn node_attrs_are_idempotent() {
        let mut rule = Rule::identity(fixture());
        let attrs: AttrMap = [("color".to_string(), crate::attr::AttrVal::singleton("red"))].into_iter().collect();
        rule.add_node_attrs("1", attrs.clone()).unwrap();
        let once = rule.rhs.node_attrs("1").unwrap().clone();
        rule.add_node_attrs("1", attrs).unwrap();
        let twice = rule.rhs.node_attrs("1").unwrap().clone();
        assert_eq!(once, twice);
    }

    #[test]
    fn json_round_trip() {
        let mut rule = Rule::identity(fixture());
        rule.remove_node("2").unwrap();
        let json = rule.to_json();
        let back = Rule::from_json(json).unwrap();
        assert_eq!(rule, back);
    }
}
