//! Graph-traversal helpers shared by [`crate::hierarchy`] propagation.
//!
//! Propagation needs an explicit, topologically-ordered worklist rather than
//! naive recursion: a grandparent typing can only be repaired once its
//! parent's repair has landed. `induced_stream_toposort` is a DFS-based
//! topological sort of the stream reachable from a set of sources, adapted
//! from the reference traversal used to stream an induced subgraph of a
//! dependency DAG in dependency order.

use petgraph::visit::{Data, GraphBase, GraphRef, IntoEdgesDirected, IntoNeighborsDirected, VisitMap, Visitable};
use petgraph::Direction;

use crate::error::HierarchyError;

/// Topologically sorts the nodes reachable from `sources` by walking edges
/// in `direction` and passing `edge_filter`. The result lists each reachable
/// node exactly once, with every node ahead of the nodes it points to (when
/// `direction` is `Outgoing`) so a caller folding repairs over the result in
/// order never visits a node before something it depends on.
///
/// Graphs handed to `Hierarchy` are DAGs by construction (`daggy::Dag`
/// rejects edges that would close a cycle), so unlike a general toposort
/// this never needs a second, cycle-detecting pass — only the degenerate
/// self-loop case is checked directly.
pub fn induced_stream_toposort<G, F>(
    g: G,
    sources: &[<G as GraphBase>::NodeId],
    direction: Direction,
    edge_filter: F,
) -> Result<Vec<<G as GraphBase>::NodeId>, HierarchyError>
where
    G: IntoEdgesDirected + IntoNeighborsDirected + Visitable,
    F: Fn(&<G as Data>::EdgeWeight) -> bool,
{
    with_dfs(g, |dfs| {
        dfs.reset(g);
        let mut finished = g.visit_map();
        let mut finish_stack = Vec::new();

        for &start in sources {
            if dfs.discovered.is_visited(&start) {
                continue;
            }
            dfs.stack.push(start);
            while let Some(&nx) = dfs.stack.last() {
                if dfs.discovered.visit(nx) {
                    for succ in g.edges_directed(nx, direction).filter_map(|edge| {
                        if edge_filter(edge.weight()) {
                            Some(match direction {
                                Direction::Incoming => edge.source(),
                                Direction::Outgoing => edge.target(),
                            })
                        } else {
                            None
                        }
                    }) {
                        if succ == nx {
                            return Err(HierarchyError::CycleIntroduced);
                        }
                        if !dfs.discovered.is_visited(&succ) {
                            dfs.stack.push(succ);
                        }
                    }
                } else {
                    dfs.stack.pop();
                    if finished.visit(nx) {
                        finish_stack.push(nx);
                    }
                }
            }
        }
        finish_stack.reverse();
        Ok(finish_stack)
    })
}

fn with_dfs<G, F, R>(g: G, f: F) -> R
where
    G: GraphRef + Visitable,
    F: FnOnce(&mut petgraph::visit::Dfs<G::NodeId, G::Map>) -> R,
{
    let mut local_visitor = petgraph::visit::Dfs::empty(g);
    f(&mut local_visitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::DiGraph;

    #[test]
    fn topo_orders_chain_with_ancestor_first() {
        let mut g = DiGraph::<&str, ()>::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let c = g.add_node("c");
        g.add_edge(a, b, ());
        g.add_edge(b, c, ());

        let order = induced_stream_toposort(&g, &[a], Direction::Outgoing, |_| true).unwrap();
        let pos = |n| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn topo_sorts_only_the_induced_stream() {
        let mut g = DiGraph::<&str, ()>::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let unrelated = g.add_node("unrelated");
        g.add_edge(a, b, ());

        let order = induced_stream_toposort(&g, &[a], Direction::Outgoing, |_| true).unwrap();
        assert_eq!(order.len(), 2);
        assert!(!order.contains(&unrelated));
    }
}
