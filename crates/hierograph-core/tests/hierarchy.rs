//! Integration tests for `Hierarchy` propagation, §8 scenarios 4 and 5:
//! a clone in a typed graph replicates upward into every predecessor that
//! types through the cloned node, and a newly added edge propagates downward
//! into a successor, collapsing into a self-loop when both endpoints share
//! the same image.

use hierograph_core::category;
use hierograph_core::{Hierarchy, MemoryBackend, Mapping, Rule};

#[test]
fn scenario_4_clone_propagates_upward_across_all_incident_edges() {
    // T types into G with both of its nodes mapped onto G's single node "1",
    // which carries a self-loop so the typing edge alpha->beta has somewhere
    // to land. Cloning "1" into {1, 1b} must clone both of T's nodes so the
    // typing homomorphism still holds afterward.
    let mut h = Hierarchy::new(MemoryBackend::new());
    h.add_graph(
        "T",
        true,
        vec!["alpha".into(), "beta".into()],
        vec![("alpha".to_string(), "beta".to_string())],
        Default::default(),
    )
    .unwrap();
    h.add_graph(
        "G",
        true,
        vec!["1".into(), "2".into()],
        vec![("1".to_string(), "1".to_string()), ("1".to_string(), "2".to_string())],
        Default::default(),
    )
    .unwrap();

    let t_to_g: Mapping = [("alpha".to_string(), "1".to_string()), ("beta".to_string(), "1".to_string())]
        .into_iter()
        .collect();
    h.add_typing("T", "G", t_to_g, Default::default(), true).unwrap();

    let g = h.graph("G").unwrap().clone();
    let mut rule = Rule::identity(g.clone());
    rule.clone_node("1", Some("1b".to_string())).unwrap();
    let m = category::identity(&g);
    h.rewrite("G", &rule, &m, None, None).unwrap();

    let g_after = h.graph("G").unwrap();
    assert_eq!(g_after.node_count(), 3);
    assert!(g_after.has_node("1"));
    assert!(g_after.has_node("1b"));

    // Both "alpha" and "beta" were typed by "1", so both must have been
    // cloned for the typing to remain total.
    let t_after = h.graph("T").unwrap();
    assert_eq!(t_after.node_count(), 4);

    // The typing homomorphism T -> G must still hold after the repair.
    h.check_typing("T", "G").unwrap();
}

#[test]
fn scenario_5_added_edge_propagates_downward_as_self_loop() {
    // G's two nodes both type onto U's single node "x". Adding an edge
    // between them in G must appear as a self-loop on "x" in U once the
    // addition propagates down.
    let mut h = Hierarchy::new(MemoryBackend::new());
    h.add_graph("G", true, vec!["1".into(), "2".into()], vec![], Default::default()).unwrap();
    h.add_graph("U", true, vec!["x".into()], vec![], Default::default()).unwrap();

    let g_to_u: Mapping =
        [("1".to_string(), "x".to_string()), ("2".to_string(), "x".to_string())].into_iter().collect();
    h.add_typing("G", "U", g_to_u, Default::default(), true).unwrap();

    let g = h.graph("G").unwrap().clone();
    let mut rule = Rule::identity(g.clone());
    rule.add_edge("1", "2").unwrap();
    let m = category::identity(&g);
    h.rewrite("G", &rule, &m, None, None).unwrap();

    let g_after = h.graph("G").unwrap();
    assert!(g_after.has_edge("1", "2"));

    let u_after = h.graph("U").unwrap();
    assert!(u_after.has_edge("x", "x"));
    h.check_typing("G", "U").unwrap();
}

#[test]
fn scenario_merge_propagates_downward_collapsing_successor_nodes() {
    let mut h = Hierarchy::new(MemoryBackend::new());
    h.add_graph("G", true, vec!["1".into(), "2".into()], vec![], Default::default()).unwrap();
    h.add_graph("U", true, vec!["x".into(), "y".into()], vec![], Default::default()).unwrap();

    let g_to_u: Mapping =
        [("1".to_string(), "x".to_string()), ("2".to_string(), "y".to_string())].into_iter().collect();
    h.add_typing("G", "U", g_to_u, Default::default(), true).unwrap();

    let g = h.graph("G").unwrap().clone();
    let mut rule = Rule::identity(g.clone());
    rule.merge_nodes("1", "2", Some("m".to_string())).unwrap();
    let m = category::identity(&g);
    h.rewrite("G", &rule, &m, None, None).unwrap();

    assert_eq!(h.graph("G").unwrap().node_count(), 1);
    assert_eq!(h.graph("U").unwrap().node_count(), 1);
    h.check_typing("G", "U").unwrap();
}
