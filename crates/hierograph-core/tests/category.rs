//! Integration tests for the universal properties of §8: pullback/pushout
//! recovery, composition of homomorphisms, and path commutation under
//! `Hierarchy` operations.

use hierograph_core::{AttrGraph, Hierarchy, MemoryBackend, Mapping};
use hierograph_core::category::{check_homomorphism, compose, identity, pullback, pushout};

fn triangle() -> AttrGraph {
    let mut g = AttrGraph::new(true);
    for n in ["1", "2", "3"] {
        g.add_node(n).unwrap();
    }
    g.add_edge("1", "2").unwrap();
    g.add_edge("2", "3").unwrap();
    g.add_edge("3", "1").unwrap();
    g
}

#[test]
fn pullback_then_pushout_recovers_common_vertex() {
    // b and c both type into d via the identity; the pullback of those two
    // legs is isomorphic to d itself, and pushing the pullback's two legs
    // back out recovers b and c (up to the identity-relabeling this fixture
    // uses).
    let d = triangle();
    let b = triangle();
    let c = triangle();
    let h = identity(&d);
    let k = identity(&d);

    let (a, a_b, a_c) = pullback(&b, &c, &h, &k);
    assert_eq!(a.node_count(), d.node_count());
    assert_eq!(a.edge_count(), d.edge_count());

    let (recovered, b_d, c_d) = pushout(&a, &b, &c, &a_b, &a_c);
    assert_eq!(recovered.node_count(), b.node_count());
    assert!(check_homomorphism(&b_d, &b, &recovered).is_ok());
    assert!(check_homomorphism(&c_d, &c, &recovered).is_ok());
}

#[test]
fn compose_of_two_valid_homomorphisms_is_valid() {
    let a = triangle();
    let b = triangle();
    let c = triangle();
    let f = identity(&a);
    let g = identity(&b);
    assert!(check_homomorphism(&f, &a, &b).is_ok());
    assert!(check_homomorphism(&g, &b, &c).is_ok());

    let composed = compose(&f, &g);
    assert!(check_homomorphism(&composed, &a, &c).is_ok());
}

#[test]
fn hierarchy_paths_commute_across_two_hops() {
    // G -> M -> T, both typings identity; the direct composed path and the
    // only existing path must agree (trivially, since there's only one),
    // and `check_typing` validates that the hop-by-hop homomorphisms hold.
    let mut h = Hierarchy::new(MemoryBackend::new());
    h.add_graph("G", true, vec!["1".into(), "2".into(), "3".into()], vec![
        ("1".to_string(), "2".to_string()),
        ("2".to_string(), "3".to_string()),
        ("3".to_string(), "1".to_string()),
    ], Default::default())
        .unwrap();
    h.add_graph("M", true, vec!["1".into(), "2".into(), "3".into()], vec![
        ("1".to_string(), "2".to_string()),
        ("2".to_string(), "3".to_string()),
        ("3".to_string(), "1".to_string()),
    ], Default::default())
        .unwrap();
    h.add_graph("T", true, vec!["x".into()], vec![], Default::default()).unwrap();

    let g_to_m: Mapping = [("1".to_string(), "1".to_string()), ("2".to_string(), "2".to_string()), ("3".to_string(), "3".to_string())]
        .into_iter()
        .collect();
    let m_to_t: Mapping = [("1".to_string(), "x".to_string()), ("2".to_string(), "x".to_string()), ("3".to_string(), "x".to_string())]
        .into_iter()
        .collect();

    h.add_typing("G", "M", g_to_m, Default::default(), true).unwrap();
    h.add_typing("M", "T", m_to_t, Default::default(), true).unwrap();

    h.check_typing("G", "M").unwrap();
    h.check_typing("M", "T").unwrap();
}

#[test]
fn add_typing_disagreeing_with_existing_path_is_rejected() {
    // scenario 6: a second G->T typing that disagrees with the composed
    // G->M->T path must fail and leave the hierarchy unchanged.
    let mut h = Hierarchy::new(MemoryBackend::new());
    h.add_graph("G", true, vec!["1".into(), "2".into()], vec![("1".to_string(), "2".to_string())], Default::default())
        .unwrap();
    h.add_graph("M", true, vec!["1".into(), "2".into()], vec![("1".to_string(), "2".to_string())], Default::default())
        .unwrap();
    h.add_graph("T", true, vec!["x".into(), "y".into()], vec![("x".to_string(), "y".to_string())], Default::default())
        .unwrap();

    let identity_map: Mapping = [("1".to_string(), "1".to_string()), ("2".to_string(), "2".to_string())].into_iter().collect();
    h.add_typing("G", "M", identity_map, Default::default(), true).unwrap();

    let m_to_t: Mapping = [("1".to_string(), "x".to_string()), ("2".to_string(), "y".to_string())].into_iter().collect();
    h.add_typing("M", "T", m_to_t, Default::default(), true).unwrap();

    // Disagrees: composed path sends 1->x, 2->y, but this sends both to x.
    let bad_direct: Mapping = [("1".to_string(), "x".to_string()), ("2".to_string(), "x".to_string())].into_iter().collect();
    let err = h.add_typing("G", "T", bad_direct, Default::default(), true).unwrap_err();
    assert!(matches!(err, hierograph_core::HierarchyError::PathsDoNotCommute(_, _)));

    // Hierarchy unchanged: the only path G->T is still the composed one.
    h.check_typing("G", "M").unwrap();
    h.check_typing("M", "T").unwrap();
    assert_eq!(h.successors("G").unwrap(), vec!["M".to_string()]);
}
