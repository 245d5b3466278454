//! End-to-end tests for `Rule` construction via the transform command
//! language, and the round-trip/idempotence properties of §8.

use hierograph_core::command::Command;
use hierograph_core::{AttrGraph, AttrVal, Rule};

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
fn scenario_1_basic_delete_via_apply_to() {
    let mut rule = Rule::identity(fixture());
    rule.remove_node("2").unwrap();

    let g = fixture();
    let m = hierograph_core::category::identity(&g);
    let result = rule.apply_to(&g, &m).unwrap();

    assert!(result.has_node("1"));
    assert!(result.has_node("3"));
    assert!(result.has_node("4"));
    assert!(!result.has_node("2"));
    assert!(result.has_edge("4", "1"));
    assert_eq!(result.edge_count(), 1);
}

#[test]
fn scenario_2_clone_then_delete_from_script() {
    let script = "clone 2 as 21. delete_node 3.";
    let commands = Command::parse_script(script).unwrap();
    let rule = Rule::from_transform(fixture(), commands).unwrap();

    let g = fixture();
    let m = hierograph_core::category::identity(&g);
    let result = rule.apply_to(&g, &m).unwrap();

    assert!(result.has_node("2"));
    assert!(result.has_node("21"));
    assert!(!result.has_node("3"));
    // 2's incident edges duplicate onto 21: (1,2) survives and (1,21) must
    // also exist (2 had one predecessor, 1).
    assert!(result.has_edge("1", "2"));
    assert!(result.has_edge("1", "21"));
}

#[test]
fn scenario_3_merge_unions_attrs_and_redirects_edges() {
    let mut rule = Rule::identity(fixture());
    rule.add_node_attrs("1", [("k".to_string(), AttrVal::singleton(1i64))].into_iter().collect()).unwrap();
    rule.add_node_attrs("4", [("k".to_string(), AttrVal::singleton(2i64))].into_iter().collect()).unwrap();
    rule.merge_nodes("1", "4", Some("m".to_string())).unwrap();

    let g = fixture();
    let m = hierograph_core::category::identity(&g);
    let result = rule.apply_to(&g, &m).unwrap();

    assert_eq!(result.node_count(), 3);
    // The pushout's quotient picks its own deterministic representative id
    // rather than necessarily keeping the rule's "m" name; find whichever
    // surviving node carries the union of both merged nodes' attrs.
    let merged = result
        .nodes()
        .find(|n| result.node_attrs(n).unwrap().get("k").map(|v| v.len()).unwrap_or(0) == 2)
        .expect("one node must carry the unioned attrs");
    assert_eq!(
        result.node_attrs(merged).unwrap().get("k").unwrap(),
        &AttrVal::from_scalars([hierograph_core::Scalar::Int(1), hierograph_core::Scalar::Int(2)])
    );
    // 1 and 4 had an edge between them: merging them produces a self-loop.
    assert!(result.has_edge(merged, merged));
}

#[test]
fn command_canonicalization_reorders_clone_before_delete_regardless_of_script_order() {
    // Scenario 2's rule written with delete first in the script; canonical
    // order still runs the clone before the delete so neither command
    // references an already-removed node.
    let script = "delete_node 3. clone 2 as 21.";
    let commands = Command::canonicalize(Command::parse_script(script).unwrap());
    assert!(matches!(commands[0], Command::Clone { .. }));
    assert!(matches!(commands[1], Command::DeleteNode { .. }));
}

#[test]
fn rule_json_round_trip_after_multiple_edits() {
    let script = "clone 2 as 21. delete_node 3. add_node_attrs 1 {\"color\":[\"red\"]}.";
    let commands = Command::parse_script(script).unwrap();
    let rule = Rule::from_transform(fixture(), commands).unwrap();

    let json = rule.to_json();
    let back = Rule::from_json(json).unwrap();
    assert_eq!(rule, back);
}

#[test]
fn unknown_keyword_is_a_parsing_error() {
    let err = Command::parse_script("frobnicate 1.").unwrap_err();
    assert!(matches!(err, hierograph_core::ParsingError::UnknownKeyword(_)));
}
