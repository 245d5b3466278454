//! The minimal textual rule-transformation grammar used by
//! [`Rule::from_transform`](crate::rule::Rule::from_transform).
//!
//! This is the one fixed, small grammar the crate supports directly — not a
//! general DSL front end — and is implemented with ordinary string
//! splitting plus `serde_json` for `<attrs_json>` payloads rather than a
//! parser-combinator framework.

use serde::{Deserialize, Serialize};

use crate::attr::{AttrMap, AttrVal, Scalar};
use crate::error::ParsingError;
use crate::graph::NodeId;

/// One parsed or programmatically constructed rule-edit command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Clone { node: NodeId, new_name: Option<NodeId> },
    Merge { nodes: Vec<NodeId>, new_name: Option<NodeId> },
    AddNode { name: NodeId, attrs: Option<AttrMap> },
    DeleteNode { node: NodeId },
    AddEdge { u: NodeId, v: NodeId, attrs: Option<AttrMap> },
    DeleteEdge { u: NodeId, v: NodeId },
    AddNodeAttrs { node: NodeId, attrs: AttrMap },
    DeleteNodeAttrs { node: NodeId, attrs: AttrMap },
    AddEdgeAttrs { u: NodeId, v: NodeId, attrs: AttrMap },
    DeleteEdgeAttrs { u: NodeId, v: NodeId, attrs: AttrMap },
}

impl Command {
    /// `clone < delete < merge < add < attribute-edit`, a stable partition
    /// so relative order within one group is the script's original order.
    fn rank(&self) -> u8 {
        match self {
            Command::Clone { .. } => 0,
            Command::DeleteNode { .. } | Command::DeleteEdge { .. } => 1,
            Command::Merge { .. } => 2,
            Command::AddNode { .. } | Command::AddEdge { .. } => 3,
            Command::AddNodeAttrs { .. }
            | Command::DeleteNodeAttrs { .. }
            | Command::AddEdgeAttrs { .. }
            | Command::DeleteEdgeAttrs { .. } => 4,
        }
    }

    /// Reorders `commands` into canonical order via a stable sort keyed on
    /// [`rank`](Self::rank), so no command references a node already
    /// removed by a later semantic group.
    pub fn canonicalize(mut commands: Vec<Command>) -> Vec<Command> {
        commands.sort_by_key(|c| c.rank());
        commands
    }

    /// Parses one period-separated script of commands (§6 grammar).
    pub fn parse_script(script: &str) -> Result<Vec<Command>, ParsingError> {
        script
            .split('.')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Command::parse_line)
            .collect()
    }

    fn parse_line(line: &str) -> Result<Command, ParsingError> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().ok_or_else(|| ParsingError::MalformedCommand {
            command: line.to_string(),
            reason: "empty command".to_string(),
        })?;
        let rest: Vec<&str> = tokens.collect();

        let malformed = |reason: &str| ParsingError::MalformedCommand {
            command: line.to_string(),
            reason: reason.to_string(),
        };
        // JSON tolerates insignificant whitespace between tokens, so a
        // trailing `<attrs_json>` payload can be reassembled by rejoining
        // whatever whitespace-split tokens remain after the positional
        // arguments.
        let rejoin = |from: usize| -> Option<String> {
            if from >= rest.len() {
                None
            } else {
                Some(rest[from..].join(" "))
            }
        };

        match keyword {
            "clone" => {
                let node = *rest.first().ok_or_else(|| malformed("missing node"))?;
                let new_name = match rest.get(1) {
                    Some(&"as") => Some(
                        rest.get(2)
                            .ok_or_else(|| malformed("`as` with no new name"))?
                            .to_string(),
                    ),
                    None => None,
                    _ => return Err(malformed("expected `as <new_name>` or nothing")),
                };
                Ok(Command::Clone { node: node.to_string(), new_name })
            }
            "merge" => {
                let as_pos = rest.iter().position(|t| *t == "as");
                let (node_tokens, new_name) = match as_pos {
                    Some(pos) => (
                        &rest[..pos],
                        Some(
                            rest.get(pos + 1)
                                .ok_or_else(|| malformed("`as` with no new name"))?
                                .to_string(),
                        ),
                    ),
                    None => (&rest[..], None),
                };
                if node_tokens.is_empty() {
                    return Err(malformed("missing node list"));
                }
                let nodes = node_tokens.iter().map(|s| s.to_string()).collect();
                Ok(Command::Merge { nodes, new_name })
            }
            "add_node" => {
                let name = rest.first().map(|s| s.to_string()).unwrap_or_else(generate_anonymous_name);
                let attrs = rejoin(1).map(|s| parse_attrs(&s, line)).transpose()?;
                Ok(Command::AddNode { name, attrs })
            }
            "delete_node" => {
                let node = *rest.first().ok_or_else(|| malformed("missing node"))?;
                Ok(Command::DeleteNode { node: node.to_string() })
            }
            "add_edge" => {
                let u = *rest.first().ok_or_else(|| malformed("missing source node"))?;
                let v = *rest.get(1).ok_or_else(|| malformed("missing target node"))?;
                let attrs = rejoin(2).map(|s| parse_attrs(&s, line)).transpose()?;
                Ok(Command::AddEdge { u: u.to_string(), v: v.to_string(), attrs })
            }
            "delete_edge" => {
                let u = *rest.first().ok_or_else(|| malformed("missing source node"))?;
                let v = *rest.get(1).ok_or_else(|| malformed("missing target node"))?;
                Ok(Command::DeleteEdge { u: u.to_string(), v: v.to_string() })
            }
            "add_node_attrs" => {
                let node = *rest.first().ok_or_else(|| malformed("missing node"))?;
                let attrs_json = rejoin(1).ok_or_else(|| malformed("missing attrs"))?;
                Ok(Command::AddNodeAttrs { node: node.to_string(), attrs: parse_attrs(&attrs_json, line)? })
            }
            "delete_node_attrs" => {
                let node = *rest.first().ok_or_else(|| malformed("missing node"))?;
                let attrs_json = rejoin(1).ok_or_else(|| malformed("missing attrs"))?;
                Ok(Command::DeleteNodeAttrs { node: node.to_string(), attrs: parse_attrs(&attrs_json, line)? })
            }
            "add_edge_attrs" => {
                let u = *rest.first().ok_or_else(|| malformed("missing source node"))?;
                let v = *rest.get(1).ok_or_else(|| malformed("missing target node"))?;
                let attrs_json = rejoin(2).ok_or_else(|| malformed("missing attrs"))?;
                Ok(Command::AddEdgeAttrs { u: u.to_string(), v: v.to_string(), attrs: parse_attrs(&attrs_json, line)? })
            }
            "delete_edge_attrs" => {
                let u = *rest.first().ok_or_else(|| malformed("missing source node"))?;
                let v = *rest.get(1).ok_or_else(|| malformed("missing target node"))?;
                let attrs_json = rejoin(2).ok_or_else(|| malformed("missing attrs"))?;
                Ok(Command::DeleteEdgeAttrs { u: u.to_string(), v: v.to_string(), attrs: parse_attrs(&attrs_json, line)? })
            }
            other => Err(ParsingError::UnknownKeyword(other.to_string())),
        }
    }
}

fn generate_anonymous_name() -> NodeId {
    // Scripts rarely omit the node name; when they do there is no
    // identifier to key off of, so this is a placeholder an upstream
    // caller is expected to rename via a subsequent command.
    "_anon".to_string()
}

fn parse_attrs(json: &str, command: &str) -> Result<AttrMap, ParsingError> {
    let raw: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| ParsingError::MalformedCommand {
            command: command.to_string(),
            reason: format!("invalid attrs JSON: {e}"),
        })?;
    let mut attrs = AttrMap::new();
    for (key, value) in raw {
        let scalars = match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|v| json_scalar(&v, command))
                .collect::<Result<Vec<_>, _>>()?,
            other => vec![json_scalar(&other, command)?],
        };
        attrs.insert(key, AttrVal::from_scalars(scalars));
    }
    Ok(attrs)
}

fn json_scalar(value: &serde_json::Value, command: &str) -> Result<Scalar, ParsingError> {
    match value {
        serde_json::Value::Bool(b) => Ok(Scalar::Bool(*b)),
        serde_json::Value::Number(n) if n.is_i64() => Ok(Scalar::Int(n.as_i64().unwrap())),
        serde_json::Value::String(s) => Ok(Scalar::Str(s.clone())),
        other => Err(ParsingError::MalformedCommand {
            command: command.to_string(),
            reason: format!("unsupported attribute scalar: {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_is_clone_delete_merge_add_attrs() {
        let commands = vec![
            Command::AddNodeAttrs { node: "1".to_string(), attrs: AttrMap::new() },
            Command::AddNode { name: "x".to_string(), attrs: None },
            Command::Merge { nodes: vec!["1".to_string(), "2".to_string()], new_name: None },
            Command::DeleteNode { node: "3".to_string() },
            Command::Clone { node: "2".to_string(), new_name: Some("21".to_string()) },
        ];
        let canon = Command::canonicalize(commands);
        assert!(matches!(canon[0], Command::Clone { .. }));
        assert!(matches!(canon[1], Command::DeleteNode { .. }));
        assert!(matches!(canon[2], Command::Merge { .. }));
        assert!(matches!(canon[3], Command::AddNode { .. }));
        assert!(matches!(canon[4], Command::AddNodeAttrs { .. }));
    }

    #[test]
    fn parses_clone_then_delete_script() {
        let commands = Command::parse_script("clone 2 as 21. delete_node 3.").unwrap();
        assert_eq!(
            commands,
            vec![
                Command::Clone { node: "2".to_string(), new_name: Some("21".to_string()) },
                Command::DeleteNode { node: "3".to_string() },
            ]
        );
    }

    #[test]
    fn parses_attrs_json_payload() {
        let commands = Command::parse_script(r#"add_node_attrs 1 {"color": ["red", "blue"]}"#).unwrap();
        match &commands[0] {
            Command::AddNodeAttrs { node, attrs } => {
                assert_eq!(node, "1");
                assert_eq!(attrs.get("color").unwrap().len(), 2);
            }
            _ => panic!("expected AddNodeAttrs"),
        }
    }

    #[test]
    fn unknown_keyword_is_a_parsing_error() {
        let err = Command::parse_script("frobnicate 1").unwrap_err();
        assert!(matches!(err, ParsingError::UnknownKeyword(k) if k == "frobnicate"));
    }
}
