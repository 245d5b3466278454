//! Error kinds for every public surface of the crate.

use thiserror::Error;

use crate::attr::AttrKey;
use crate::graph::NodeId;

/// A homomorphism failed to satisfy one of the structure- or
/// attribute-preservation conditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidHomomorphism {
    #[error("mapping is not total: node '{0}' has no image")]
    NotTotal(NodeId),
    #[error("edge ({0}, {1}) has no image edge under the mapping")]
    MissingEdgeImage(NodeId, NodeId),
    #[error("attributes of node '{0}' are not a subset of its image's attributes")]
    NodeAttrNotSubset(NodeId),
    #[error("attributes of edge ({0}, {1}) are not a subset of its image edge's attributes")]
    EdgeAttrNotSubset(NodeId, NodeId),
}

/// Errors raised by the bare graph primitives (`AttrGraph`, `GraphBackend`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node '{0}' does not exist")]
    UnknownNode(NodeId),
    #[error("edge ({0}, {1}) does not exist")]
    UnknownEdge(NodeId, NodeId),
    #[error("duplicate node '{0}'")]
    Duplicate(NodeId),
}

/// Errors raised while editing a `Rule`'s span.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("node '{0}' does not exist in the relevant side of the rule")]
    UnknownNode(NodeId),
    #[error("node '{0}' already exists in the right hand side of the rule")]
    DuplicateNode(NodeId),
    #[error("edge ({0}, {1}) already exists in the right hand side of the rule")]
    EdgeAlreadyExists(NodeId, NodeId),
    #[error("edge ({0}, {1}) does not exist in the rule")]
    EdgeMissing(NodeId, NodeId),
    #[error("node '{0}' is being deleted by the rule, cannot edit it")]
    CannotEditDeletedNode(NodeId),
    #[error("node '{0}' is the result of a merge, cannot clone it")]
    CannotCloneMergedNode(NodeId),
    #[error(transparent)]
    Homomorphism(#[from] InvalidHomomorphism),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors raised parsing the mini rule-transformation command language (§6).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("unknown command keyword '{0}'")]
    UnknownKeyword(String),
    #[error("malformed command '{command}': {reason}")]
    MalformedCommand { command: String, reason: String },
}

/// Errors raised by `Hierarchy` operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("graph '{0}' already exists in the hierarchy")]
    DuplicateGraphId(String),
    #[error("graph '{0}' is not in the hierarchy")]
    UnknownGraphId(String),
    #[error("adding this typing edge would introduce a cycle")]
    CycleIntroduced,
    #[error("paths from '{0}' to '{1}' do not commute")]
    PathsDoNotCommute(String, String),
    #[error("propagation was cancelled after repairing '{0}'")]
    Cancelled(String),
    #[error(transparent)]
    Homomorphism(#[from] InvalidHomomorphism),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Re-exported for callers that want to name an attribute key in an error
/// message without importing `attr` directly.
pub type Key = AttrKey;
