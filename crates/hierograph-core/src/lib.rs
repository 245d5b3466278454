//! A typed graph-rewriting engine over a hierarchy of typed graphs.
//!
//! [`category`] is the pure category-theoretic kernel (homomorphisms,
//! pullback, pushout, pullback-complement) that everything else is built
//! from. [`rule`] describes one rewrite as a span `L <- P -> R`; [`rewrite`]
//! applies a rule via sesqui-pushout rewriting. [`hierarchy`] tracks a DAG of
//! typed graphs connected by typing homomorphisms and propagates the effect
//! of a rewrite through it.

pub mod attr;
pub mod backend;
pub mod category;
pub mod command;
pub mod config;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod rewrite;
pub mod rule;
pub mod util;

pub use attr::{AttrKey, AttrMap, AttrVal, Scalar};
pub use backend::{GraphBackend, GraphHandle, MemoryBackend};
pub use category::Mapping;
pub use command::Command;
pub use config::EngineConfig;
pub use error::{GraphError, HierarchyError, InvalidHomomorphism, ParsingError, RuleError};
pub use graph::{AttrGraph, EdgeId, NodeId};
pub use hierarchy::{CancellationToken, Hierarchy};
pub use rewrite::{RewriteDelta, RewriteResult, Rewriter};
pub use rule::Rule;
