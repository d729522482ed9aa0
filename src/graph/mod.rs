//! Task dependency graph construction with setup/teardown semantics.
//!
//! User declarations flow through the [`builder::GraphBuilder`] into the
//! node registry and scope tree, the edge builder adds explicit and
//! inferred edges, validation checks acyclicity, role consistency, and
//! scope containment, and the resolver freezes the result into a
//! [`resolve::ResolvedGraph`] for an external executor.

pub mod builder;
pub mod edge;
pub mod error;
pub mod node;
pub mod resolve;
pub mod scope;
pub mod types;
pub mod validate;
