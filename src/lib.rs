//! Gantry: a setup/teardown-aware task dependency graph engine.
//!
//! Nodes in a directed task graph can be marked as setup (resource
//! provisioning) or teardown (resource cleanup). Gantry builds, validates,
//! and resolves such graphs, guaranteeing that a teardown runs whenever
//! its setup ran, whatever happened to the work in between, while plain
//! chaining keeps expressing ordinary sequential dependency. Execution
//! itself belongs to an external executor, which consumes the resolved
//! graph and its trigger rules.
//!
//! ```
//! use gantry::{GraphBuilder, NodeId, TriggerRule};
//!
//! let mut builder = GraphBuilder::new();
//! builder.add_setup("create_cluster").unwrap();
//! builder.add_node("run_query").unwrap();
//! builder.add_teardown("delete_cluster").unwrap();
//!
//! let graph = builder.build().unwrap();
//! assert_eq!(
//!     graph.node(&NodeId::new("delete_cluster")).unwrap().trigger_rule,
//!     TriggerRule::AllDone,
//! );
//! ```

pub mod graph;

pub use graph::builder::GraphBuilder;
pub use graph::edge::{ChainTarget, Edge, EdgeBuilder, EdgeKind};
pub use graph::error::GraphError;
pub use graph::node::{Node, NodeRegistry, Role};
pub use graph::resolve::{
    RequiredState, ResolvedGraph, ResolvedNode, TopologicalOrder, TriggerRule,
};
pub use graph::scope::{Scope, ScopeTree};
pub use graph::types::{NodeId, ScopeId};
pub use graph::validate::validate;
