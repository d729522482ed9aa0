//! Construction-time error taxonomy.
//!
//! Every error here is raised while a graph is being declared, inferred,
//! or validated. An invalid graph never reaches the executor: construction
//! aborts on the first failure and the partial structure is discarded.

use thiserror::Error;

use super::types::{NodeId, ScopeId};

/// Errors that can occur while constructing or validating a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node id was registered twice.
    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    /// A node's declared role conflicts with how it is being used, e.g.
    /// re-registration under a different role or pairing a normal node as
    /// a setup.
    #[error("conflicting role for node '{id}'")]
    RoleConflict { id: NodeId },

    /// A node id was referenced but never registered.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// A scope name was opened twice under the same parent.
    #[error("duplicate scope '{name}' under {parent}")]
    DuplicateScope { name: String, parent: ScopeId },

    /// A node was registered into a scope that has been closed.
    #[error("scope {0} is closed, no further nodes may be registered")]
    ScopeClosed(ScopeId),

    /// A scope id was referenced but never opened.
    #[error("scope not found: {0}")]
    ScopeNotFound(ScopeId),

    /// The edge set contains a cycle.
    #[error("cycle detected involving nodes: {}", .0.iter().map(NodeId::as_str).collect::<Vec<_>>().join(", "))]
    Cycle(Vec<NodeId>),

    /// A setup node has no consumers and no paired teardown, so it would
    /// never be scheduled meaningfully.
    #[error("setup node '{0}' has no consumers and no paired teardown")]
    OrphanSetup(NodeId),

    /// A teardown node has nothing to wait for, even after inference.
    #[error("teardown node '{0}' has no predecessors")]
    OrphanTeardown(NodeId),

    /// A teardown node was used as the setup side of a pairing or chained
    /// into a setup node.
    #[error("teardown node '{from}' cannot feed setup node '{to}'")]
    TeardownFeedsSetup { from: NodeId, to: NodeId },

    /// An explicit edge crosses a scope boundary without going through a
    /// boundary (source/sink) node of that scope.
    #[error("edge '{from}' -> '{to}' leaks across the boundary of scope {scope}")]
    ScopeLeak {
        from: NodeId,
        to: NodeId,
        scope: ScopeId,
    },
}
