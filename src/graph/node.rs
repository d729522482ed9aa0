//! Node definitions and the node registry.
//!
//! A node is the smallest schedulable unit in the graph. Its role decides
//! how edge inference and trigger-rule resolution treat it: setup nodes run
//! before the work in their scope, teardown nodes run after it regardless
//! of outcome, normal nodes are plain work.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::GraphError;
use super::types::{NodeId, ScopeId};

/// The role of a node, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Ordinary work.
    #[default]
    Normal,

    /// Provisions a resource or environment before dependent work.
    Setup,

    /// Releases a resource or environment after dependent work, whether
    /// that work succeeded or failed.
    Teardown,
}

/// A registered node definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id.
    pub id: NodeId,

    /// Role, immutable after registration.
    pub role: Role,

    /// The scope this node belongs to (root if none was declared).
    pub scope: ScopeId,

    /// Whether this node's own failure marks the whole run as failed.
    ///
    /// Defaults to `false` for teardown nodes (cleanup failure should not
    /// abort sibling branches) and `true` for everything else.
    pub on_failure_fails_graph: bool,
}

impl Node {
    fn new(id: NodeId, role: Role, scope: ScopeId) -> Self {
        let on_failure_fails_graph = role != Role::Teardown;
        Self {
            id,
            role,
            scope,
            on_failure_fails_graph,
        }
    }
}

/// Owns every node definition, keyed by id, preserving declaration order.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, Node>,
    order: Vec<NodeId>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with the given role into the given scope.
    ///
    /// Fails with [`GraphError::DuplicateId`] if the id is already present
    /// with the same role, or [`GraphError::RoleConflict`] if it is present
    /// with a different role. The registry is unchanged on failure.
    pub fn register(&mut self, id: NodeId, role: Role, scope: ScopeId) -> Result<(), GraphError> {
        if let Some(existing) = self.nodes.get(&id) {
            if existing.role != role {
                return Err(GraphError::RoleConflict { id });
            }
            return Err(GraphError::DuplicateId(id));
        }

        self.order.push(id.clone());
        self.nodes.insert(id.clone(), Node::new(id, role, scope));
        Ok(())
    }

    /// Look up a node by id.
    pub fn lookup(&self, id: &NodeId) -> Result<&Node, GraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    /// Whether a node with this id has been registered.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Override the failure-propagation flag of a registered node.
    pub fn set_on_failure_fails_graph(
        &mut self,
        id: &NodeId,
        fails_graph: bool,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        node.on_failure_fails_graph = fails_graph;
        Ok(())
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The position of a node in declaration order.
    ///
    /// Used as the deterministic tie-break everywhere ordering matters.
    pub fn declaration_index(&self, id: &NodeId) -> Option<usize> {
        self.order.iter().position(|n| n == id)
    }

    /// All node ids in declaration order.
    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().map(|id| &self.nodes[id])
    }
}
