//! Declaration facade for constructing graphs fluently.
//!
//! `GraphBuilder` mirrors how a workflow is written down: nodes are added
//! into the scope currently open, scopes nest like `with`-blocks, and
//! `chain` is the method form of the `>>` operator. `build` runs scope
//! inference, validation, and resolution in one pass; on any failure the
//! partial structure is discarded.

use tracing::debug;

use super::edge::{ChainTarget, EdgeBuilder};
use super::error::GraphError;
use super::node::{NodeRegistry, Role};
use super::resolve::{resolve, ResolvedGraph};
use super::scope::ScopeTree;
use super::types::{NodeId, ScopeId};
use super::validate::validate;

/// Builder for declaring a graph: nodes, scopes, chains, and pairings.
#[derive(Debug)]
pub struct GraphBuilder {
    registry: NodeRegistry,
    scopes: ScopeTree,
    edges: EdgeBuilder,
    /// Stack of open scopes; the last entry is where nodes land.
    stack: Vec<ScopeId>,
}

impl GraphBuilder {
    /// Create a builder with only the root scope open.
    pub fn new() -> Self {
        Self {
            registry: NodeRegistry::new(),
            scopes: ScopeTree::new(),
            edges: EdgeBuilder::new(),
            stack: vec![ScopeId::root()],
        }
    }

    fn current_scope(&self) -> &ScopeId {
        self.stack.last().expect("root scope is never popped")
    }

    fn register(&mut self, id: impl Into<NodeId>, role: Role) -> Result<&mut Self, GraphError> {
        let id = id.into();
        let scope = self.current_scope().clone();
        // Closed-scope check comes first so a failure leaves no partial
        // registration behind.
        if self.scopes.get(&scope)?.closed {
            return Err(GraphError::ScopeClosed(scope));
        }
        self.registry.register(id.clone(), role, scope.clone())?;
        self.scopes.add_member(&scope, id)?;
        Ok(self)
    }

    /// Add a normal node into the current scope.
    pub fn add_node(&mut self, id: impl Into<NodeId>) -> Result<&mut Self, GraphError> {
        self.register(id, Role::Normal)
    }

    /// Add a setup node into the current scope.
    pub fn add_setup(&mut self, id: impl Into<NodeId>) -> Result<&mut Self, GraphError> {
        self.register(id, Role::Setup)
    }

    /// Add a teardown node into the current scope.
    pub fn add_teardown(&mut self, id: impl Into<NodeId>) -> Result<&mut Self, GraphError> {
        self.register(id, Role::Teardown)
    }

    /// Open a nested scope (task group) and make it current.
    pub fn open_scope(&mut self, name: &str) -> Result<ScopeId, GraphError> {
        let parent = self.current_scope().clone();
        let id = self.scopes.open_scope(name, &parent)?;
        self.stack.push(id.clone());
        Ok(id)
    }

    /// Open a nested scope flagged as a composite setup unit: its whole
    /// contained graph acts as one setup for the enclosing scope.
    pub fn open_setup_group(&mut self, name: &str) -> Result<ScopeId, GraphError> {
        let id = self.open_scope(name)?;
        self.scopes.mark_setup_unit(&id)?;
        Ok(id)
    }

    /// Close the current scope and return to its parent.
    pub fn close_scope(&mut self) -> Result<&mut Self, GraphError> {
        if self.stack.len() == 1 {
            // The root scope closes implicitly in build().
            return Ok(self);
        }
        let id = self.stack.pop().expect("stack is non-empty");
        self.scopes.close_scope(&id)?;
        Ok(self)
    }

    /// Chain targets in sequence: each one must complete before the next
    /// starts. A target names either a node or a scope; scopes are
    /// expanded to their boundary nodes.
    pub fn chain(&mut self, targets: &[&str]) -> Result<&mut Self, GraphError> {
        for pair in targets.windows(2) {
            let from = self.resolve_target(pair[0])?;
            let to = self.resolve_target(pair[1])?;
            self.edges.chain(&from, &to, &self.registry, &self.scopes)?;
        }
        Ok(self)
    }

    /// Explicitly pair a setup node with its teardown.
    pub fn pair(&mut self, setup: &str, teardown: &str) -> Result<&mut Self, GraphError> {
        self.edges
            .pair(&NodeId::new(setup), &NodeId::new(teardown), &self.registry)?;
        Ok(self)
    }

    /// Override whether a node's own failure fails the whole run.
    pub fn on_failure_fails_graph(
        &mut self,
        id: &str,
        fails_graph: bool,
    ) -> Result<&mut Self, GraphError> {
        self.registry
            .set_on_failure_fails_graph(&NodeId::new(id), fails_graph)?;
        Ok(self)
    }

    fn resolve_target(&self, name: &str) -> Result<ChainTarget, GraphError> {
        let as_node = NodeId::new(name);
        if self.registry.contains(&as_node) {
            return Ok(ChainTarget::Node(as_node));
        }
        let as_scope = ScopeId::new(name);
        if self.scopes.contains(&as_scope) {
            return Ok(ChainTarget::Scope(as_scope));
        }
        let relative = self.current_scope().child(name);
        if self.scopes.contains(&relative) {
            return Ok(ChainTarget::Scope(relative));
        }
        Err(GraphError::NodeNotFound(as_node))
    }

    /// Run inference, validation, and resolution, yielding the immutable
    /// graph the executor consumes.
    pub fn build(mut self) -> Result<ResolvedGraph, GraphError> {
        // Close whatever is still open, innermost first.
        while self.stack.len() > 1 {
            let id = self.stack.pop().expect("stack is non-empty");
            self.scopes.close_scope(&id)?;
        }
        self.scopes.close_scope(&ScopeId::root())?;

        // Infer per scope, innermost scopes first, creation order within
        // a depth level, so nested groups settle before their parents.
        let mut order: Vec<ScopeId> = self.scopes.ids().to_vec();
        order.sort_by_key(|id| std::cmp::Reverse(self.scopes.depth(id)));
        for scope in &order {
            self.edges
                .infer_scope_edges(scope, &self.registry, &self.scopes)?;
        }

        validate(&self.registry, &self.scopes, self.edges.edges())?;

        debug!(
            nodes = self.registry.len(),
            edges = self.edges.edges().len(),
            "graph built"
        );
        Ok(resolve(&self.registry, self.edges.into_edges()))
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
