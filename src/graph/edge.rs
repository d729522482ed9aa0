//! Edge set construction: explicit chaining and inferred setup/teardown edges.
//!
//! User declarations arrive as chain calls (`a >> b` in the declaration
//! layer) and explicit setup/teardown pairings. On top of those, the
//! builder infers the edges that make setup/teardown semantics work without
//! manual wiring: every setup precedes the unrooted work in its scope, and
//! every teardown waits for whatever in its scope has nothing else
//! downstream.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::error::GraphError;
use super::node::{NodeRegistry, Role};
use super::scope::ScopeTree;
use super::types::{NodeId, ScopeId};

/// How an edge came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Declared by the user via chaining or pairing.
    Explicit,

    /// Added by scope inference.
    Inferred,
}

/// A directed edge: `to` depends on `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

/// One side of a chain declaration: a single node or a whole scope.
///
/// Scope targets are expanded to their boundary nodes, which is how
/// group-to-group chaining (`normal >> section_1 >> section_2`) is realized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainTarget {
    Node(NodeId),
    Scope(ScopeId),
}

impl ChainTarget {
    /// Target a single node.
    pub fn node(id: impl Into<NodeId>) -> Self {
        Self::Node(id.into())
    }

    /// Target a whole scope.
    pub fn scope(id: impl Into<ScopeId>) -> Self {
        Self::Scope(id.into())
    }
}

/// Builds the directed edge set from chain declarations, pairings, and
/// per-scope inference. Insertion order is preserved and duplicate edges
/// are dropped, so the resulting set is deterministic for a given
/// declaration sequence.
#[derive(Debug, Default)]
pub struct EdgeBuilder {
    edges: Vec<Edge>,
    seen: HashSet<(NodeId, NodeId)>,
    /// Explicit setup -> teardown pairings, exempt from scope-wide inference.
    pairs: Vec<(NodeId, NodeId)>,
}

impl EdgeBuilder {
    /// Create an empty edge builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The edge set built so far, in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Consume the builder, yielding the edge set.
    pub fn into_edges(self) -> Vec<Edge> {
        self.edges
    }

    fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        if self.seen.insert((from.clone(), to.clone())) {
            self.edges.push(Edge { from, to, kind });
        }
    }

    /// Declare an explicit chain: everything `from` resolves to must
    /// complete before anything `to` resolves to starts.
    ///
    /// Scope targets expand to boundary nodes: the effective sinks of
    /// `from` are connected to the effective sources of `to`.
    pub fn chain(
        &mut self,
        from: &ChainTarget,
        to: &ChainTarget,
        registry: &NodeRegistry,
        scopes: &ScopeTree,
    ) -> Result<(), GraphError> {
        let sinks = self.resolve_boundary(from, registry, scopes, BoundarySide::Sink)?;
        let sources = self.resolve_boundary(to, registry, scopes, BoundarySide::Source)?;

        for sink in &sinks {
            for source in &sources {
                self.add_edge(sink.clone(), source.clone(), EdgeKind::Explicit);
            }
        }
        Ok(())
    }

    /// Explicitly pair a setup with its teardown.
    ///
    /// The pairing edge takes precedence over scope-wide inference: neither
    /// member participates in the ordinary per-scope setup/teardown rules.
    pub fn pair(
        &mut self,
        setup: &NodeId,
        teardown: &NodeId,
        registry: &NodeRegistry,
    ) -> Result<(), GraphError> {
        let setup_node = registry.lookup(setup)?;
        let teardown_node = registry.lookup(teardown)?;

        if setup_node.role == Role::Teardown {
            return Err(GraphError::TeardownFeedsSetup {
                from: setup.clone(),
                to: teardown.clone(),
            });
        }
        if setup_node.role != Role::Setup {
            return Err(GraphError::RoleConflict { id: setup.clone() });
        }
        if teardown_node.role != Role::Teardown {
            return Err(GraphError::RoleConflict {
                id: teardown.clone(),
            });
        }

        self.pairs.push((setup.clone(), teardown.clone()));
        self.add_edge(setup.clone(), teardown.clone(), EdgeKind::Explicit);
        Ok(())
    }

    /// Run setup/teardown inference for one scope.
    ///
    /// Rule 1: every unpaired setup member (and every setup-unit child
    /// scope, through its leaf sinks) gets an inferred edge to every normal
    /// member with no explicit in-scope predecessor.
    ///
    /// Rule 2: every unpaired teardown member gets an inferred edge from
    /// every normal/setup member (and setup-unit sink) that still has no
    /// in-scope successor once rule 1 has run.
    pub fn infer_scope_edges(
        &mut self,
        scope_id: &ScopeId,
        registry: &NodeRegistry,
        scopes: &ScopeTree,
    ) -> Result<(), GraphError> {
        let scope = scopes.get(scope_id)?;
        let members = scope.members.clone();

        let paired: HashSet<&NodeId> = self
            .pairs
            .iter()
            .flat_map(|(s, t)| [s, t])
            .collect();

        // Leaf sinks of setup-unit children stand in for the whole unit.
        let mut in_scope: HashSet<NodeId> = members.iter().cloned().collect();
        let mut unit_sinks: Vec<NodeId> = Vec::new();
        for child in &scope.children {
            if !scopes.get(child)?.is_setup_unit {
                continue;
            }
            let subtree = scopes.members_recursive(child);
            let subtree_set: HashSet<NodeId> = subtree.iter().cloned().collect();
            for id in &subtree {
                if registry.lookup(id)?.role == Role::Normal
                    && !self.has_successor_in(id, &subtree_set)
                {
                    unit_sinks.push(id.clone());
                }
            }
            in_scope.extend(subtree);
        }

        let mut setups = Vec::new();
        let mut normals = Vec::new();
        let mut teardowns = Vec::new();
        for id in &members {
            if paired.contains(id) {
                continue;
            }
            match registry.lookup(id)?.role {
                Role::Setup => setups.push(id.clone()),
                Role::Normal => normals.push(id.clone()),
                Role::Teardown => teardowns.push(id.clone()),
            }
        }

        // Rule 1: setups precede the scope's unrooted normal work.
        let rootless: Vec<NodeId> = normals
            .iter()
            .filter(|n| !self.has_explicit_predecessor_in(n, &in_scope))
            .cloned()
            .collect();
        for n in &rootless {
            for s in &setups {
                self.add_edge(s.clone(), n.clone(), EdgeKind::Inferred);
            }
            for sink in &unit_sinks {
                self.add_edge(sink.clone(), n.clone(), EdgeKind::Inferred);
            }
        }

        // Rule 2: teardowns wait on every member still without downstream.
        if !teardowns.is_empty() {
            let mut candidates: Vec<NodeId> = Vec::new();
            for id in setups.iter().chain(normals.iter()).chain(unit_sinks.iter()) {
                if !self.has_successor_in(id, &in_scope) {
                    candidates.push(id.clone());
                }
            }
            for t in &teardowns {
                for c in &candidates {
                    self.add_edge(c.clone(), t.clone(), EdgeKind::Inferred);
                }
            }
        }

        debug!(
            scope = %scope_id,
            edges = self.edges.len(),
            "scope edge inference complete"
        );
        Ok(())
    }

    /// Resolve a chain target to its boundary nodes on one side.
    fn resolve_boundary(
        &self,
        target: &ChainTarget,
        registry: &NodeRegistry,
        scopes: &ScopeTree,
        side: BoundarySide,
    ) -> Result<Vec<NodeId>, GraphError> {
        match target {
            ChainTarget::Node(id) => {
                registry.lookup(id)?;
                Ok(vec![id.clone()])
            }
            ChainTarget::Scope(id) => {
                scopes.get(id)?;
                // Setup and teardown members never participate in
                // group-to-group chaining; if a scope holds nothing but
                // those, fall back to all members so it can still be
                // chained (a setup-unit scope used directly in a chain).
                let chainable = scopes.members_recursive_skipping_setup_units(id);
                let mut pool: Vec<NodeId> = Vec::new();
                for member in &chainable {
                    if registry.lookup(member)?.role == Role::Normal {
                        pool.push(member.clone());
                    }
                }
                if pool.is_empty() {
                    pool = scopes.members_recursive(id);
                }

                let subtree: HashSet<NodeId> =
                    scopes.members_recursive(id).into_iter().collect();
                Ok(pool
                    .into_iter()
                    .filter(|n| match side {
                        BoundarySide::Source => !self.has_explicit_predecessor_in(n, &subtree),
                        BoundarySide::Sink => !self.has_explicit_successor_in(n, &subtree),
                    })
                    .collect())
            }
        }
    }

    fn has_explicit_predecessor_in(&self, id: &NodeId, set: &HashSet<NodeId>) -> bool {
        self.edges
            .iter()
            .any(|e| e.kind == EdgeKind::Explicit && &e.to == id && set.contains(&e.from))
    }

    fn has_explicit_successor_in(&self, id: &NodeId, set: &HashSet<NodeId>) -> bool {
        self.edges
            .iter()
            .any(|e| e.kind == EdgeKind::Explicit && &e.from == id && set.contains(&e.to))
    }

    /// Successor check over explicit and inferred edges alike.
    fn has_successor_in(&self, id: &NodeId, set: &HashSet<NodeId>) -> bool {
        self.edges
            .iter()
            .any(|e| &e.from == id && set.contains(&e.to))
    }
}

#[derive(Clone, Copy)]
enum BoundarySide {
    Source,
    Sink,
}
