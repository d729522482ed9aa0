//! Graph validation: acyclicity, role consistency, scope containment.
//!
//! Checks run in order and short-circuit on the first failure, so an
//! invalid graph never reaches the resolver or the executor.

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use super::edge::{Edge, EdgeKind};
use super::error::GraphError;
use super::node::{NodeRegistry, Role};
use super::scope::ScopeTree;
use super::types::NodeId;

/// Validate the full edge set against the registry and scope tree.
pub fn validate(
    registry: &NodeRegistry,
    scopes: &ScopeTree,
    edges: &[Edge],
) -> Result<(), GraphError> {
    check_acyclic(registry, edges)?;
    check_roles(registry, edges)?;
    check_scope_containment(registry, scopes, edges)?;
    debug!(
        nodes = registry.len(),
        edges = edges.len(),
        "graph validated"
    );
    Ok(())
}

/// Kahn's algorithm over the union of explicit and inferred edges.
fn check_acyclic(registry: &NodeRegistry, edges: &[Edge]) -> Result<(), GraphError> {
    let ids = registry.ids();
    let index: HashMap<&NodeId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

    let mut in_degree = vec![0usize; ids.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for edge in edges {
        let from = index[&edge.from];
        let to = index[&edge.to];
        successors[from].push(to);
        in_degree[to] += 1;
    }

    let mut queue: VecDeque<usize> = (0..ids.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut visited = 0;

    while let Some(i) = queue.pop_front() {
        visited += 1;
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if visited != ids.len() {
        let cycle: Vec<NodeId> = (0..ids.len())
            .filter(|i| in_degree[*i] > 0)
            .map(|i| ids[i].clone())
            .collect();
        return Err(GraphError::Cycle(cycle));
    }
    Ok(())
}

/// Role consistency after inference.
///
/// A teardown must have something to wait for; a setup with no consumers
/// would never be scheduled meaningfully; a teardown may never feed a
/// setup.
fn check_roles(registry: &NodeRegistry, edges: &[Edge]) -> Result<(), GraphError> {
    for edge in edges {
        if edge.kind == EdgeKind::Explicit
            && registry.lookup(&edge.from)?.role == Role::Teardown
            && registry.lookup(&edge.to)?.role == Role::Setup
        {
            return Err(GraphError::TeardownFeedsSetup {
                from: edge.from.clone(),
                to: edge.to.clone(),
            });
        }
    }

    let has_pred: HashSet<&NodeId> = edges.iter().map(|e| &e.to).collect();
    let has_succ: HashSet<&NodeId> = edges.iter().map(|e| &e.from).collect();

    for node in registry.nodes() {
        match node.role {
            Role::Teardown if !has_pred.contains(&node.id) => {
                return Err(GraphError::OrphanTeardown(node.id.clone()));
            }
            Role::Setup if !has_succ.contains(&node.id) => {
                return Err(GraphError::OrphanSetup(node.id.clone()));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Scope containment: an explicit edge may leave a scope only from one of
/// its sink boundary nodes, and enter a scope only at one of its source
/// boundary nodes.
fn check_scope_containment(
    registry: &NodeRegistry,
    scopes: &ScopeTree,
    edges: &[Edge],
) -> Result<(), GraphError> {
    for edge in edges {
        if edge.kind != EdgeKind::Explicit {
            continue;
        }
        let from_scope = &registry.lookup(&edge.from)?.scope;
        let to_scope = &registry.lookup(&edge.to)?.scope;
        if from_scope == to_scope {
            continue;
        }

        // Scopes the edge leaves: ancestors of `from` not containing `to`.
        for scope_id in scopes.ancestry(from_scope) {
            if scopes.contains_scope(&scope_id, to_scope) {
                break;
            }
            let subtree: HashSet<NodeId> =
                scopes.members_recursive(&scope_id).into_iter().collect();
            let has_internal_successor = edges.iter().any(|e| {
                e.kind == EdgeKind::Explicit && e.from == edge.from && subtree.contains(&e.to)
            });
            if has_internal_successor {
                return Err(GraphError::ScopeLeak {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    scope: scope_id,
                });
            }
        }

        // Scopes the edge enters: ancestors of `to` not containing `from`.
        for scope_id in scopes.ancestry(to_scope) {
            if scopes.contains_scope(&scope_id, from_scope) {
                break;
            }
            let subtree: HashSet<NodeId> =
                scopes.members_recursive(&scope_id).into_iter().collect();
            let has_internal_predecessor = edges.iter().any(|e| {
                e.kind == EdgeKind::Explicit && e.to == edge.to && subtree.contains(&e.from)
            });
            if has_internal_predecessor {
                return Err(GraphError::ScopeLeak {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    scope: scope_id,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::{ChainTarget, EdgeBuilder};
    use crate::graph::types::ScopeId;

    fn add(
        registry: &mut NodeRegistry,
        tree: &mut ScopeTree,
        scope: &ScopeId,
        name: &str,
        role: Role,
    ) -> NodeId {
        let id = NodeId::new(name);
        registry.register(id.clone(), role, scope.clone()).unwrap();
        tree.add_member(scope, id.clone()).unwrap();
        id
    }

    fn chain(builder: &mut EdgeBuilder, registry: &NodeRegistry, tree: &ScopeTree, a: &str, b: &str) {
        builder
            .chain(
                &ChainTarget::node(a),
                &ChainTarget::node(b),
                registry,
                tree,
            )
            .unwrap();
    }

    #[test]
    fn test_valid_linear_graph() {
        let mut registry = NodeRegistry::new();
        let mut tree = ScopeTree::new();
        let mut builder = EdgeBuilder::new();
        let root = ScopeId::root();

        add(&mut registry, &mut tree, &root, "a", Role::Normal);
        add(&mut registry, &mut tree, &root, "b", Role::Normal);
        add(&mut registry, &mut tree, &root, "c", Role::Normal);
        chain(&mut builder, &registry, &tree, "a", "b");
        chain(&mut builder, &registry, &tree, "b", "c");

        assert!(validate(&registry, &tree, builder.edges()).is_ok());
    }

    #[test]
    fn test_cycle_detected_and_named() {
        let mut registry = NodeRegistry::new();
        let mut tree = ScopeTree::new();
        let mut builder = EdgeBuilder::new();
        let root = ScopeId::root();

        add(&mut registry, &mut tree, &root, "a", Role::Normal);
        add(&mut registry, &mut tree, &root, "b", Role::Normal);
        add(&mut registry, &mut tree, &root, "c", Role::Normal);
        chain(&mut builder, &registry, &tree, "a", "b");
        chain(&mut builder, &registry, &tree, "b", "c");
        chain(&mut builder, &registry, &tree, "c", "a");

        let result = validate(&registry, &tree, builder.edges());
        match result {
            Err(GraphError::Cycle(nodes)) => {
                let names: Vec<&str> = nodes.iter().map(NodeId::as_str).collect();
                assert_eq!(names, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_orphan_setup_rejected() {
        let mut registry = NodeRegistry::new();
        let mut tree = ScopeTree::new();
        let builder = EdgeBuilder::new();
        let root = ScopeId::root();

        add(&mut registry, &mut tree, &root, "lonely_setup", Role::Setup);

        let result = validate(&registry, &tree, builder.edges());
        assert!(matches!(result, Err(GraphError::OrphanSetup(_))));
    }

    #[test]
    fn test_orphan_teardown_rejected() {
        let mut registry = NodeRegistry::new();
        let mut tree = ScopeTree::new();
        let builder = EdgeBuilder::new();
        let root = ScopeId::root();

        add(&mut registry, &mut tree, &root, "lonely_teardown", Role::Teardown);

        let result = validate(&registry, &tree, builder.edges());
        assert!(matches!(result, Err(GraphError::OrphanTeardown(_))));
    }

    #[test]
    fn test_teardown_feeding_setup_rejected() {
        let mut registry = NodeRegistry::new();
        let mut tree = ScopeTree::new();
        let mut builder = EdgeBuilder::new();
        let root = ScopeId::root();

        add(&mut registry, &mut tree, &root, "work", Role::Normal);
        add(&mut registry, &mut tree, &root, "cleanup", Role::Teardown);
        add(&mut registry, &mut tree, &root, "provision", Role::Setup);
        add(&mut registry, &mut tree, &root, "late_work", Role::Normal);
        chain(&mut builder, &registry, &tree, "work", "cleanup");
        chain(&mut builder, &registry, &tree, "cleanup", "provision");
        chain(&mut builder, &registry, &tree, "provision", "late_work");

        let result = validate(&registry, &tree, builder.edges());
        assert!(matches!(result, Err(GraphError::TeardownFeedsSetup { .. })));
    }

    #[test]
    fn test_interior_edge_leaking_out_of_scope_rejected() {
        // inner: x -> y; x also chained straight to an outside node,
        // bypassing the scope's sink boundary (y).
        let mut registry = NodeRegistry::new();
        let mut tree = ScopeTree::new();
        let mut builder = EdgeBuilder::new();
        let root = ScopeId::root();
        let grp = tree.open_scope("grp", &root).unwrap();

        add(&mut registry, &mut tree, &grp, "x", Role::Normal);
        add(&mut registry, &mut tree, &grp, "y", Role::Normal);
        add(&mut registry, &mut tree, &root, "outside", Role::Normal);
        chain(&mut builder, &registry, &tree, "x", "y");
        chain(&mut builder, &registry, &tree, "x", "outside");

        let result = validate(&registry, &tree, builder.edges());
        match result {
            Err(GraphError::ScopeLeak { from, scope, .. }) => {
                assert_eq!(from.as_str(), "x");
                assert_eq!(scope.as_str(), "grp");
            }
            other => panic!("expected scope leak, got {:?}", other),
        }
    }

    #[test]
    fn test_boundary_edge_crossing_scope_allowed() {
        // y is grp's sink, so y -> outside goes through the boundary.
        let mut registry = NodeRegistry::new();
        let mut tree = ScopeTree::new();
        let mut builder = EdgeBuilder::new();
        let root = ScopeId::root();
        let grp = tree.open_scope("grp", &root).unwrap();

        add(&mut registry, &mut tree, &grp, "x", Role::Normal);
        add(&mut registry, &mut tree, &grp, "y", Role::Normal);
        add(&mut registry, &mut tree, &root, "outside", Role::Normal);
        chain(&mut builder, &registry, &tree, "x", "y");
        chain(&mut builder, &registry, &tree, "y", "outside");

        assert!(validate(&registry, &tree, builder.edges()).is_ok());
    }

    #[test]
    fn test_edge_into_scope_interior_rejected() {
        let mut registry = NodeRegistry::new();
        let mut tree = ScopeTree::new();
        let mut builder = EdgeBuilder::new();
        let root = ScopeId::root();
        let grp = tree.open_scope("grp", &root).unwrap();

        add(&mut registry, &mut tree, &root, "outside", Role::Normal);
        add(&mut registry, &mut tree, &grp, "x", Role::Normal);
        add(&mut registry, &mut tree, &grp, "y", Role::Normal);
        chain(&mut builder, &registry, &tree, "x", "y");
        // y already has an internal predecessor, so it is interior on the
        // incoming side.
        chain(&mut builder, &registry, &tree, "outside", "y");

        let result = validate(&registry, &tree, builder.edges());
        assert!(matches!(result, Err(GraphError::ScopeLeak { .. })));
    }
}
