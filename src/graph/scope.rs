//! The scope tree: nested task groups that delimit setup/teardown reach.
//!
//! Scopes nest arbitrarily deep. The tree owns its scopes top-down; the
//! parent reference on each scope is a back-reference for lookup only. A
//! scope flagged as a setup unit (the taskgroup-as-setup pattern) is
//! treated as one composite setup: all of its leaf normal nodes must
//! complete before any external consumer of the scope is satisfied.

use std::collections::HashMap;

use super::error::GraphError;
use super::node::{Node, NodeRegistry, Role};
use super::types::{NodeId, ScopeId};

/// A single scope (task group) in the tree.
#[derive(Debug)]
pub struct Scope {
    /// Path-qualified id.
    pub id: ScopeId,

    /// Parent scope, `None` only for the root. Lookup only, never ownership.
    pub parent: Option<ScopeId>,

    /// Direct member nodes in declaration order.
    pub members: Vec<NodeId>,

    /// Direct child scopes in creation order.
    pub children: Vec<ScopeId>,

    /// Once closed, no further nodes may be registered.
    pub closed: bool,

    /// Whether this scope acts as one composite setup unit in its parent.
    pub is_setup_unit: bool,
}

impl Scope {
    fn new(id: ScopeId, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            parent,
            members: Vec::new(),
            children: Vec::new(),
            closed: false,
            is_setup_unit: false,
        }
    }
}

/// Tree of nested scopes, with the root scope pre-created.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: HashMap<ScopeId, Scope>,
    /// Creation order, used to drive deterministic per-scope inference.
    order: Vec<ScopeId>,
}

impl ScopeTree {
    /// Create a tree containing only the root scope.
    pub fn new() -> Self {
        let root = ScopeId::root();
        let mut scopes = HashMap::new();
        scopes.insert(root.clone(), Scope::new(root.clone(), None));
        Self {
            scopes,
            order: vec![root],
        }
    }

    /// Open a child scope under `parent`.
    ///
    /// Fails with [`GraphError::DuplicateScope`] if a child of that name
    /// already exists under the parent.
    pub fn open_scope(&mut self, name: &str, parent: &ScopeId) -> Result<ScopeId, GraphError> {
        let id = {
            let parent_scope = self.get(parent)?;
            let id = parent_scope.id.child(name);
            if parent_scope.children.contains(&id) {
                return Err(GraphError::DuplicateScope {
                    name: name.to_string(),
                    parent: parent.clone(),
                });
            }
            id
        };

        self.scopes
            .get_mut(parent)
            .ok_or_else(|| GraphError::ScopeNotFound(parent.clone()))?
            .children
            .push(id.clone());
        self.scopes
            .insert(id.clone(), Scope::new(id.clone(), Some(parent.clone())));
        self.order.push(id.clone());
        Ok(id)
    }

    /// Finalize a scope's membership.
    pub fn close_scope(&mut self, id: &ScopeId) -> Result<(), GraphError> {
        self.get_mut(id)?.closed = true;
        Ok(())
    }

    /// Flag a scope as a composite setup unit within its parent.
    pub fn mark_setup_unit(&mut self, id: &ScopeId) -> Result<(), GraphError> {
        self.get_mut(id)?.is_setup_unit = true;
        Ok(())
    }

    /// Append a node to a scope's member list.
    ///
    /// Fails with [`GraphError::ScopeClosed`] if the scope is closed.
    pub fn add_member(&mut self, scope: &ScopeId, node: NodeId) -> Result<(), GraphError> {
        let scope = self.get_mut(scope)?;
        if scope.closed {
            return Err(GraphError::ScopeClosed(scope.id.clone()));
        }
        scope.members.push(node);
        Ok(())
    }

    /// Look up a scope by id.
    pub fn get(&self, id: &ScopeId) -> Result<&Scope, GraphError> {
        self.scopes
            .get(id)
            .ok_or_else(|| GraphError::ScopeNotFound(id.clone()))
    }

    fn get_mut(&mut self, id: &ScopeId) -> Result<&mut Scope, GraphError> {
        self.scopes
            .get_mut(id)
            .ok_or_else(|| GraphError::ScopeNotFound(id.clone()))
    }

    /// Whether a scope with this id exists.
    pub fn contains(&self, id: &ScopeId) -> bool {
        self.scopes.contains_key(id)
    }

    /// All scope ids in creation order (root first).
    pub fn ids(&self) -> &[ScopeId] {
        &self.order
    }

    /// Nesting depth of a scope (root is 0).
    pub fn depth(&self, id: &ScopeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(scope) = self.scopes.get(current) {
            match &scope.parent {
                Some(parent) => {
                    depth += 1;
                    current = parent;
                }
                None => break,
            }
        }
        depth
    }

    /// Whether `ancestor` contains `scope` (a scope contains itself).
    pub fn contains_scope(&self, ancestor: &ScopeId, scope: &ScopeId) -> bool {
        let mut current = Some(scope.clone());
        while let Some(id) = current {
            if &id == ancestor {
                return true;
            }
            current = self.scopes.get(&id).and_then(|s| s.parent.clone());
        }
        false
    }

    /// The chain of scopes from `scope` up to (excluding) the root,
    /// innermost first.
    pub fn ancestry(&self, scope: &ScopeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        let mut current = Some(scope.clone());
        while let Some(id) = current {
            if id.is_root() {
                break;
            }
            current = self.scopes.get(&id).and_then(|s| s.parent.clone());
            chain.push(id);
        }
        chain
    }

    /// Every node in the scope's subtree, declaration order within each
    /// scope, parents before children.
    pub fn members_recursive(&self, scope: &ScopeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_members(scope, false, &mut out);
        out
    }

    /// Like [`members_recursive`](Self::members_recursive), but skipping the
    /// subtrees of children flagged as setup units. This is the membership
    /// used for group-to-group chaining, where a composite setup's internals
    /// are not ordinary boundary candidates.
    pub fn members_recursive_skipping_setup_units(&self, scope: &ScopeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_members(scope, true, &mut out);
        out
    }

    fn collect_members(&self, scope: &ScopeId, skip_setup_units: bool, out: &mut Vec<NodeId>) {
        if let Some(s) = self.scopes.get(scope) {
            out.extend(s.members.iter().cloned());
            for child in &s.children {
                let child_is_setup_unit = self
                    .scopes
                    .get(child)
                    .map(|c| c.is_setup_unit)
                    .unwrap_or(false);
                if skip_setup_units && child_is_setup_unit {
                    continue;
                }
                self.collect_members(child, skip_setup_units, out);
            }
        }
    }

    /// Direct setup members of a scope, in declaration order.
    pub fn setups_of<'a>(
        &'a self,
        scope: &ScopeId,
        registry: &'a NodeRegistry,
    ) -> Result<Vec<&'a Node>, GraphError> {
        self.members_with_role(scope, registry, Role::Setup)
    }

    /// Direct teardown members of a scope, in declaration order.
    pub fn teardowns_of<'a>(
        &'a self,
        scope: &ScopeId,
        registry: &'a NodeRegistry,
    ) -> Result<Vec<&'a Node>, GraphError> {
        self.members_with_role(scope, registry, Role::Teardown)
    }

    /// Direct normal members of a scope, in declaration order.
    pub fn normals_of<'a>(
        &'a self,
        scope: &ScopeId,
        registry: &'a NodeRegistry,
    ) -> Result<Vec<&'a Node>, GraphError> {
        self.members_with_role(scope, registry, Role::Normal)
    }

    fn members_with_role<'a>(
        &'a self,
        scope: &ScopeId,
        registry: &'a NodeRegistry,
        role: Role,
    ) -> Result<Vec<&'a Node>, GraphError> {
        let scope = self.get(scope)?;
        let mut out = Vec::new();
        for id in &scope.members {
            let node = registry.lookup(id)?;
            if node.role == role {
                out.push(node);
            }
        }
        Ok(out)
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
