//! Dependency resolution: trigger rules and the executor-facing graph.
//!
//! Once validation passes, the resolver assigns each node the rule that
//! governs when it becomes eligible to run, flags the nodes whose only
//! consumers are teardowns, and freezes everything into an immutable
//! [`ResolvedGraph`] consumed by an external executor.

use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use tracing::debug;

use super::edge::Edge;
use super::node::{NodeRegistry, Role};
use super::types::NodeId;

/// The predecessor-completion policy governing when a node may run.
///
/// Computed once during resolution, immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    /// All predecessors must have succeeded (normal and setup nodes).
    AllSuccess,

    /// All predecessors must have reached a terminal state, success or
    /// failure (forced for teardown nodes).
    AllDone,

    /// Derived for nodes downstream of a teardown: setup-side
    /// predecessors must have succeeded, teardown predecessors need only
    /// have completed.
    AllSetupSuccessOrTeardownComplete,
}

/// The terminal state a node requires of one particular predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredState {
    /// The predecessor must have succeeded.
    Success,

    /// Any terminal state of the predecessor will do.
    Done,
}

/// A node in the resolved graph, as exposed to the executor.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedNode {
    pub id: NodeId,
    pub role: Role,
    pub trigger_rule: TriggerRule,

    /// True when every consumer of this node is a teardown, so the
    /// executor knows that this node's failure must still let teardown
    /// proceed (teardown is `AllDone`), including under cancellation.
    pub terminal_before_teardown: bool,

    /// Whether this node's own failure marks the whole run failed.
    pub on_failure_fails_graph: bool,
}

/// The validated, resolved, immutable graph handed to the executor.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedGraph {
    nodes: Vec<ResolvedNode>,
    edges: Vec<Edge>,
    /// Per-node predecessors with the terminal state each one must reach.
    deps: BTreeMap<NodeId, Vec<(NodeId, RequiredState)>>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
}

/// Compute trigger rules and freeze the graph.
///
/// The edge set must already have passed validation; in particular it must
/// be acyclic.
pub fn resolve(registry: &NodeRegistry, edges: Vec<Edge>) -> ResolvedGraph {
    let mut deps: BTreeMap<NodeId, Vec<(NodeId, RequiredState)>> = BTreeMap::new();
    let mut has_teardown_pred: HashMap<&NodeId, bool> = HashMap::new();
    let mut consumers: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();

    for edge in &edges {
        let from_role = registry
            .lookup(&edge.from)
            .map(|n| n.role)
            .unwrap_or_default();
        if from_role == Role::Teardown {
            has_teardown_pred.insert(&edge.to, true);
        }
        consumers.entry(&edge.from).or_default().push(&edge.to);
    }

    let mut nodes = Vec::with_capacity(registry.len());
    let mut index = HashMap::with_capacity(registry.len());

    for node in registry.nodes() {
        let trigger_rule = match node.role {
            Role::Teardown => TriggerRule::AllDone,
            _ if has_teardown_pred.get(&node.id).copied().unwrap_or(false) => {
                TriggerRule::AllSetupSuccessOrTeardownComplete
            }
            _ => TriggerRule::AllSuccess,
        };

        let terminal_before_teardown = node.role != Role::Teardown
            && consumers
                .get(&node.id)
                .map(|downstream| {
                    !downstream.is_empty()
                        && downstream.iter().all(|&id| {
                            registry
                                .lookup(id)
                                .map(|n| n.role == Role::Teardown)
                                .unwrap_or(false)
                        })
                })
                .unwrap_or(false);

        index.insert(node.id.clone(), nodes.len());
        nodes.push(ResolvedNode {
            id: node.id.clone(),
            role: node.role,
            trigger_rule,
            terminal_before_teardown,
            on_failure_fails_graph: node.on_failure_fails_graph,
        });
    }

    for edge in &edges {
        let to_node = &nodes[index[&edge.to]];
        let from_is_teardown = nodes[index[&edge.from]].role == Role::Teardown;
        let required = if to_node.role == Role::Teardown || from_is_teardown {
            RequiredState::Done
        } else {
            RequiredState::Success
        };
        deps.entry(edge.to.clone())
            .or_default()
            .push((edge.from.clone(), required));
    }

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        "dependency resolution complete"
    );

    ResolvedGraph {
        nodes,
        edges,
        deps,
        index,
    }
}

impl ResolvedGraph {
    /// All nodes in declaration order.
    pub fn nodes(&self) -> &[ResolvedNode] {
        &self.nodes
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a resolved node by id.
    pub fn node(&self, id: &NodeId) -> Option<&ResolvedNode> {
        self.index.get(id).map(|i| &self.nodes[*i])
    }

    /// The predecessors of a node and the terminal state each must reach.
    pub fn dependencies_of(&self, id: &NodeId) -> &[(NodeId, RequiredState)] {
        self.deps.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A lazy, deterministic topological order over the graph.
    ///
    /// Ties are broken by declaration order, so two identical declaration
    /// sequences always linearize identically.
    pub fn topological_order(&self) -> TopologicalOrder<'_> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            let from = self.index[&edge.from];
            let to = self.index[&edge.to];
            successors[from].push(to);
            in_degree[to] += 1;
        }
        let ready: BinaryHeap<Reverse<usize>> = (0..self.nodes.len())
            .filter(|i| in_degree[*i] == 0)
            .map(Reverse)
            .collect();

        TopologicalOrder {
            graph: self,
            in_degree,
            successors,
            ready,
        }
    }
}

/// Lazy iterator over a resolved graph in topological order.
pub struct TopologicalOrder<'a> {
    graph: &'a ResolvedGraph,
    in_degree: Vec<usize>,
    successors: Vec<Vec<usize>>,
    ready: BinaryHeap<Reverse<usize>>,
}

impl<'a> Iterator for TopologicalOrder<'a> {
    type Item = &'a NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(i) = self.ready.pop()?;
        for &next in &self.successors[i] {
            self.in_degree[next] -= 1;
            if self.in_degree[next] == 0 {
                self.ready.push(Reverse(next));
            }
        }
        Some(&self.graph.nodes[i].id)
    }
}
