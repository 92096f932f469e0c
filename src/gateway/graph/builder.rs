// SPDX-License-Identifier: MIT

//! State graph builder
//!
//! Collects nodes and edges, then validates the whole table in
//! [`StateGraph::compile`]. Wiring mistakes (unknown successors, routing keys
//! with no declared successor, nodes that lead nowhere) are reported there so
//! a compiled graph can never hit them while running.

use std::collections::HashMap;
use std::sync::Arc;

use super::executor::CompiledGraph;
use super::types::{Branch, ConditionalEdge, Edge, Node, END, START};
use crate::adk::error::GraphError;
use crate::gateway::state::AgentState;

/// Default bound on node executions per run
pub const DEFAULT_RECURSION_LIMIT: usize = 64;

/// Builder for a [`CompiledGraph`]
pub struct StateGraph {
    name: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    node_order: Vec<String>,
    edges: HashMap<String, Edge>,
    entry: Option<String>,
    recursion_limit: usize,
    /// Problems found while adding, reported by `compile`
    errors: Vec<GraphError>,
}

impl StateGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            node_order: Vec::new(),
            edges: HashMap::new(),
            entry: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            errors: Vec::new(),
        }
    }

    /// Register a node under its own name
    pub fn add_node(&mut self, node: Arc<dyn Node>) -> &mut Self {
        let name = node.name().to_string();
        self.add_node_as(name, node)
    }

    /// Register a node under an explicit name.
    ///
    /// The same step can back several graph nodes (the creative and general
    /// branches share one generation step type).
    pub fn add_node_as(&mut self, name: impl Into<String>, node: Arc<dyn Node>) -> &mut Self {
        let name = name.into();
        if name == START || name == END {
            self.errors.push(GraphError::ReservedName(name));
        } else if self.nodes.contains_key(&name) {
            self.errors.push(GraphError::DuplicateNode(name));
        } else {
            self.node_order.push(name.clone());
            self.nodes.insert(name, node);
        }
        self
    }

    /// Unconditional edge. `add_edge(START, x)` sets the entry point.
    pub fn add_edge(&mut self, from: &str, to: &str) -> &mut Self {
        if from == START {
            return self.set_entry_point(to);
        }
        self.insert_edge(from, Edge::Direct(to.to_string()))
    }

    /// Conditional edge: after `from` runs, `router` picks a branch and
    /// `paths` maps it to the successor. `paths` must cover every variant.
    pub fn add_conditional_edges<B, F>(&mut self, from: &str, router: F, paths: &[(B, &str)]) -> &mut Self
    where
        B: Branch,
        F: Fn(&AgentState) -> B + Send + Sync + 'static,
    {
        self.insert_edge(from, Edge::Conditional(ConditionalEdge::new(router, paths)))
    }

    pub fn set_entry_point(&mut self, node: &str) -> &mut Self {
        self.entry = Some(node.to_string());
        self
    }

    pub fn set_recursion_limit(&mut self, limit: usize) -> &mut Self {
        self.recursion_limit = limit;
        self
    }

    fn insert_edge(&mut self, from: &str, edge: Edge) -> &mut Self {
        if self.edges.contains_key(from) {
            self.errors.push(GraphError::DuplicateEdge(from.to_string()));
        } else {
            self.edges.insert(from.to_string(), edge);
        }
        self
    }

    /// Validate the wiring and produce an executable graph
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        let entry = self
            .entry
            .ok_or_else(|| GraphError::MissingEntryPoint(self.name.clone()))?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::UnknownNode {
                from: START.to_string(),
                to: entry,
            });
        }

        for name in &self.node_order {
            let edge = self
                .edges
                .get(name)
                .ok_or_else(|| GraphError::DeadEnd(name.clone()))?;

            if let Edge::Conditional(cond) = edge {
                if let Some(branch) = cond.unmapped.first() {
                    return Err(GraphError::UnmappedBranch {
                        node: name.clone(),
                        branch: branch.clone(),
                    });
                }
            }

            for target in edge.targets() {
                if target != END && !self.nodes.contains_key(target) {
                    return Err(GraphError::UnknownNode {
                        from: name.clone(),
                        to: target.to_string(),
                    });
                }
            }
        }

        // Edges declared from nodes that were never registered
        let mut sources: Vec<&String> = self.edges.keys().collect();
        sources.sort();
        if let Some(from) = sources.into_iter().find(|from| !self.nodes.contains_key(*from)) {
            let to = self.edges[from].targets().join("|");
            return Err(GraphError::UnknownNode {
                from: from.clone(),
                to,
            });
        }

        log::debug!(
            "Compiled graph '{}' with {} nodes, entry '{}'",
            self.name,
            self.nodes.len(),
            entry
        );

        Ok(CompiledGraph::new(
            self.name,
            self.nodes,
            self.node_order,
            self.edges,
            entry,
            self.recursion_limit,
        ))
    }
}
