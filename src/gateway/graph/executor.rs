// SPDX-License-Identifier: MIT

//! Graph executor

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{Edge, Node, END};
use crate::adk::error::{GatewayError, GraphError, Result};
use crate::gateway::state::{AgentState, StateUpdate};

/// A validated graph ready for execution.
///
/// Built by [`super::StateGraph::compile`]; immutable and shareable across
/// concurrent runs, each of which owns its own [`AgentState`].
pub struct CompiledGraph {
    name: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    node_order: Vec<String>,
    edges: HashMap<String, Edge>,
    entry: String,
    recursion_limit: usize,
}

impl CompiledGraph {
    pub(crate) fn new(
        name: String,
        nodes: HashMap<String, Arc<dyn Node>>,
        node_order: Vec<String>,
        edges: HashMap<String, Edge>,
        entry: String,
        recursion_limit: usize,
    ) -> Self {
        Self {
            name,
            nodes,
            node_order,
            edges,
            entry,
            recursion_limit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Node names in registration order
    pub fn node_names(&self) -> Vec<&str> {
        self.node_order.iter().map(|s| s.as_str()).collect()
    }

    /// Declared successors of a node
    pub fn successors(&self, node: &str) -> Vec<&str> {
        self.edges.get(node).map(Edge::targets).unwrap_or_default()
    }

    /// Whether the successor of `node` is chosen at run time
    pub fn is_conditional(&self, node: &str) -> bool {
        matches!(self.edges.get(node), Some(Edge::Conditional(_)))
    }

    /// Resolve the node that runs after `current`
    fn next_node(&self, current: &str, state: &AgentState) -> Result<String> {
        // compile() guarantees every node has an edge and every branch a target
        let edge = self
            .edges
            .get(current)
            .ok_or_else(|| GraphError::DeadEnd(current.to_string()))?;

        match edge {
            Edge::Direct(to) => Ok(to.clone()),
            Edge::Conditional(cond) => (cond.route)(state).ok_or_else(|| {
                GatewayError::other(format!("routing from '{}' produced no target", current))
            }),
        }
    }

    /// Run the graph from its entry point until a node routes to the end.
    pub async fn invoke(&self, state: AgentState) -> Result<AgentState> {
        let run_id = uuid::Uuid::new_v4();
        let mut state = state;
        let mut current = self.entry.clone();
        let mut steps = 0usize;

        log::info!("[{}] Graph '{}' run started", run_id, self.name);

        loop {
            steps += 1;
            if steps > self.recursion_limit {
                log::error!(
                    "[{}] Graph '{}' exceeded recursion limit at node '{}'",
                    run_id,
                    self.name,
                    current
                );
                return Err(GraphError::RecursionLimit {
                    graph: self.name.clone(),
                    limit: self.recursion_limit,
                }
                .into());
            }

            let node = self.nodes.get(&current).ok_or_else(|| GraphError::UnknownNode {
                from: self.name.clone(),
                to: current.clone(),
            })?;

            log::info!("[{}] Step {}: executing node '{}'", run_id, steps, current);
            let update = node.run(&state).await?;
            state.apply(update);

            let next = self.next_node(&current, &state)?;
            log::debug!("[{}] '{}' -> '{}'", run_id, current, next);

            if next == END {
                log::info!(
                    "[{}] Graph '{}' finished after {} steps ({} prompt / {} completion tokens)",
                    run_id,
                    self.name,
                    steps,
                    state.prompt_tokens,
                    state.completion_tokens
                );
                return Ok(state);
            }
            current = next;
        }
    }
}

/// A compiled graph exposed to a parent graph as a single node.
///
/// The nested run starts from a copy of the parent's state; whatever it
/// changed comes back as an ordinary [`StateUpdate`].
pub struct SubgraphNode {
    name: String,
    graph: CompiledGraph,
}

impl SubgraphNode {
    pub fn new(name: impl Into<String>, graph: CompiledGraph) -> Self {
        Self {
            name: name.into(),
            graph,
        }
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }
}

#[async_trait]
impl Node for SubgraphNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let result = self.graph.invoke(state.clone()).await?;
        Ok(StateUpdate::diff(state, &result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::{Message, TokenUsage};
    use crate::gateway::graph::{StateGraph, START};
    use crate::gateway::state::OutputQuality;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Node that appends a fixed message and records how often it ran
    struct Scripted {
        name: String,
        reply: String,
        usage: TokenUsage,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(name: &str, reply: &str) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    name: name.to_string(),
                    reply: reply.to_string(),
                    usage: TokenUsage {
                        input_tokens: 3,
                        output_tokens: 2,
                    },
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl Node for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _state: &AgentState) -> Result<StateUpdate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StateUpdate::new()
                .message(Message::assistant(self.reply.clone()))
                .response(self.reply.clone())
                .usage(self.usage))
        }
    }

    /// Node that bumps the retry counter and judges the response
    struct Judge;

    #[async_trait]
    impl Node for Judge {
        fn name(&self) -> &str {
            "judge"
        }

        async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
            let quality = if state.retry_count >= 2 {
                OutputQuality::Fallback
            } else {
                OutputQuality::Retry
            };
            Ok(StateUpdate {
                output_quality: Some(quality),
                retry_count: Some(state.retry_count + u32::from(quality == OutputQuality::Retry)),
                ..StateUpdate::new()
            })
        }
    }

    #[tokio::test]
    async fn test_sequential_run_merges_updates() {
        let (a, _) = Scripted::new("a", "from a");
        let (b, _) = Scripted::new("b", "from b");

        let mut graph = StateGraph::new("seq");
        graph
            .add_node(a)
            .add_node(b)
            .add_edge(START, "a")
            .add_edge("a", "b")
            .add_edge("b", END);
        let graph = graph.compile().unwrap();

        let state = graph.invoke(AgentState::new("q")).await.unwrap();
        assert_eq!(state.response, "from b");
        assert_eq!(state.conversation.len(), 3);
        assert_eq!(state.prompt_tokens, 6);
        assert_eq!(state.completion_tokens, 4);
    }

    #[tokio::test]
    async fn test_cycle_bounded_by_state_counter() {
        let (work, calls) = Scripted::new("work", "x");
        let (fallback, fallback_calls) = Scripted::new("fallback", "sorry");

        let mut graph = StateGraph::new("retry");
        graph
            .add_node(work)
            .add_node(Arc::new(Judge))
            .add_node(fallback)
            .add_edge(START, "work")
            .add_edge("work", "judge")
            .add_conditional_edges(
                "judge",
                |s: &AgentState| s.output_quality,
                &[
                    (OutputQuality::Pass, END),
                    (OutputQuality::Retry, "work"),
                    (OutputQuality::Fallback, "fallback"),
                ],
            )
            .add_edge("fallback", END);
        let graph = graph.compile().unwrap();

        let state = graph.invoke(AgentState::new("q")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.retry_count, 2);
        assert_eq!(state.output_quality, OutputQuality::Fallback);
        assert_eq!(state.response, "sorry");
    }

    #[tokio::test]
    async fn test_recursion_limit_stops_unbounded_cycle() {
        let (a, _) = Scripted::new("a", "x");
        let (b, _) = Scripted::new("b", "y");

        let mut graph = StateGraph::new("loop");
        graph
            .add_node(a)
            .add_node(b)
            .add_edge(START, "a")
            .add_edge("a", "b")
            .add_edge("b", "a")
            .set_recursion_limit(10);
        let graph = graph.compile().unwrap();

        let err = graph.invoke(AgentState::new("q")).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Graph(GraphError::RecursionLimit { limit: 10, .. })
        ));
    }

    #[tokio::test]
    async fn test_subgraph_merges_like_a_leaf_node() {
        let (inner_a, _) = Scripted::new("inner_a", "draft");
        let (inner_b, _) = Scripted::new("inner_b", "final");
        let mut inner = StateGraph::new("inner");
        inner
            .add_node(inner_a)
            .add_node(inner_b)
            .add_edge(START, "inner_a")
            .add_edge("inner_a", "inner_b")
            .add_edge("inner_b", END);
        let inner = inner.compile().unwrap();

        let (before, _) = Scripted::new("before", "hello");
        let mut outer = StateGraph::new("outer");
        outer
            .add_node(before)
            .add_node(Arc::new(SubgraphNode::new("nested", inner)))
            .add_edge(START, "before")
            .add_edge("before", "nested")
            .add_edge("nested", END);
        let outer = outer.compile().unwrap();

        let state = outer.invoke(AgentState::new("q")).await.unwrap();

        // user + before + two nested messages, none duplicated
        let contents: Vec<_> = state.conversation.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q", "hello", "draft", "final"]);
        assert_eq!(state.response, "final");
        assert_eq!(state.prompt_tokens, 9);
        assert_eq!(state.completion_tokens, 6);
    }

    #[test]
    fn test_introspection() {
        let (a, _) = Scripted::new("a", "x");
        let mut graph = StateGraph::new("g");
        graph
            .add_node(a)
            .add_edge(START, "a")
            .add_conditional_edges(
                "a",
                |s: &AgentState| s.output_quality,
                &[
                    (OutputQuality::Pass, END),
                    (OutputQuality::Retry, "a"),
                    (OutputQuality::Fallback, END),
                ],
            );
        let graph = graph.compile().unwrap();

        assert_eq!(graph.name(), "g");
        assert!(graph.is_conditional("a"));
        assert_eq!(graph.successors("a"), vec![END, "a"]);
    }
}
