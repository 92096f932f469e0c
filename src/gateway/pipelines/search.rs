// SPDX-License-Identifier: MIT

//! Search pipeline: refine the query, search, synthesize an answer.
//!
//! Only the synthesis call is metered; refinement runs on the lightweight
//! model like the classifier does.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::synthesize;
use crate::adk::error::{GraphError, Result};
use crate::adk::model::{GenerationConfig, Model};
use crate::gateway::config::GatewaySettings;
use crate::gateway::graph::{CompiledGraph, Node, StateGraph, END, START};
use crate::gateway::nodes::instruct;
use crate::gateway::state::{AgentState, StateUpdate};
use crate::gateway::tools::{ToolRegistry, NO_RESULTS, WEB_SEARCH};

/// Entry stored in `intermediate_results` when nothing was found
pub const NOTHING_FOUND: &str = "No search results were found.";

const REFINER_PROMPT: &str = "You turn a natural-language question into an optimal web search query.
Rules:
1. Keep only the core keywords (5 to 10 words)
2. Include the year when up-to-date information is needed
3. Output only the search keywords, with no explanation
4. Keep the language of the question";

const SYNTHESIZER_PROMPT: &str = "You are an agent that synthesizes web search results.
Always answer in the language of the user's question.

Rules:
1. Answer the user's question precisely, based on the search results below
2. Cross-check information from different sources to improve accuracy
3. If information is missing say so honestly, but use what is there
4. Structure the answer: key summary first, then details";

pub struct QueryRefiner {
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
}

impl QueryRefiner {
    pub fn new(model: Arc<dyn Model>, settings: Arc<GatewaySettings>) -> Self {
        Self { model, settings }
    }
}

#[async_trait]
impl Node for QueryRefiner {
    fn name(&self) -> &str {
        "query_refiner"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let refined = match instruct(
            self.model.as_ref(),
            &self.settings.model_simple,
            REFINER_PROMPT,
            state.query.clone(),
            Some(&GenerationConfig::deterministic()),
        )
        .await
        {
            Ok(generation) if generation.text().trim().chars().count() >= 2 => {
                generation.text().trim().to_string()
            }
            Ok(_) => state.query.clone(),
            Err(e) => {
                log::warn!("Query refinement failed, using the original query: {}", e);
                state.query.clone()
            }
        };

        log::info!("Search query: '{}'", refined);
        Ok(StateUpdate {
            sub_queries: Some(vec![refined]),
            ..StateUpdate::new()
        })
    }
}

pub struct WebSearch {
    tools: ToolRegistry,
}

impl WebSearch {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    /// Result text for one query, `None` when there is nothing usable
    async fn search(&self, query: &str) -> Option<String> {
        let Some(tool) = self.tools.get(WEB_SEARCH).await else {
            log::warn!("No '{}' tool registered", WEB_SEARCH);
            return None;
        };

        match tool.execute(json!({ "query": query })).await {
            Ok(text) if !text.trim().is_empty() && !text.contains(NO_RESULTS) => Some(text),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Search for '{}' failed: {}", query, e);
                None
            }
        }
    }
}

#[async_trait]
impl Node for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let queries = if state.sub_queries.is_empty() {
            vec![state.query.clone()]
        } else {
            state.sub_queries.clone()
        };

        let mut results = Vec::new();
        for query in &queries {
            if let Some(text) = self.search(query).await {
                results.push(format!("[query: {}]\n{}", query, text));
            }
        }

        if queries.first() != Some(&state.query) {
            if let Some(text) = self.search(&state.query).await {
                results.push(format!("[original query: {}]\n{}", state.query, text));
            }
        }

        if results.is_empty() {
            results.push(NOTHING_FOUND.to_string());
        }
        log::info!("Collected {} search result set(s)", results.len());

        Ok(StateUpdate {
            intermediate_results: Some(results),
            ..StateUpdate::new()
        })
    }
}

pub struct ResultSynthesizer {
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
}

impl ResultSynthesizer {
    pub fn new(model: Arc<dyn Model>, settings: Arc<GatewaySettings>) -> Self {
        Self { model, settings }
    }
}

#[async_trait]
impl Node for ResultSynthesizer {
    fn name(&self) -> &str {
        "result_synthesizer"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let input = format!(
            "User question: {}\n\nSearch results:\n{}",
            state.query,
            state.intermediate_results.join("\n\n")
        );
        Ok(synthesize(self.model.as_ref(), &self.settings, state, SYNTHESIZER_PROMPT, input).await)
    }
}

/// Compile the three search stages into one graph
pub fn create_search_subgraph(
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
    tools: ToolRegistry,
) -> std::result::Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new("search_agent");
    graph
        .add_node(Arc::new(QueryRefiner::new(model.clone(), settings.clone())))
        .add_node(Arc::new(WebSearch::new(tools)))
        .add_node(Arc::new(ResultSynthesizer::new(model, settings)))
        .add_edge(START, "query_refiner")
        .add_edge("query_refiner", "web_search")
        .add_edge("web_search", "result_synthesizer")
        .add_edge("result_synthesizer", END);
    graph.compile()
}
