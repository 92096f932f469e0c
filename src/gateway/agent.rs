// SPDX-License-Identifier: MIT

//! Main graph and the gateway entry point
//!
//! ```text
//! START -> input_guard -blocked-> blocked_response -> END
//!                      -safe----> classifier -> search_agent | analysis_agent
//!                                               | creative_agent <-> tools | general_agent
//!                                               (creative_agent -> tool_limit once out of rounds)
//!                                 -> output_guard -pass-> END
//!                                                 -retry-> classifier
//!                                                 -fallback-> fallback -> END
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::adk::error::{GatewayError, Result};
use crate::adk::model::ollama::OllamaModel;
use crate::adk::model::openai::OpenAIModel;
use crate::adk::model::{Message, Model};
use crate::gateway::config::{GatewaySettings, Provider};
use crate::gateway::graph::{CompiledGraph, StateGraph, SubgraphNode, END, START};
use crate::gateway::nodes::{
    route_input, route_intent, route_quality, route_tools, BlockedResponse, ClassifierNode,
    FallbackNode, GenerationNode, GuardRoute, InputGuard, OutputGuard, ToolExecutorNode, ToolLimitNode,
    ToolRoute,
};
use crate::gateway::pipelines::{create_analysis_subgraph, create_search_subgraph};
use crate::gateway::state::{AgentState, Intent, OutputQuality};
use crate::gateway::tools::{default_registry, ToolRegistry};

/// Build and validate the full gateway graph
pub fn create_graph(
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
    tools: ToolRegistry,
) -> Result<CompiledGraph> {
    let search = create_search_subgraph(model.clone(), settings.clone(), tools.clone())?;
    let analysis = create_analysis_subgraph(model.clone(), settings.clone())?;

    let mut graph = StateGraph::new("gateway");
    graph
        .add_node(Arc::new(InputGuard::new(&settings.guard)?))
        .add_node(Arc::new(BlockedResponse))
        .add_node(Arc::new(ClassifierNode::new(model.clone(), settings.clone())))
        .add_node(Arc::new(SubgraphNode::new("search_agent", search)))
        .add_node(Arc::new(SubgraphNode::new("analysis_agent", analysis)))
        .add_node(Arc::new(GenerationNode::with_tools(
            "creative_agent",
            model.clone(),
            settings.clone(),
            tools.clone(),
        )))
        .add_node(Arc::new(GenerationNode::plain("general_agent", model, settings.clone())))
        .add_node(Arc::new(ToolExecutorNode::new(tools)))
        .add_node(Arc::new(ToolLimitNode))
        .add_node(Arc::new(OutputGuard::new(&settings.guard)))
        .add_node(Arc::new(FallbackNode));

    graph
        .add_edge(START, "input_guard")
        .add_conditional_edges(
            "input_guard",
            route_input,
            &[
                (GuardRoute::Blocked, "blocked_response"),
                (GuardRoute::Safe, "classifier"),
            ],
        )
        .add_edge("blocked_response", END)
        .add_conditional_edges(
            "classifier",
            route_intent,
            &[
                (Intent::Search, "search_agent"),
                (Intent::Analysis, "analysis_agent"),
                (Intent::Creative, "creative_agent"),
                (Intent::General, "general_agent"),
            ],
        )
        .add_edge("search_agent", "output_guard")
        .add_edge("analysis_agent", "output_guard")
        .add_edge("general_agent", "output_guard")
        .add_conditional_edges(
            "creative_agent",
            route_tools(settings.max_tool_iterations),
            &[
                (ToolRoute::Tools, "tools"),
                (ToolRoute::Exhausted, "tool_limit"),
                (ToolRoute::Done, "output_guard"),
            ],
        )
        .add_edge("tools", "creative_agent")
        .add_edge("tool_limit", "output_guard")
        .add_conditional_edges(
            "output_guard",
            route_quality,
            &[
                (OutputQuality::Pass, END),
                (OutputQuality::Retry, "classifier"),
                (OutputQuality::Fallback, "fallback"),
            ],
        )
        .add_edge("fallback", END)
        .set_recursion_limit(settings.recursion_limit);

    Ok(graph.compile()?)
}

/// Model client for the configured provider
pub fn create_model(settings: &GatewaySettings) -> Result<Arc<dyn Model>> {
    let model: Arc<dyn Model> = match settings.provider {
        Provider::Ollama => Arc::new(OllamaModel::new(
            settings.ollama_url.clone(),
            settings.request_timeout(),
        )?),
        Provider::OpenAI => Arc::new(OpenAIModel::new(
            settings.openai_api_key.clone(),
            settings.openai_base_url.clone(),
            settings.request_timeout(),
        )?),
    };
    Ok(model)
}

/// A compiled gateway graph plus its settings.
///
/// Cheap to share behind an `Arc`; every run owns its own state.
pub struct Gateway {
    graph: CompiledGraph,
    settings: Arc<GatewaySettings>,
}

impl Gateway {
    pub fn new(settings: GatewaySettings, model: Arc<dyn Model>, tools: ToolRegistry) -> Result<Self> {
        settings.validate()?;
        let settings = Arc::new(settings);
        let graph = create_graph(model, settings.clone(), tools)?;
        Ok(Self { graph, settings })
    }

    /// Gateway with the configured model client and the built-in tools
    pub async fn from_settings(settings: GatewaySettings) -> Result<Self> {
        let model = create_model(&settings)?;
        let tools = default_registry(&settings).await?;
        Self::new(settings, model, tools)
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Run the graph on a prepared state, within the configured deadline
    pub async fn run(&self, state: AgentState) -> Result<AgentState> {
        match self.settings.run_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), self.graph.invoke(state))
                .await
                .map_err(|_| GatewayError::Timeout(secs))?,
            None => self.graph.invoke(state).await,
        }
    }

    /// Answer a single query
    pub async fn ask(&self, query: impl Into<String>) -> Result<AgentState> {
        self.run(AgentState::new(query)).await
    }

    /// Answer a query that continues an earlier conversation
    pub async fn ask_with_history(&self, history: Vec<Message>, query: impl Into<String>) -> Result<AgentState> {
        self.run(AgentState::with_history(history, query)).await
    }
}
