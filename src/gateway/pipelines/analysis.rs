// SPDX-License-Identifier: MIT

//! Analysis pipeline: decompose, research each sub-question, synthesize.

use async_trait::async_trait;
use std::sync::Arc;

use super::synthesize;
use crate::adk::error::{GraphError, Result};
use crate::adk::model::{GenerationConfig, Model};
use crate::gateway::config::GatewaySettings;
use crate::gateway::graph::{CompiledGraph, Node, StateGraph, END, START};
use crate::gateway::nodes::{instruct, strip_code_fence};
use crate::gateway::state::{AgentState, StateUpdate};

const DECOMPOSER_PROMPT: &str = r#"You split complex questions into sub-questions that can be analysed separately.
Rules:
1. Split the question into 2 to 4 sub-questions
2. Each sub-question must be answerable on its own
3. Output only a JSON array
4. Keep the language of the question
5. If the question is simple, put only the original question in the array

Format: ["sub-question 1", "sub-question 2", ...]"#;

const RESEARCHER_PROMPT: &str = "You are an analyst. Give an in-depth analysis of the question.
Always answer in the language of the question.
Focus on the key points: concise but insightful.";

const SYNTHESIZER_PROMPT: &str = "You are an expert at combining analyses.
Always answer in the language of the original question.

Rules:
1. Combine the individual analyses below into one complete answer
2. Structure: key summary, detailed analysis, conclusions and implications
3. Merge duplicated content and contrast differing viewpoints
4. Keep the structure logical and easy to read";

/// Parse a JSON array of sub-questions; `None` when unusable
pub fn parse_sub_questions(raw: &str) -> Option<Vec<String>> {
    let questions: Vec<String> = serde_json::from_str(strip_code_fence(raw)).ok()?;
    let questions: Vec<String> = questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    (!questions.is_empty()).then_some(questions)
}

pub struct Decomposer {
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
}

impl Decomposer {
    pub fn new(model: Arc<dyn Model>, settings: Arc<GatewaySettings>) -> Self {
        Self { model, settings }
    }
}

#[async_trait]
impl Node for Decomposer {
    fn name(&self) -> &str {
        "decomposer"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let reply = instruct(
            self.model.as_ref(),
            &self.settings.model_simple,
            DECOMPOSER_PROMPT,
            state.query.clone(),
            Some(&GenerationConfig::deterministic()),
        )
        .await;

        let sub_queries = match reply {
            Ok(generation) => parse_sub_questions(generation.text()).unwrap_or_else(|| {
                log::warn!("Decomposer returned no usable array; analysing the question as a whole");
                vec![state.query.clone()]
            }),
            Err(e) => {
                log::warn!("Decomposition failed: {}", e);
                vec![state.query.clone()]
            }
        };

        log::info!("Sub-questions: {:?}", sub_queries);
        Ok(StateUpdate {
            sub_queries: Some(sub_queries),
            ..StateUpdate::new()
        })
    }
}

pub struct Researcher {
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
}

impl Researcher {
    pub fn new(model: Arc<dyn Model>, settings: Arc<GatewaySettings>) -> Self {
        Self { model, settings }
    }
}

#[async_trait]
impl Node for Researcher {
    fn name(&self) -> &str {
        "researcher"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let questions = if state.sub_queries.is_empty() {
            vec![state.query.clone()]
        } else {
            state.sub_queries.clone()
        };
        let model_id = if state.model_id.is_empty() {
            self.settings.model_for(state.intent)
        } else {
            state.model_id.as_str()
        };

        let mut update = StateUpdate::new();
        let mut blocks = Vec::with_capacity(questions.len());

        for (i, question) in questions.iter().enumerate() {
            let body = match instruct(self.model.as_ref(), model_id, RESEARCHER_PROMPT, question.clone(), None).await {
                Ok(generation) => {
                    update = update.usage(generation.usage);
                    generation.text().to_string()
                }
                Err(e) => {
                    log::warn!("Research on '{}' failed: {}", question, e);
                    String::new()
                }
            };
            blocks.push(format!("[analysis {}: {}]\n{}", i + 1, question, body));
        }

        Ok(StateUpdate {
            intermediate_results: Some(blocks),
            ..update
        })
    }
}

pub struct Synthesizer {
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn Model>, settings: Arc<GatewaySettings>) -> Self {
        Self { model, settings }
    }
}

#[async_trait]
impl Node for Synthesizer {
    fn name(&self) -> &str {
        "synthesizer"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let input = format!(
            "Original question: {}\n\nIndividual analyses:\n{}",
            state.query,
            state.intermediate_results.join("\n\n")
        );
        Ok(synthesize(self.model.as_ref(), &self.settings, state, SYNTHESIZER_PROMPT, input).await)
    }
}

/// Compile the three analysis stages into one graph
pub fn create_analysis_subgraph(
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
) -> std::result::Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new("analysis_agent");
    graph
        .add_node(Arc::new(Decomposer::new(model.clone(), settings.clone())))
        .add_node(Arc::new(Researcher::new(model.clone(), settings.clone())))
        .add_node(Arc::new(Synthesizer::new(model, settings)))
        .add_edge(START, "decomposer")
        .add_edge("decomposer", "researcher")
        .add_edge("researcher", "synthesizer")
        .add_edge("synthesizer", END);
    graph.compile()
}
