// SPDX-License-Identifier: MIT

//! Generation step shared by the creative and general branches.
//!
//! The creative branch binds the tool registry and loops through the tool
//! executor while the model keeps requesting tools; the general branch calls
//! the same way with no tools bound.

use async_trait::async_trait;
use std::sync::Arc;

use crate::adk::error::Result;
use crate::adk::model::{Message, Model, Role};
use crate::gateway::config::GatewaySettings;
use crate::gateway::graph::{Branch, Node};
use crate::gateway::state::{AgentState, Intent, StateUpdate};
use crate::gateway::tools::ToolRegistry;

const CREATIVE_PROMPT: &str = "You are an AI assistant for creative writing, code generation and translation.
Always answer in the language of the user's question.

Rules:
1. Follow the requested format (poem, email, code, ...)
2. Use the web search or calculation tools when they help
3. Be creative while staying accurate
4. Respect the tone and style the user asks for";

const GENERAL_PROMPT: &str = "You are a friendly AI assistant.
Always answer in the language of the user's question.

Rules:
1. Answer concisely and accurately
2. Answer general knowledge questions directly
3. Use tools when they are available and needed
4. If you do not know something, say so honestly";

/// System instruction for an intent
pub fn system_prompt(intent: Intent) -> &'static str {
    match intent {
        Intent::Creative => CREATIVE_PROMPT,
        _ => GENERAL_PROMPT,
    }
}

/// Prepend `prompt` unless the conversation already has a system message
pub fn with_system_prompt(conversation: &[Message], prompt: &str) -> Vec<Message> {
    if conversation.iter().any(|m| m.role == Role::System) {
        return conversation.to_vec();
    }
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(Message::system(prompt));
    messages.extend_from_slice(conversation);
    messages
}

pub struct GenerationNode {
    name: String,
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
    /// Tools bound to the call; `None` for the plain variant
    tools: Option<ToolRegistry>,
}

impl GenerationNode {
    /// Generation with every registered tool bound
    pub fn with_tools(
        name: impl Into<String>,
        model: Arc<dyn Model>,
        settings: Arc<GatewaySettings>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            model,
            settings,
            tools: Some(tools),
        }
    }

    /// Generation without tools
    pub fn plain(name: impl Into<String>, model: Arc<dyn Model>, settings: Arc<GatewaySettings>) -> Self {
        Self {
            name: name.into(),
            model,
            settings,
            tools: None,
        }
    }
}

#[async_trait]
impl Node for GenerationNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let history = with_system_prompt(&state.conversation, system_prompt(state.intent));
        let model_id = if state.model_id.is_empty() {
            self.settings.model_for(state.intent)
        } else {
            state.model_id.as_str()
        };

        let tools = match &self.tools {
            Some(registry) => registry.all().await,
            None => Vec::new(),
        };
        let bound = (!tools.is_empty()).then_some(tools.as_slice());

        match self.model.generate_content(model_id, &history, None, bound).await {
            Ok(generation) => {
                if generation.message.has_tool_calls() {
                    log::info!(
                        "{} requested tools: {:?}",
                        self.name,
                        generation
                            .message
                            .tool_calls
                            .iter()
                            .map(|c| c.name.as_str())
                            .collect::<Vec<_>>()
                    );
                }
                let response = generation.text().to_string();
                Ok(StateUpdate::new()
                    .message(generation.message)
                    .response(response)
                    .usage(generation.usage))
            }
            Err(e) => {
                // An empty turn sends the run through the retry path
                log::warn!("{} model call failed: {}", self.name, e);
                Ok(StateUpdate::new().message(Message::assistant("")).response(""))
            }
        }
    }
}

/// Where the run continues after a tool-enabled generation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolRoute {
    Tools,
    /// Tools were requested but the attempt has no rounds left
    Exhausted,
    Done,
}

impl Branch for ToolRoute {
    fn variants() -> &'static [Self] {
        &[ToolRoute::Tools, ToolRoute::Exhausted, ToolRoute::Done]
    }
}

/// Router after the creative step: run the requested tools unless the
/// attempt has used up its tool rounds, in which case the pending calls
/// still need an answer.
pub fn route_tools(max_iterations: u32) -> impl Fn(&AgentState) -> ToolRoute + Send + Sync + 'static {
    move |state: &AgentState| {
        let wants_tools = state.last_message().map_or(false, Message::has_tool_calls);
        if !wants_tools {
            return ToolRoute::Done;
        }
        if state.tool_iterations >= max_iterations {
            log::warn!(
                "Tool loop reached {} rounds; continuing without further tool calls",
                max_iterations
            );
            return ToolRoute::Exhausted;
        }
        ToolRoute::Tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::GatewayError;
    use crate::adk::model::{Generation, GenerationConfig, TokenUsage, ToolCall};
    use crate::adk::tool::Tool;
    use crate::gateway::tools::CalculatorTool;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records each request and replies with a fixed message
    struct RecordingModel {
        reply: Option<Message>,
        requests: Mutex<Vec<(String, Vec<Message>, usize)>>,
    }

    impl RecordingModel {
        fn new(reply: Option<Message>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Model for RecordingModel {
        async fn generate_content(
            &self,
            model_id: &str,
            history: &[Message],
            _config: Option<&GenerationConfig>,
            tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Generation> {
            self.requests.lock().unwrap().push((
                model_id.to_string(),
                history.to_vec(),
                tools.map_or(0, |t| t.len()),
            ));
            match &self.reply {
                Some(message) => Ok(Generation {
                    message: message.clone(),
                    usage: TokenUsage {
                        input_tokens: 12,
                        output_tokens: 8,
                    },
                }),
                None => Err(GatewayError::api("test", "boom")),
            }
        }
    }

    fn settings() -> Arc<GatewaySettings> {
        Arc::new(GatewaySettings::default())
    }

    fn creative_state() -> AgentState {
        let mut state = AgentState::new("write a haiku");
        state.intent = Intent::Creative;
        state.model_id = "qwen2.5:7b".to_string();
        state
    }

    #[test]
    fn test_system_prompt_injection_is_idempotent() {
        let conversation = vec![Message::user("hi")];
        let once = with_system_prompt(&conversation, GENERAL_PROMPT);
        let twice = with_system_prompt(&once, CREATIVE_PROMPT);

        assert_eq!(once.len(), 2);
        assert_eq!(once[0].role, Role::System);
        assert_eq!(twice, once);
        assert_eq!(twice.iter().filter(|m| m.role == Role::System).count(), 1);
    }

    #[test]
    fn test_prompt_keyed_by_intent() {
        assert_eq!(system_prompt(Intent::Creative), CREATIVE_PROMPT);
        assert_eq!(system_prompt(Intent::General), GENERAL_PROMPT);
        assert_eq!(system_prompt(Intent::Search), GENERAL_PROMPT);
    }

    #[tokio::test]
    async fn test_creative_binds_tools_and_meters_usage() {
        let model = RecordingModel::new(Some(Message::assistant("An autumn haiku")));
        let registry = ToolRegistry::new();
        registry.register(Arc::new(CalculatorTool)).await;
        let node = GenerationNode::with_tools("creative_agent", model.clone(), settings(), registry);

        let update = node.run(&creative_state()).await.unwrap();
        assert_eq!(update.response.as_deref(), Some("An autumn haiku"));
        assert_eq!(update.prompt_tokens, 12);
        assert_eq!(update.completion_tokens, 8);

        let requests = model.requests.lock().unwrap();
        let (model_id, history, tool_count) = &requests[0];
        assert_eq!(model_id, "qwen2.5:7b");
        assert_eq!(*tool_count, 1);
        assert_eq!(history[0].content, CREATIVE_PROMPT);
        assert_eq!(history[1], Message::user("write a haiku"));
    }

    #[tokio::test]
    async fn test_plain_binds_nothing() {
        let model = RecordingModel::new(Some(Message::assistant("Hello there!")));
        let node = GenerationNode::plain("general_agent", model.clone(), settings());

        node.run(&AgentState::new("hi")).await.unwrap();
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].2, 0);
        // empty model id falls back to the table for the intent
        assert_eq!(requests[0].0, "llama3.2:3b");
    }

    #[tokio::test]
    async fn test_existing_system_message_is_kept() {
        let model = RecordingModel::new(Some(Message::assistant("ok")));
        let node = GenerationNode::plain("general_agent", model.clone(), settings());
        let state = AgentState::with_history(vec![Message::system("custom")], "hi");

        node.run(&state).await.unwrap();
        node.run(&state).await.unwrap();

        for (_, history, _) in model.requests.lock().unwrap().iter() {
            assert_eq!(history.iter().filter(|m| m.role == Role::System).count(), 1);
            assert_eq!(history[0].content, "custom");
        }
    }

    #[tokio::test]
    async fn test_model_failure_yields_empty_turn() {
        let node = GenerationNode::plain("general_agent", RecordingModel::new(None), settings());
        let update = node.run(&AgentState::new("hi")).await.unwrap();

        assert_eq!(update.response.as_deref(), Some(""));
        assert_eq!(update.messages, vec![Message::assistant("")]);
        assert_eq!(update.prompt_tokens, 0);
    }

    #[test]
    fn test_route_tools() {
        let route = route_tools(2);
        let call = ToolCall {
            id: "c1".to_string(),
            name: "calculate".to_string(),
            args: json!({"expression": "1+1"}),
        };

        let mut state = AgentState::new("q");
        assert_eq!(route(&state), ToolRoute::Done);

        state
            .conversation
            .push(Message::assistant("").with_tool_calls(vec![call]));
        assert_eq!(route(&state), ToolRoute::Tools);

        state.tool_iterations = 2;
        assert_eq!(route(&state), ToolRoute::Exhausted);

        state.conversation.push(Message::assistant("done"));
        assert_eq!(route(&state), ToolRoute::Done);
    }
}
