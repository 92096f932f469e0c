// SPDX-License-Identifier: MIT

//! Intent classifier
//!
//! Asks the lightweight model for a JSON verdict and maps the resulting
//! intent to a complexity tier and a model identifier. Classification never
//! fails the run: anything unusable degrades to `general`.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{instruct, strip_code_fence};
use crate::adk::error::{GatewayError, Result};
use crate::adk::model::{GenerationConfig, Model};
use crate::gateway::config::GatewaySettings;
use crate::gateway::graph::Node;
use crate::gateway::state::{AgentState, Intent, StateUpdate};

/// Below this confidence the classifier's category is not trusted
pub const CONFIDENCE_THRESHOLD: f32 = 0.7;

const CLASSIFIER_PROMPT: &str = r#"You classify the intent of a user's question.
Reply with a single JSON object and nothing else.

Categories:
- "search": latest news, real-time information, weather, specific fact lookups (needs a web search)
- "analysis": comparisons, analysis, pros and cons, reasoning, complex explanations
- "creative": writing, translation, poems, code generation, emails
- "general": greetings, simple knowledge questions, small talk

Format:
{"intent": "<category>", "confidence": <0.0 to 1.0>, "reasoning": "<short reason>"}"#;

/// The classifier model's answer
#[derive(Debug, Clone, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}

impl IntentClassification {
    /// Parse a raw model reply, fenced or not
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(strip_code_fence(raw))?;
        if !(0.0..=1.0).contains(&parsed.confidence) {
            return Err(GatewayError::other(format!(
                "confidence {} outside [0, 1]",
                parsed.confidence
            )));
        }
        Ok(parsed)
    }
}

pub struct ClassifierNode {
    model: Arc<dyn Model>,
    settings: Arc<GatewaySettings>,
}

impl ClassifierNode {
    pub fn new(model: Arc<dyn Model>, settings: Arc<GatewaySettings>) -> Self {
        Self { model, settings }
    }

    /// Final intent and confidence for a query
    pub async fn classify(&self, query: &str) -> (Intent, f32) {
        let result = instruct(
            self.model.as_ref(),
            &self.settings.model_simple,
            CLASSIFIER_PROMPT,
            format!("Classify this question: {}", query),
            Some(&GenerationConfig::deterministic()),
        )
        .await
        .and_then(|generation| IntentClassification::parse(generation.text()));

        match result {
            Ok(c) if c.confidence < CONFIDENCE_THRESHOLD => {
                log::info!(
                    "Low confidence {:.2} for '{}', routing to general",
                    c.confidence,
                    c.intent
                );
                (Intent::General, c.confidence)
            }
            Ok(c) => {
                log::debug!("Classified as {} ({:.2}): {}", c.intent, c.confidence, c.reasoning);
                (c.intent, c.confidence)
            }
            Err(e) => {
                log::warn!("Classification failed, falling back to general: {}", e);
                (Intent::General, 0.0)
            }
        }
    }
}

#[async_trait]
impl Node for ClassifierNode {
    fn name(&self) -> &str {
        "classifier"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let (intent, confidence) = self.classify(&state.query).await;
        log::info!("Intent: {} (confidence {:.2})", intent, confidence);

        Ok(StateUpdate {
            intent: Some(intent),
            confidence: Some(confidence),
            complexity: Some(intent.complexity()),
            model_id: Some(self.settings.model_for(intent).to_string()),
            tool_iterations: Some(0),
            ..StateUpdate::new()
        })
    }
}

/// Dispatch on the classified intent
pub fn route_intent(state: &AgentState) -> Intent {
    state.intent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::{Generation, Message, TokenUsage};
    use crate::adk::tool::Tool;
    use std::sync::Mutex;

    /// Replies with a fixed text, or fails when none is set
    struct FixedModel {
        reply: Option<String>,
        seen_model: Mutex<Option<String>>,
    }

    impl FixedModel {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                seen_model: Mutex::new(None),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                seen_model: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Model for FixedModel {
        async fn generate_content(
            &self,
            model_id: &str,
            _history: &[Message],
            config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Generation> {
            assert_eq!(config.and_then(|c| c.temperature), Some(0.0));
            *self.seen_model.lock().unwrap() = Some(model_id.to_string());
            match &self.reply {
                Some(reply) => Ok(Generation {
                    message: Message::assistant(reply.clone()),
                    usage: TokenUsage {
                        input_tokens: 50,
                        output_tokens: 10,
                    },
                }),
                None => Err(GatewayError::api("test", "connection refused")),
            }
        }
    }

    fn node(model: Arc<FixedModel>) -> ClassifierNode {
        ClassifierNode::new(model, Arc::new(GatewaySettings::default()))
    }

    async fn run(model: Arc<FixedModel>) -> StateUpdate {
        node(model).run(&AgentState::new("오늘 서울 날씨 어때?")).await.unwrap()
    }

    #[tokio::test]
    async fn test_confident_search() {
        let model = FixedModel::replying(r#"{"intent": "search", "confidence": 0.95, "reasoning": "weather"}"#);
        let update = run(model.clone()).await;

        assert_eq!(update.intent, Some(Intent::Search));
        assert_eq!(update.confidence, Some(0.95));
        assert_eq!(update.model_id.as_deref(), Some("qwen2.5:7b"));
        assert_eq!(update.tool_iterations, Some(0));
        // classification is not metered
        assert_eq!(update.prompt_tokens, 0);
        assert_eq!(
            model.seen_model.lock().unwrap().as_deref(),
            Some("llama3.2:3b")
        );
    }

    #[tokio::test]
    async fn test_fenced_reply() {
        let model = FixedModel::replying("```json\n{\"intent\": \"analysis\", \"confidence\": 0.8, \"reasoning\": \"\"}\n```");
        assert_eq!(run(model).await.intent, Some(Intent::Analysis));
    }

    #[tokio::test]
    async fn test_low_confidence_routes_general() {
        let model = FixedModel::replying(r#"{"intent": "creative", "confidence": 0.69, "reasoning": "maybe"}"#);
        let update = run(model).await;

        assert_eq!(update.intent, Some(Intent::General));
        assert_eq!(update.confidence, Some(0.69));
        assert_eq!(update.model_id.as_deref(), Some("llama3.2:3b"));
        assert_eq!(update.complexity, Some(Intent::General.complexity()));
    }

    #[tokio::test]
    async fn test_malformed_and_invalid_replies() {
        for reply in [
            "I think this is a search question",
            r#"{"intent": "shopping", "confidence": 0.9}"#,
            r#"{"intent": "search", "confidence": 1.5}"#,
            r#"{"intent": "search"}"#,
        ] {
            let update = run(FixedModel::replying(reply)).await;
            assert_eq!(update.intent, Some(Intent::General), "reply: {}", reply);
            assert_eq!(update.confidence, Some(0.0));
        }
    }

    #[tokio::test]
    async fn test_unreachable_model() {
        let update = run(FixedModel::failing()).await;
        assert_eq!(update.intent, Some(Intent::General));
        assert_eq!(update.confidence, Some(0.0));
    }

    #[test]
    fn test_reasoning_is_optional() {
        let parsed = IntentClassification::parse(r#"{"intent": "general", "confidence": 0.9}"#).unwrap();
        assert_eq!(parsed.reasoning, "");
    }
}
