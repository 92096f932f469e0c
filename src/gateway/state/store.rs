// SPDX-License-Identifier: MIT

//! Runtime state threaded through the graph, and the partial updates nodes return

use serde::{Deserialize, Serialize};

use super::schema::{Complexity, Intent, OutputQuality};
use crate::adk::model::{Message, TokenUsage};

/// The record every node reads from.
///
/// Nodes never mutate it directly; they return a [`StateUpdate`] which the
/// engine merges with [`AgentState::apply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// The triggering request text; no update can change it
    pub query: String,
    pub conversation: Vec<Message>,

    pub intent: Intent,
    pub confidence: f32,
    pub complexity: Complexity,
    pub model_id: String,

    pub is_blocked: bool,
    pub block_reason: String,

    pub output_quality: OutputQuality,
    pub retry_count: u32,
    /// Tool-executor rounds in the current attempt
    pub tool_iterations: u32,

    pub sub_queries: Vec<String>,
    pub intermediate_results: Vec<String>,

    pub response: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl AgentState {
    /// Fresh state for a single query
    pub fn new(query: impl Into<String>) -> Self {
        Self::with_history(Vec::new(), query)
    }

    /// Fresh state continuing an earlier conversation
    pub fn with_history(history: Vec<Message>, query: impl Into<String>) -> Self {
        let query = query.into();
        let mut conversation = history;
        conversation.push(Message::user(query.clone()));
        Self {
            query,
            conversation,
            ..Self::default()
        }
    }

    /// Merge a node's partial update.
    ///
    /// Scalars and lists are last-write-wins; `conversation` is appended to
    /// and the token counters are added to.
    pub fn apply(&mut self, update: StateUpdate) {
        self.conversation.extend(update.messages);

        if let Some(intent) = update.intent {
            self.intent = intent;
        }
        if let Some(confidence) = update.confidence {
            self.confidence = confidence;
        }
        if let Some(complexity) = update.complexity {
            self.complexity = complexity;
        }
        if let Some(model_id) = update.model_id {
            self.model_id = model_id;
        }
        if let Some(is_blocked) = update.is_blocked {
            self.is_blocked = is_blocked;
        }
        if let Some(block_reason) = update.block_reason {
            self.block_reason = block_reason;
        }
        if let Some(output_quality) = update.output_quality {
            self.output_quality = output_quality;
        }
        if let Some(retry_count) = update.retry_count {
            self.retry_count = retry_count;
        }
        if let Some(tool_iterations) = update.tool_iterations {
            self.tool_iterations = tool_iterations;
        }
        if let Some(sub_queries) = update.sub_queries {
            self.sub_queries = sub_queries;
        }
        if let Some(intermediate_results) = update.intermediate_results {
            self.intermediate_results = intermediate_results;
        }
        if let Some(response) = update.response {
            self.response = response;
        }

        self.prompt_tokens = self.prompt_tokens.saturating_add(update.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(update.completion_tokens);
    }

    /// The most recent message, if any
    pub fn last_message(&self) -> Option<&Message> {
        self.conversation.last()
    }

    /// Total tokens metered so far
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Partial state returned by a node.
///
/// `None` leaves a field untouched. `messages` are appended and the token
/// fields are deltas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub intent: Option<Intent>,
    pub confidence: Option<f32>,
    pub complexity: Option<Complexity>,
    pub model_id: Option<String>,
    pub is_blocked: Option<bool>,
    pub block_reason: Option<String>,
    pub output_quality: Option<OutputQuality>,
    pub retry_count: Option<u32>,
    pub tool_iterations: Option<u32>,
    pub sub_queries: Option<Vec<String>>,
    pub intermediate_results: Option<Vec<String>>,
    pub response: Option<String>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Add the usage of one metered model call
    pub fn usage(mut self, usage: TokenUsage) -> Self {
        self.prompt_tokens += usage.input_tokens;
        self.completion_tokens += usage.output_tokens;
        self
    }

    /// The update that turns `before` into `after`.
    ///
    /// Used to hand a nested graph's result back to its parent: messages the
    /// nested run appended and the tokens it metered become deltas, and every
    /// field it changed is written back.
    pub fn diff(before: &AgentState, after: &AgentState) -> Self {
        fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> Option<T> {
            (before != after).then(|| after.clone())
        }

        let messages = if after.conversation.starts_with(&before.conversation) {
            after.conversation[before.conversation.len()..].to_vec()
        } else {
            log::warn!("Nested run rewrote the conversation; appending its full log");
            after.conversation.clone()
        };

        Self {
            messages,
            intent: changed(&before.intent, &after.intent),
            confidence: changed(&before.confidence, &after.confidence),
            complexity: changed(&before.complexity, &after.complexity),
            model_id: changed(&before.model_id, &after.model_id),
            is_blocked: changed(&before.is_blocked, &after.is_blocked),
            block_reason: changed(&before.block_reason, &after.block_reason),
            output_quality: changed(&before.output_quality, &after.output_quality),
            retry_count: changed(&before.retry_count, &after.retry_count),
            tool_iterations: changed(&before.tool_iterations, &after.tool_iterations),
            sub_queries: changed(&before.sub_queries, &after.sub_queries),
            intermediate_results: changed(&before.intermediate_results, &after.intermediate_results),
            response: changed(&before.response, &after.response),
            prompt_tokens: after.prompt_tokens.saturating_sub(before.prompt_tokens),
            completion_tokens: after
                .completion_tokens
                .saturating_sub(before.completion_tokens),
        }
    }
}
