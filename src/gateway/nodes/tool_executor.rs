// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::adk::error::{GatewayError, Result};
use crate::adk::model::{Message, ToolCall};
use crate::gateway::graph::Node;
use crate::gateway::state::{AgentState, StateUpdate};
use crate::gateway::tools::ToolRegistry;

/// Runs the tool calls of the last assistant message, in order.
///
/// Each call is answered by a `tool` message. Unknown tools and failing
/// tools answer with an error description instead of failing the run.
pub struct ToolExecutorNode {
    registry: ToolRegistry,
}

impl ToolExecutorNode {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    async fn execute(&self, call: &ToolCall) -> String {
        let result = match self.registry.get(&call.name).await {
            Some(tool) => tool.execute(call.args.clone()).await,
            None => Err(GatewayError::tool_not_found(&call.name)),
        };

        match result {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Tool '{}' failed: {}", call.name, e);
                format!("Error: {}", e)
            }
        }
    }
}

#[async_trait]
impl Node for ToolExecutorNode {
    fn name(&self) -> &str {
        "tools"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let calls = state
            .last_message()
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default();

        let mut update = StateUpdate {
            tool_iterations: Some(state.tool_iterations + 1),
            ..StateUpdate::new()
        };

        for call in &calls {
            log::info!("Executing tool '{}' with {}", call.name, call.args);
            let output = self.execute(call).await;
            update = update.message(Message::tool(call, output));
        }

        Ok(update)
    }
}

/// Answer given to calls left over once an attempt runs out of tool rounds
pub const TOOL_LIMIT_REACHED: &str = "Error: tool call limit reached";

/// Answers every pending call of the last assistant message without running
/// it, so the conversation never carries a call id with no tool reply.
pub struct ToolLimitNode;

#[async_trait]
impl Node for ToolLimitNode {
    fn name(&self) -> &str {
        "tool_limit"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let calls = state
            .last_message()
            .map(|m| m.tool_calls.as_slice())
            .unwrap_or_default();

        Ok(calls.iter().fold(StateUpdate::new(), |update, call| {
            log::info!("Skipping tool '{}': no tool rounds left", call.name);
            update.message(Message::tool(call, TOOL_LIMIT_REACHED))
        }))
    }
}
