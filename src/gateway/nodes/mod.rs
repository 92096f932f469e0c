// SPDX-License-Identifier: MIT

//! Graph nodes of the gateway.
//!
//! Every node recovers from backend failures itself and hands the graph a
//! well-formed update; only programming errors escape as `Err`.

pub mod classifier;
pub mod fallback;
pub mod generation;
pub mod input_guard;
pub mod output_guard;
pub mod tool_executor;

pub use classifier::{route_intent, ClassifierNode};
pub use fallback::FallbackNode;
pub use generation::{route_tools, GenerationNode, ToolRoute};
pub use input_guard::{route_input, BlockedResponse, GuardRoute, InputGuard};
pub use output_guard::{route_quality, OutputGuard};
pub use tool_executor::{ToolExecutorNode, ToolLimitNode, TOOL_LIMIT_REACHED};

use crate::adk::error::Result;
use crate::adk::model::{Generation, GenerationConfig, Message, Model};

/// Body of a fenced block (```json ... ```), or the trimmed input
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let raw = raw.trim();
    if !raw.contains("```") {
        return raw;
    }
    let inner = raw.split("```").nth(1).unwrap_or(raw);
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

/// A single instruction + input call without tools
pub(crate) async fn instruct(
    model: &dyn Model,
    model_id: &str,
    instruction: &str,
    input: impl Into<String>,
    config: Option<&GenerationConfig>,
) -> Result<Generation> {
    let history = [Message::system(instruction), Message::user(input)];
    model.generate_content(model_id, &history, config, None).await
}
