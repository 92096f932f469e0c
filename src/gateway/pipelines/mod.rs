// SPDX-License-Identifier: MIT

//! Specialised three-stage pipelines, each compiled as a nested graph and
//! mounted in the main graph as a single node.

pub mod analysis;
pub mod search;

pub use analysis::create_analysis_subgraph;
pub use search::create_search_subgraph;

use crate::adk::model::{Message, Model};
use crate::gateway::config::GatewaySettings;
use crate::gateway::nodes::instruct;
use crate::gateway::state::{AgentState, StateUpdate};

/// Final answer from the primary model, metered.
///
/// A failed call yields an empty assistant turn so the output guard
/// retries the attempt.
pub(crate) async fn synthesize(
    model: &dyn Model,
    settings: &GatewaySettings,
    state: &AgentState,
    instruction: &str,
    input: String,
) -> StateUpdate {
    let model_id = if state.model_id.is_empty() {
        settings.model_for(state.intent)
    } else {
        state.model_id.as_str()
    };

    match instruct(model, model_id, instruction, input, None).await {
        Ok(generation) => {
            let response = generation.text().to_string();
            StateUpdate::new()
                .message(generation.message)
                .response(response)
                .usage(generation.usage)
        }
        Err(e) => {
            log::warn!("Synthesis failed: {}", e);
            StateUpdate::new().message(Message::assistant("")).response("")
        }
    }
}
