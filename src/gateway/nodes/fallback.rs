// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::adk::error::Result;
use crate::gateway::graph::Node;
use crate::gateway::state::{AgentState, Intent, StateUpdate};

/// Characters of the query echoed back in a fallback message
const ECHO_CHARS: usize = 50;

/// Canned guidance for an intent after retries ran out
pub fn fallback_message(intent: Intent, query: &str) -> String {
    let echo = format!("{}...", query.chars().take(ECHO_CHARS).collect::<String>());
    match intent {
        Intent::Search => format!(
            "Sorry, I could not gather enough search results for '{}'.\n\n\
             You could try:\n\
             - asking a more specific question\n\
             - using different keywords\n\
             - trying again later (the search service may be temporarily unavailable)",
            echo
        ),
        Intent::Analysis => format!(
            "I could not complete the analysis of '{}'.\n\n\
             The question may be very complex or broad.\n\
             You could try:\n\
             - narrowing the scope of the question\n\
             - naming the things to compare explicitly\n\
             - focusing on one topic at a time",
            echo
        ),
        Intent::Creative => format!(
            "I could not produce a result for '{}'.\n\n\
             You could try:\n\
             - describing the format or style you want\n\
             - giving an example\n\
             - splitting the request into smaller parts",
            echo
        ),
        Intent::General => "Sorry, I am having trouble handling this request right now.\n\n\
             Please try again shortly. If the problem persists, rephrasing the question may help."
            .to_string(),
    }
}

/// Terminal step once the output guard gives up
pub struct FallbackNode;

#[async_trait]
impl Node for FallbackNode {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        Ok(StateUpdate::new().response(fallback_message(state.intent, &state.query)))
    }
}
