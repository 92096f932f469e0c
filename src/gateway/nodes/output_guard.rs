// SPDX-License-Identifier: MIT

//! Output guard - judges the response before it leaves the gateway

use async_trait::async_trait;

use crate::adk::error::Result;
use crate::gateway::config::GuardConfig;
use crate::gateway::graph::Node;
use crate::gateway::state::{AgentState, Intent, OutputQuality, StateUpdate};

pub struct OutputGuard {
    max_retries: u32,
    min_length: usize,
    low_quality_phrases: Vec<String>,
    low_quality_max_length: usize,
}

impl OutputGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            min_length: config.min_response_length,
            low_quality_phrases: config
                .low_quality_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            low_quality_max_length: config.low_quality_max_length,
        }
    }

    /// Verdict and the retry counter to store with it
    pub fn evaluate(&self, state: &AgentState) -> (OutputQuality, u32) {
        let retries = state.retry_count;
        if retries >= self.max_retries {
            return (OutputQuality::Fallback, retries);
        }

        let response = state.response.trim();
        let length = response.chars().count();
        if length < self.min_length {
            return (OutputQuality::Retry, retries + 1);
        }

        if state.intent == Intent::Search && length < self.low_quality_max_length {
            let lowered = response.to_lowercase();
            if self.low_quality_phrases.iter().any(|p| lowered.contains(p.as_str())) {
                return (OutputQuality::Retry, retries + 1);
            }
        }

        (OutputQuality::Pass, retries)
    }
}

#[async_trait]
impl Node for OutputGuard {
    fn name(&self) -> &str {
        "output_guard"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let (quality, retry_count) = self.evaluate(state);
        match quality {
            OutputQuality::Pass => log::info!("Output passed"),
            OutputQuality::Retry => log::warn!("Output rejected, retry {}/{}", retry_count, self.max_retries),
            OutputQuality::Fallback => log::warn!("Retries exhausted, using fallback"),
        }

        Ok(StateUpdate {
            output_quality: Some(quality),
            retry_count: Some(retry_count),
            ..StateUpdate::new()
        })
    }
}

/// Route on the output guard's verdict
pub fn route_quality(state: &AgentState) -> OutputQuality {
    state.output_quality
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> OutputGuard {
        OutputGuard::new(&GuardConfig::default())
    }

    fn state(intent: Intent, response: &str, retry_count: u32) -> AgentState {
        AgentState {
            intent,
            response: response.to_string(),
            retry_count,
            ..AgentState::new("q")
        }
    }

    #[test]
    fn test_short_response_retries() {
        assert_eq!(guard().evaluate(&state(Intent::General, "abc", 0)), (OutputQuality::Retry, 1));
        assert_eq!(guard().evaluate(&state(Intent::General, "", 1)), (OutputQuality::Retry, 2));
        assert_eq!(guard().evaluate(&state(Intent::General, "  ab   ", 0)), (OutputQuality::Retry, 1));
    }

    #[test]
    fn test_exhausted_retries_fall_back_without_incrementing() {
        assert_eq!(guard().evaluate(&state(Intent::General, "abc", 2)), (OutputQuality::Fallback, 2));
        assert_eq!(
            guard().evaluate(&state(Intent::General, "a perfectly good answer", 2)),
            (OutputQuality::Fallback, 2)
        );
    }

    #[test]
    fn test_length_counts_characters() {
        // five Hangul syllables pass even though they are fifteen bytes
        assert_eq!(guard().evaluate(&state(Intent::General, "맑고화창함", 0)), (OutputQuality::Pass, 0));
    }

    #[test]
    fn test_low_information_search_answer() {
        let weak = "i'm sorry, nothing came up.";
        assert_eq!(guard().evaluate(&state(Intent::Search, weak, 0)), (OutputQuality::Retry, 1));
        assert_eq!(
            guard().evaluate(&state(Intent::Search, "죄송합니다. 정보가 없습니다.", 1)),
            (OutputQuality::Retry, 2)
        );
        // same text outside search passes
        assert_eq!(guard().evaluate(&state(Intent::General, weak, 0)), (OutputQuality::Pass, 0));
    }

    #[test]
    fn test_long_search_answer_with_phrase_passes() {
        let long = format!("I'm sorry for the delay. {}", "Seoul is sunny today with a high of 21C. ".repeat(3));
        assert_eq!(guard().evaluate(&state(Intent::Search, &long, 0)), (OutputQuality::Pass, 0));
    }

    #[tokio::test]
    async fn test_node_update() {
        let update = guard().run(&state(Intent::General, "abc", 0)).await.unwrap();
        assert_eq!(update.output_quality, Some(OutputQuality::Retry));
        assert_eq!(update.retry_count, Some(1));
    }
}
