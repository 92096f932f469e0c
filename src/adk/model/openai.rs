// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions API implementation
//!
//! Works against any OpenAI-compatible endpoint (vLLM, LM Studio, Ollama's
//! `/v1` shim) through `OPENAI_BASE_URL`.

use super::{Generation, GenerationConfig, Message, Model, Role, TokenUsage, ToolCall};
use crate::adk::error::{ModelError, Result};
use crate::adk::tool::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// OpenAI chat completions client
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIModel {
    /// Create a new OpenAIModel
    pub fn new(api_key: Option<String>, base_url: String, timeout: Duration) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ModelError::ApiKeyMissing("openai".to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Convert a Message to OpenAI message format
    fn message_to_openai(message: &Message) -> Value {
        match message.role {
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content
            }),
            Role::Assistant if message.has_tool_calls() => {
                let tool_calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": serde_json::to_string(&call.args).unwrap_or_default()
                            }
                        })
                    })
                    .collect();
                json!({
                    "role": "assistant",
                    "content": if message.content.is_empty() { Value::Null } else { json!(message.content) },
                    "tool_calls": tool_calls
                })
            }
            role => json!({
                "role": role.as_str(),
                "content": message.content
            }),
        }
    }

    /// Convert tools to OpenAI function format
    fn tools_to_openai_format(tools: &[Arc<dyn Tool>]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| t.function_definition())
            .collect()
    }

    /// Parse an OpenAI response into a Generation
    fn parse_openai_response(response: &Value) -> Result<Generation> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))?;

        let message = &choice["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for tc in calls {
                let name = tc["function"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let id = tc["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| name.clone());
                let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
                let args: Value = serde_json::from_str(args_str).unwrap_or(json!({}));
                tool_calls.push(ToolCall { id, name, args });
            }
        }

        let usage = TokenUsage {
            input_tokens: response["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: response["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(Generation {
            message: Message::assistant(content).with_tool_calls(tool_calls),
            usage,
        })
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate_content(
        &self,
        model_id: &str,
        history: &[Message],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Generation> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages: Vec<Value> = history.iter().map(Self::message_to_openai).collect();

        let mut body = json!({
            "model": model_id,
            "messages": messages
        });

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(Self::tools_to_openai_format(tools));
                body["tool_choice"] = json!("auto");
            }
        }

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ModelError::Status {
                provider: "openai".to_string(),
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_openai_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_message() {
        let msg = OpenAIModel::message_to_openai(&Message::user("Hello"));
        assert_eq!(msg["role"], "user");
        assert_eq!(msg["content"], "Hello");
    }

    #[test]
    fn test_system_message() {
        let msg = OpenAIModel::message_to_openai(&Message::system("You are helpful"));
        assert_eq!(msg["role"], "system");
        assert_eq!(msg["content"], "You are helpful");
    }

    #[test]
    fn test_assistant_message_with_tool_calls() {
        let message = Message::assistant("").with_tool_calls(vec![ToolCall {
            id: "call_9".to_string(),
            name: "web_search".to_string(),
            args: json!({"query": "rust"}),
        }]);

        let msg = OpenAIModel::message_to_openai(&message);
        assert_eq!(msg["role"], "assistant");
        assert!(msg["content"].is_null());
        assert_eq!(msg["tool_calls"][0]["id"], "call_9");
        assert_eq!(msg["tool_calls"][0]["function"]["name"], "web_search");
    }

    #[test]
    fn test_tool_message() {
        let call = ToolCall {
            id: "call_9".to_string(),
            name: "web_search".to_string(),
            args: json!({}),
        };
        let msg = OpenAIModel::message_to_openai(&Message::tool(&call, "results"));
        assert_eq!(msg["role"], "tool");
        assert_eq!(msg["tool_call_id"], "call_9");
        assert_eq!(msg["content"], "results");
    }

    #[test]
    fn test_parse_text_response_with_usage() {
        let response = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Hello, how can I help?"}
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7}
        });

        let generation = OpenAIModel::parse_openai_response(&response).unwrap();
        assert_eq!(generation.text(), "Hello, how can I help?");
        assert_eq!(generation.usage.input_tokens, 12);
        assert_eq!(generation.usage.output_tokens, 7);
        assert!(!generation.message.has_tool_calls());
    }

    #[test]
    fn test_parse_function_call_response() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "get_datetime",
                            "arguments": "{\"timezone_offset\": 9}"
                        }
                    }]
                }
            }]
        });

        let generation = OpenAIModel::parse_openai_response(&response).unwrap();
        let call = &generation.message.tool_calls[0];
        assert_eq!(call.id, "call_123");
        assert_eq!(call.name, "get_datetime");
        assert_eq!(call.args["timezone_offset"], 9);
        assert_eq!(generation.usage, TokenUsage::default());
    }

    #[test]
    fn test_parse_without_choices_fails() {
        assert!(OpenAIModel::parse_openai_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let result = OpenAIModel::new(None, "http://localhost".to_string(), Duration::from_secs(1));
        assert!(result.is_err());
    }
}
