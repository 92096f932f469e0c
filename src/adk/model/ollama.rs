// SPDX-License-Identifier: MIT

//! Ollama Model - native `/api/chat` implementation
//!
//! Ollama reports token usage as `prompt_eval_count` / `eval_count` and
//! returns tool-call arguments as JSON objects rather than strings.

use super::{Generation, GenerationConfig, Message, Model, Role, TokenUsage, ToolCall};
use crate::adk::error::{ModelError, Result};
use crate::adk::tool::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Ollama chat client
pub struct OllamaModel {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaModel {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Ollama identifies tool results by tool name, so tool messages look up
    /// the name of the call they answer.
    fn to_ollama_messages(history: &[Message]) -> Vec<OllamaMessage> {
        history
            .iter()
            .map(|message| {
                let tool_name = match (message.role, &message.tool_call_id) {
                    (Role::Tool, Some(id)) => history
                        .iter()
                        .flat_map(|m| m.tool_calls.iter())
                        .find(|call| &call.id == id)
                        .map(|call| call.name.clone())
                        .or_else(|| Some(id.clone())),
                    _ => None,
                };

                OllamaMessage {
                    role: message.role.as_str().to_string(),
                    content: message.content.clone(),
                    tool_calls: message
                        .tool_calls
                        .iter()
                        .map(|call| OllamaToolCall {
                            function: OllamaFunction {
                                name: call.name.clone(),
                                arguments: call.args.clone(),
                            },
                        })
                        .collect(),
                    tool_name,
                }
            })
            .collect()
    }

    fn tools_to_ollama_format(tools: &[Arc<dyn Tool>]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| t.function_definition())
            .collect()
    }

    fn build_request(
        model_id: &str,
        history: &[Message],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> OllamaRequest {
        OllamaRequest {
            model: model_id.to_string(),
            messages: Self::to_ollama_messages(history),
            stream: false,
            options: config.map(|cfg| OllamaOptions {
                temperature: cfg.temperature,
                top_p: cfg.top_p,
                num_predict: cfg.max_output_tokens,
            }),
            tools: tools.map(Self::tools_to_ollama_format).unwrap_or_default(),
        }
    }

    fn convert_response(response: OllamaResponse) -> Generation {
        // Ollama does not assign call ids; the tool name stands in for one,
        // suffixed with the position so repeated calls stay distinguishable.
        let tool_calls = response
            .message
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(i, call)| ToolCall {
                id: format!("{}_{}", call.function.name, i),
                name: call.function.name,
                args: match call.function.arguments {
                    Value::String(raw) => serde_json::from_str(&raw).unwrap_or(json!({})),
                    Value::Null => json!({}),
                    other => other,
                },
            })
            .collect();

        Generation {
            message: Message::assistant(response.message.content).with_tool_calls(tool_calls),
            usage: TokenUsage {
                input_tokens: response.prompt_eval_count.unwrap_or(0),
                output_tokens: response.eval_count.unwrap_or(0),
            },
        }
    }
}

#[async_trait]
impl Model for OllamaModel {
    async fn generate_content(
        &self,
        model_id: &str,
        history: &[Message],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Generation> {
        let url = format!("{}/api/chat", self.base_url);
        let request = Self::build_request(model_id, history, config, tools);

        log::debug!(
            "Ollama request body: {}",
            serde_json::to_string_pretty(&request).unwrap_or_default()
        );

        let resp = self.client.post(&url).json(&request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ModelError::Status {
                provider: "ollama".to_string(),
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let body: Value = resp.json().await?;
        log::debug!("Ollama response: {}", body);

        let parsed: OllamaResponse = serde_json::from_value(body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(Self::convert_response(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_request_with_temperature() {
        let history = vec![Message::system("classify"), Message::user("hello")];
        let config = GenerationConfig::deterministic();
        let request = OllamaModel::build_request("llama3.2:3b", &history, Some(&config), None);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "llama3.2:3b");
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["temperature"], 0.0);
        assert_eq!(value["messages"][0]["role"], "system");
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_tool_message_carries_tool_name() {
        let call = ToolCall {
            id: "calculate_0".to_string(),
            name: "calculate".to_string(),
            args: json!({"expression": "2+2"}),
        };
        let history = vec![
            Message::user("2+2?"),
            Message::assistant("").with_tool_calls(vec![call.clone()]),
            Message::tool(&call, "4"),
        ];

        let messages = OllamaModel::to_ollama_messages(&history);
        assert_eq!(messages[1].tool_calls[0].function.name, "calculate");
        assert_eq!(messages[2].role, "tool");
        assert_eq!(messages[2].tool_name.as_deref(), Some("calculate"));
    }

    #[test]
    fn test_convert_response_with_usage_and_tool_calls() {
        let response: OllamaResponse = serde_json::from_value(json!({
            "model": "qwen2.5:7b",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "get_datetime", "arguments": {"timezone_offset": 9}}},
                    {"function": {"name": "calculate", "arguments": "{\"expression\": \"1+1\"}"}}
                ]
            },
            "done": true,
            "prompt_eval_count": 31,
            "eval_count": 9
        }))
        .unwrap();

        let generation = OllamaModel::convert_response(response);
        assert_eq!(generation.usage.input_tokens, 31);
        assert_eq!(generation.usage.output_tokens, 9);
        assert_eq!(generation.message.tool_calls.len(), 2);
        assert_eq!(generation.message.tool_calls[0].id, "get_datetime_0");
        assert_eq!(generation.message.tool_calls[1].args["expression"], "1+1");
    }

    #[test]
    fn test_convert_plain_text_response() {
        let response: OllamaResponse = serde_json::from_value(json!({
            "message": {"role": "assistant", "content": "안녕하세요"}
        }))
        .unwrap();

        let generation = OllamaModel::convert_response(response);
        assert_eq!(generation.text(), "안녕하세요");
        assert_eq!(generation.usage, TokenUsage::default());
    }
}
