// SPDX-License-Identifier: MIT

use crate::adk::error::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

/// A capability the model can ask the gateway to invoke.
///
/// Name, description and schema are borrowed so a registry can hand the
/// same definitions to every model call; keep them in fields or statics.
/// Failures worth showing to the model belong in the returned text, while
/// `Err` is for unusable input or transport faults.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique within a registry
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn schema(&self) -> &Value;

    async fn execute(&self, input: Value) -> Result<String>;

    /// Function definition in the chat-completions wire shape shared by
    /// Ollama and OpenAI-compatible servers
    fn function_definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.schema()
            }
        })
    }
}
