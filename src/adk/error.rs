// SPDX-License-Identifier: MIT

//! Typed error handling for agent-gateway
//!
//! Backend failures (model or tool calls) are recovered inside the graph
//! nodes; the errors that escape a run are configuration problems, the
//! recursion limit, or a timeout imposed by the caller.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error type for agent-gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// API errors from external services (Ollama, OpenAI, Brave, ...)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Tool not found during execution
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Graph construction or execution errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Model/LLM errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// The run exceeded the configured deadline
    #[error("Run timed out after {0} seconds")]
    Timeout(u64),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Errors raised while building or running a state graph
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// No entry point was set before compiling
    #[error("Graph '{0}' has no entry point")]
    MissingEntryPoint(String),

    /// A node name was registered twice
    #[error("Node '{0}' is already registered")]
    DuplicateNode(String),

    /// A node name collides with a reserved marker
    #[error("Node name '{0}' is reserved")]
    ReservedName(String),

    /// An edge or the entry point refers to a node that does not exist
    #[error("Edge {from} -> {to} refers to an unknown node")]
    UnknownNode { from: String, to: String },

    /// A node has more than one outgoing edge declaration
    #[error("Node '{0}' already has an outgoing edge")]
    DuplicateEdge(String),

    /// A node has no outgoing edge and would strand the run
    #[error("Node '{0}' has no outgoing edge")]
    DeadEnd(String),

    /// A routing function can return a branch with no declared successor
    #[error("Conditional edge from '{node}' does not map branch {branch}")]
    UnmappedBranch { node: String, branch: String },

    /// The run took more steps than the graph allows
    #[error("Graph '{graph}' exceeded its recursion limit of {limit} steps")]
    RecursionLimit { graph: String, limit: usize },
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Non-success HTTP status from the provider
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool not found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for GatewayError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for GatewayError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        Self::Other(format!("invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_wraps_into_gateway_error() {
        let err: GatewayError = GraphError::DeadEnd("tools".to_string()).into();
        assert_eq!(err.to_string(), "Graph error: Node 'tools' has no outgoing edge");
    }

    #[test]
    fn test_unmapped_branch_message() {
        let err = GraphError::UnmappedBranch {
            node: "classifier".to_string(),
            branch: "Creative".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Conditional edge from 'classifier' does not map branch Creative"
        );
    }

    #[test]
    fn test_helpers() {
        assert!(matches!(
            GatewayError::tool_not_found("calc"),
            GatewayError::ToolNotFound { name } if name == "calc"
        ));
        assert_eq!(
            GatewayError::api("ollama", "down").to_string(),
            "API error from ollama: down"
        );
    }
}
