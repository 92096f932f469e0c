// SPDX-License-Identifier: MIT

//! Built-in tools and the registry that exposes them to the model

pub mod calculator;
pub mod datetime;
pub mod registry;
pub mod search;
pub mod url_reader;

pub use calculator::CalculatorTool;
pub use datetime::DateTimeTool;
pub use registry::ToolRegistry;
pub use search::{WebSearchTool, NO_RESULTS};
pub use url_reader::UrlReaderTool;

use std::sync::Arc;

use crate::adk::error::Result;
use crate::gateway::config::GatewaySettings;

/// Name the search pipeline looks up for retrieval
pub const WEB_SEARCH: &str = "web_search";

/// Registry with every built-in tool the settings allow.
///
/// Web search needs a Brave API key; without one it is left out and the
/// search pipeline reports that nothing was found.
pub async fn default_registry(settings: &GatewaySettings) -> Result<ToolRegistry> {
    let registry = ToolRegistry::new();

    registry.register(Arc::new(CalculatorTool)).await;
    registry.register(Arc::new(DateTimeTool)).await;
    registry.register(Arc::new(UrlReaderTool::new()?)).await;

    match settings.brave_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => {
            let search = WebSearchTool::new(key, settings.request_timeout())?;
            registry.register(Arc::new(search)).await;
        }
        _ => log::warn!("BRAVE_API_KEY not set; web search is disabled"),
    }

    log::info!("Registered tools: {:?}", registry.names().await);
    Ok(registry)
}
