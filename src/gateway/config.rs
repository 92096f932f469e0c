// SPDX-License-Identifier: MIT

//! Gateway settings
//!
//! Defaults match a local Ollama deployment. Settings can be read from a YAML
//! file and are then overridden by environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::adk::error::{GatewayError, Result};
use crate::gateway::graph::DEFAULT_RECURSION_LIMIT;
use crate::gateway::state::Intent;

/// Which model client backs the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    OpenAI,
}

/// Top-level settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub provider: Provider,
    pub ollama_url: String,
    pub openai_base_url: String,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub brave_api_key: Option<String>,
    /// Lightweight model: classifier, query refiner, decomposer, general branch
    pub model_simple: String,
    /// High-capability model for the specialised branches
    pub model_complex: String,
    /// Per-request timeout for model and tool HTTP calls
    pub request_timeout_secs: u64,
    /// Optional deadline for a whole run
    pub run_timeout_secs: Option<u64>,
    pub max_tool_iterations: u32,
    pub recursion_limit: usize,
    pub guard: GuardConfig,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            ollama_url: "http://localhost:11434".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
            brave_api_key: None,
            model_simple: "llama3.2:3b".to_string(),
            model_complex: "qwen2.5:7b".to_string(),
            request_timeout_secs: 60,
            run_timeout_secs: None,
            max_tool_iterations: 5,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            guard: GuardConfig::default(),
        }
    }
}

impl GatewaySettings {
    /// Load settings from a YAML file (defaults when `None`), then apply
    /// environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::parse_yaml(&fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn parse_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = env::var("OLLAMA_URL") {
            self.ollama_url = url;
        }
        if let Ok(model) = env::var("MODEL_SIMPLE") {
            self.model_simple = model;
        }
        if let Ok(model) = env::var("MODEL_COMPLEX") {
            self.model_complex = model;
        }
        if let Ok(url) = env::var("OPENAI_BASE_URL") {
            self.openai_base_url = url;
        }
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Ok(key) = env::var("BRAVE_API_KEY") {
            self.brave_api_key = Some(key);
        }
        if let Ok(provider) = env::var("MODEL_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "openai" => self.provider = Provider::OpenAI,
                "ollama" => self.provider = Provider::Ollama,
                other => log::warn!("Ignoring unknown MODEL_PROVIDER '{}'", other),
            }
        }
    }

    /// Check values that would make the graph misbehave
    pub fn validate(&self) -> Result<()> {
        if self.model_simple.trim().is_empty() || self.model_complex.trim().is_empty() {
            return Err(GatewayError::config("model names must not be empty"));
        }
        if self.recursion_limit == 0 {
            return Err(GatewayError::config("recursion_limit must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(GatewayError::config("request_timeout_secs must be positive"));
        }
        self.guard.validate()
    }

    /// Model used for a classified intent
    pub fn model_for(&self, intent: Intent) -> &str {
        match intent {
            Intent::General => &self.model_simple,
            _ => &self.model_complex,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Rule tables for the input and output guards
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Longest accepted query, in characters
    pub max_input_length: usize,
    /// Case-insensitive regexes for prompt-injection attempts
    pub injection_patterns: Vec<String>,
    /// Case-insensitive regexes for harmful-content requests
    pub harmful_patterns: Vec<String>,
    /// Retries before the output guard gives up
    pub max_retries: u32,
    /// Shorter responses are retried
    pub min_response_length: usize,
    /// Phrases marking a search answer that found nothing
    pub low_quality_phrases: Vec<String>,
    /// Low-quality phrases only trigger a retry below this length
    pub low_quality_max_length: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_input_length: 4000,
            injection_patterns: [
                r"ignore\s+(all\s+)?(previous|above|prior)\s+(instructions?|prompts?|rules?)",
                r"(you\s+are|act\s+as|pretend\s+to\s+be)\s+(now\s+)?a?\s*(evil|malicious|hacker|jailbreak)",
                r"system\s*prompt\s*[:=]",
                r"<\|?(system|im_start|im_end)\|?>",
                r"\bDAN\b(\s*mode)?",
                r"(do\s+)?anything\s+now",
                r"(override|bypass|disable)\s+(safety|filter|guard|restriction|rule)",
                r"이전\s*(지시|명령|규칙).*?(무시|잊어|삭제)",
                r"(시스템|관리자)\s*프롬프트",
                r"(안전|필터|보안).*?(해제|무시|우회|비활성)",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            harmful_patterns: [
                r"(how\s+to\s+)?(make|create|build)\s+(a\s+)?(bomb|weapon|explosive|virus|malware)",
                r"(폭탄|무기|폭발물|바이러스|악성코드)\s*(제조|만들|생성)",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            max_retries: 2,
            min_response_length: 5,
            low_quality_phrases: [
                "죄송합니다",
                "알 수 없습니다",
                "정보가 없습니다",
                "답변할 수 없습니다",
                "I don't know",
                "I cannot",
                "I'm sorry",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            low_quality_max_length: 100,
        }
    }
}

impl GuardConfig {
    pub fn validate(&self) -> Result<()> {
        for pattern in self.injection_patterns.iter().chain(&self.harmful_patterns) {
            regex::Regex::new(pattern)
                .map_err(|e| GatewayError::config(format!("invalid guard pattern '{}': {}", pattern, e)))?;
        }
        Ok(())
    }
}
