//! Application settings model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default generation model
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// AI generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// Google Gemini (requires an API key)
    #[default]
    Gemini,
    /// Self-hosted Ollama
    Ollama,
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => f.write_str("gemini"),
            Self::Ollama => f.write_str("ollama"),
        }
    }
}

impl FromStr for AiProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::InvalidInput(format!("Unknown AI provider: {other}"))),
        }
    }
}

/// Application settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Selected AI backend
    pub provider: AiProvider,
    /// API key for hosted providers
    pub api_key: String,
    /// Base URL of the Ollama server
    pub ollama_url: String,
    /// Model name passed to the provider
    pub model: String,
}

impl Settings {
    /// Whether the selected provider has what it needs to be called
    #[must_use]
    pub fn is_provider_ready(&self) -> bool {
        match self.provider {
            AiProvider::Gemini => !self.api_key.trim().is_empty(),
            AiProvider::Ollama => crate::util::is_http_url(self.ollama_url.trim()),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: AiProvider::Gemini,
            api_key: String::new(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            ""
        } else {
            "[REDACTED]"
        };
        formatter
            .debug_struct("Settings")
            .field("provider", &self.provider)
            .field("api_key", &api_key)
            .field("ollama_url", &self.ollama_url)
            .field("model", &self.model)
            .finish()
    }
}
