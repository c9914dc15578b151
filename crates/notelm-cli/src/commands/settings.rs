use std::path::Path;

use notelm_core::models::{AiProvider, Settings};

use crate::cli::{ProviderArg, SettingsCommands};
use crate::commands::common::open_notes;
use crate::error::CliError;

impl From<ProviderArg> for AiProvider {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Gemini => Self::Gemini,
            ProviderArg::Ollama => Self::Ollama,
        }
    }
}

/// Requested changes from `notelm settings set`.
#[derive(Debug, Default)]
pub struct SettingsUpdate {
    pub provider: Option<ProviderArg>,
    pub api_key: Option<String>,
    pub ollama_url: Option<String>,
    pub model: Option<String>,
}

impl SettingsUpdate {
    const fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.api_key.is_none()
            && self.ollama_url.is_none()
            && self.model.is_none()
    }

    /// Apply onto `settings`. An empty API key clears the stored one.
    pub fn apply(self, settings: &mut Settings) -> Result<(), CliError> {
        if self.is_empty() {
            return Err(CliError::NothingToUpdate);
        }
        if let Some(provider) = self.provider {
            settings.provider = provider.into();
        }
        if let Some(api_key) = self.api_key {
            settings.api_key = api_key.trim().to_string();
        }
        if let Some(url) = self.ollama_url {
            let url = url.trim().trim_end_matches('/').to_string();
            if !notelm_core::util::is_http_url(&url) {
                return Err(CliError::Config(
                    "ollama_url must include http:// or https://".to_string(),
                ));
            }
            settings.ollama_url = url;
        }
        if let Some(model) = self.model {
            let model = model.trim();
            if model.is_empty() {
                return Err(CliError::Config("model must not be empty".to_string()));
            }
            settings.model = model.to_string();
        }
        Ok(())
    }
}

pub async fn run_settings(
    command: Option<SettingsCommands>,
    db_path: &Path,
) -> Result<(), CliError> {
    let notes = open_notes(db_path)?;

    let settings = match command {
        None | Some(SettingsCommands::Show { json: false }) => notes.load_settings().await?,
        Some(SettingsCommands::Show { json: true }) => {
            let mut settings = notes.load_settings().await?;
            if !settings.api_key.is_empty() {
                settings.api_key = "[REDACTED]".to_string();
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        Some(SettingsCommands::Set {
            provider,
            api_key,
            ollama_url,
            model,
        }) => {
            let mut settings = notes.load_settings().await?;
            SettingsUpdate {
                provider,
                api_key,
                ollama_url,
                model,
            }
            .apply(&mut settings)?;
            notes.save_settings(&settings).await?;
            settings
        }
        Some(SettingsCommands::Reset) => notes.reset_settings().await?,
    };

    for line in format_settings_lines(&settings) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_settings_lines(settings: &Settings) -> Vec<String> {
    let api_key = if settings.api_key.is_empty() {
        "(not set)"
    } else {
        "(set)"
    };
    let ready = if settings.is_provider_ready() {
        "ready"
    } else {
        "not ready"
    };
    vec![
        format!("provider:   {} ({ready})", settings.provider),
        format!("model:      {}", settings.model),
        format!("api_key:    {api_key}"),
        format!("ollama_url: {}", settings.ollama_url),
    ]
}
