//! Config file loading and profile resolution

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokrate_core::{RunConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use tokrate_vendors::ApiType;

/// Environment variable consulted when a profile carries no API key.
pub const DEFAULT_API_KEY_ENV: &str = "TOKRATE_API_KEY";

/// One endpoint profile.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelProfile {
    #[serde(default = "default_profile_name")]
    pub name: String,
    #[serde(default)]
    pub api_type: ApiType,
    pub model_url: String,
    pub model_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request deadline in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl std::fmt::Debug for ModelProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProfile")
            .field("name", &self.name)
            .field("api_type", &self.api_type)
            .field("model_url", &self.model_url)
            .field("model_name", &self.model_name)
            .field("api_key", &(!self.api_key.is_empty()).then_some("<redacted>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn default_profile_name() -> String {
    "default".to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_timeout() -> u64 {
    60
}

/// Contents of a config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    pub models: Vec<ModelProfile>,
    #[serde(default)]
    pub active_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_levels: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_cooldown_secs: Option<u64>,
}

impl ConfigFile {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        if config.models.is_empty() {
            bail!("config file {} defines no models", path.display());
        }
        Ok(config)
    }

    /// Example written by `tokrate init`.
    pub fn example() -> Self {
        Self {
            models: vec![
                ModelProfile {
                    name: "local-vllm".to_string(),
                    api_type: ApiType::OpenAI,
                    model_url: "http://localhost:8000/v1/chat/completions".to_string(),
                    model_name: "qwen2-7b-instruct".to_string(),
                    api_key: String::new(),
                    max_tokens: DEFAULT_MAX_TOKENS,
                    temperature: DEFAULT_TEMPERATURE,
                    timeout: default_timeout(),
                },
                ModelProfile {
                    name: "local-ollama".to_string(),
                    api_type: ApiType::Ollama,
                    model_url: "http://localhost:11434/api/generate".to_string(),
                    model_name: "llama3".to_string(),
                    api_key: String::new(),
                    max_tokens: DEFAULT_MAX_TOKENS,
                    temperature: DEFAULT_TEMPERATURE,
                    timeout: default_timeout(),
                },
            ],
            active_index: 0,
            concurrency_levels: Some(vec![1, 2, 4, 8, 10]),
            prompts: None,
            level_cooldown_secs: Some(2),
        }
    }

    /// Write the config to a new file; an existing file is never overwritten.
    pub fn write_new(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("refusing to write config file {}", path.display()))?;
        file.write_all(text.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .with_context(|| format!("failed to write config file {}", path.display()))
    }

    /// Profile named `name`, or the active one.
    pub fn profile(&self, name: Option<&str>) -> Result<&ModelProfile> {
        match name {
            Some(name) => self
                .models
                .iter()
                .find(|profile| profile.name == name)
                .ok_or_else(|| {
                    let known: Vec<&str> = self.models.iter().map(|p| p.name.as_str()).collect();
                    anyhow!("no profile named '{}' (known: {})", name, known.join(", "))
                }),
            None => self.models.get(self.active_index).ok_or_else(|| {
                anyhow!(
                    "active_index {} is out of range ({} profiles)",
                    self.active_index,
                    self.models.len()
                )
            }),
        }
    }
}

/// Command-line adjustments applied on top of a profile.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub profile: Option<String>,
    pub levels: Option<Vec<usize>>,
    pub prompts_file: Option<PathBuf>,
    pub api_key_env: Option<String>,
    pub cooldown_secs: Option<u64>,
}

/// A validated run ready to execute.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub profile_name: String,
    pub api_type: ApiType,
    pub config: RunConfig,
}

impl ResolvedRun {
    /// Resolve against the process environment.
    pub fn resolve(file: &ConfigFile, overrides: &RunOverrides) -> Result<Self> {
        Self::resolve_with(file, overrides, |var| std::env::var(var).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with<F>(file: &ConfigFile, overrides: &RunOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let profile = file.profile(overrides.profile.as_deref())?;

        let mut config = RunConfig::new(&profile.model_url, &profile.model_name)
            .with_max_tokens(profile.max_tokens)
            .with_temperature(profile.temperature)
            .with_timeout(Duration::from_secs(profile.timeout));

        let api_key_env = overrides.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV);
        let api_key = Some(profile.api_key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| env(api_key_env).filter(|key| !key.trim().is_empty()));
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        } else {
            tracing::debug!(env = api_key_env, "No API key configured");
        }

        if let Some(levels) = overrides.levels.as_ref().or(file.concurrency_levels.as_ref()) {
            config = config.with_concurrency_levels(levels.clone());
        }

        if let Some(path) = &overrides.prompts_file {
            config = config.with_prompts(load_prompts(path)?);
        } else if let Some(prompts) = &file.prompts {
            config = config.with_prompts(prompts.clone());
        }

        if let Some(secs) = overrides.cooldown_secs.or(file.level_cooldown_secs) {
            config = config.with_level_cooldown(Duration::from_secs(secs));
        }

        config
            .validate()
            .with_context(|| format!("invalid settings in profile '{}'", profile.name))?;

        Ok(Self {
            profile_name: profile.name.clone(),
            api_type: profile.api_type,
            config,
        })
    }
}

/// Read a prompts file: one prompt per non-blank line.
pub fn load_prompts(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read prompts file {}", path.display()))?;
    let prompts: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if prompts.is_empty() {
        bail!("prompts file {} contains no prompts", path.display());
    }
    Ok(prompts)
}
