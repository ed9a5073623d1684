use std::env;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::parser::grammar::GrammarVersion;

pub const CLARIFAI_HOST: &str = "https://api.clarifai.com";
/// Reported by `get_model` when no model id is configured
pub const CLARIFAI_FALLBACK_MODEL: &str = "clarifai-default";
/// Offered by `list_models` when no catalog is configured
pub const CLARIFAI_KNOWN_MODELS: &[&str] = &["qwen/qwenCoder/models/Qwen2_5-Coder-7B-Instruct-vllm"];

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Clarifai(ClarifaiProviderConfig),
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifaiProviderConfig {
    /// Personal access token, sent as `Authorization: Key <pat>`
    #[serde(default)]
    pub pat: Option<String>,
    /// `<owner>/<app>/models/<name>`
    #[serde(default)]
    pub model_id: Option<String>,
    /// Pin a model version instead of the latest one
    #[serde(default)]
    pub model_version_id: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    /// Model ids offered when listing models; a built-in list is used when empty
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Nucleus-sampling cutoff, sent as `top_k`
    #[serde(default = "default_top_k")]
    pub top_k: f64,
    /// Block grammar the model was prompted with
    #[serde(default)]
    pub grammar: GrammarVersion,
    /// Whole-request timeout. Unset means requests only end through cancellation.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_host() -> String {
    CLARIFAI_HOST.to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_top_k() -> f64 {
    0.95
}

impl Default for ClarifaiProviderConfig {
    fn default() -> Self {
        Self {
            pat: None,
            model_id: None,
            model_version_id: None,
            host: default_host(),
            models: Vec::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_k: default_top_k(),
            grammar: GrammarVersion::default(),
            timeout_secs: None,
        }
    }
}

// The token stays out of logs and panics.
impl fmt::Debug for ClarifaiProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClarifaiProviderConfig")
            .field("pat", &self.pat.as_ref().map(|_| "<redacted>"))
            .field("model_id", &self.model_id)
            .field("model_version_id", &self.model_version_id)
            .field("host", &self.host)
            .field("models", &self.models)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_k", &self.top_k)
            .field("grammar", &self.grammar)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClarifaiProviderConfig {
    pub fn new<P: Into<String>, M: Into<String>>(pat: P, model_id: M) -> Self {
        Self {
            pat: Some(pat.into()),
            model_id: Some(model_id.into()),
            ..Default::default()
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_model_version<S: Into<String>>(mut self, version: S) -> Self {
        self.model_version_id = Some(version.into());
        self
    }

    pub fn with_grammar(mut self, grammar: GrammarVersion) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Load configuration from `CLARIFAI_*` environment variables.
    ///
    /// Nothing is required here: a missing token or model id is reported when a
    /// request is made, so the model can still be displayed without them.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            pat: get_env("CLARIFAI_PAT")?,
            model_id: get_env("CLARIFAI_MODEL_ID")?,
            model_version_id: get_env("CLARIFAI_MODEL_VERSION_ID")?,
            ..Default::default()
        };

        if let Some(host) = get_env("CLARIFAI_API_BASE_URL")? {
            config.host = host;
        }
        if let Some(models) = get_env("CLARIFAI_MODELS")? {
            config.models = models
                .split(',')
                .map(str::trim)
                .filter(|model| !model.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(temperature) = get_env("CLARIFAI_TEMPERATURE")? {
            config.temperature = temperature
                .parse()
                .context("CLARIFAI_TEMPERATURE must be a number")?;
        }
        if let Some(max_tokens) = get_env("CLARIFAI_MAX_TOKENS")? {
            config.max_tokens = max_tokens
                .parse()
                .context("CLARIFAI_MAX_TOKENS must be a positive integer")?;
        }
        if let Some(top_k) = get_env("CLARIFAI_TOP_K")? {
            config.top_k = top_k.parse().context("CLARIFAI_TOP_K must be a number")?;
        }
        if let Some(timeout) = get_env("CLARIFAI_TIMEOUT_SECS")? {
            config.timeout_secs = Some(
                timeout
                    .parse()
                    .context("CLARIFAI_TIMEOUT_SECS must be a whole number of seconds")?,
            );
        }
        if let Some(grammar) = get_env("CLARIFAI_GRAMMAR")? {
            config.grammar = grammar
                .parse()
                .with_context(|| format!("Unknown CLARIFAI_GRAMMAR '{}'", grammar))?;
        }

        Ok(config)
    }
}

/// Read an optional variable; empty values count as unset
fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Could not read {}", key)),
    }
}
