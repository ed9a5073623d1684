use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use textwire::parser::grammar::GrammarVersion;
use textwire::providers::configs::{ClarifaiProviderConfig, ProviderConfig, CLARIFAI_HOST};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Clarifai {
        /// Requests fail without it; listing and showing the model still work
        #[serde(default)]
        pat: Option<String>,
        #[serde(default)]
        model_id: Option<String>,
        #[serde(default)]
        model_version_id: Option<String>,
        #[serde(default = "default_clarifai_host")]
        host: String,
        #[serde(default)]
        models: Vec<String>,
        #[serde(default)]
        temperature: Option<f64>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        top_k: Option<f64>,
        #[serde(default)]
        grammar: GrammarVersion,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

impl ProviderSettings {
    // Convert to the library's ProviderConfig
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::Clarifai {
                pat,
                model_id,
                model_version_id,
                host,
                models,
                temperature,
                max_tokens,
                top_k,
                grammar,
                timeout_secs,
            } => {
                let mut config = ClarifaiProviderConfig {
                    pat,
                    model_id,
                    model_version_id,
                    host,
                    models,
                    grammar,
                    timeout_secs,
                    ..Default::default()
                };
                if let Some(temperature) = temperature {
                    config.temperature = temperature;
                }
                if let Some(max_tokens) = max_tokens {
                    config.max_tokens = max_tokens;
                }
                if let Some(top_k) = top_k {
                    config.top_k = top_k;
                }
                ProviderConfig::Clarifai(config)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
}

impl Settings {
    /// Layer defaults, an optional TOML file and `TEXTWIRE_*` variables, in that order
    pub fn new(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("provider.type", "clarifai")?
            .set_default("provider.host", default_clarifai_host())?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("TEXTWIRE")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("provider.models")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize::<Self>().map_err(deserialize_error)
    }
}

/// Point missing-field errors at the environment variable that would fill them
fn deserialize_error(err: config::ConfigError) -> ConfigError {
    tracing::debug!("Configuration error: {:?}", &err);

    let error_str = err.to_string();
    if error_str.starts_with("missing field") {
        // "missing field `type`"
        let field = error_str.split('`').nth(1).unwrap_or_default();
        ConfigError::MissingEnvVar {
            env_var: to_env_var(field),
        }
    } else if let config::ConfigError::NotFound(field) = &err {
        ConfigError::MissingEnvVar {
            env_var: to_env_var(field),
        }
    } else {
        ConfigError::Other(err)
    }
}

fn default_clarifai_host() -> String {
    CLARIFAI_HOST.to_string()
}
