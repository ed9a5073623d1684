use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration, set the environment variable {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a settings key such as `provider.model_id` to `TEXTWIRE_PROVIDER__MODEL_ID`.
/// Bare field names are taken to live under `provider`.
pub fn to_env_var(field: &str) -> String {
    let key = if field.contains('.') {
        field.to_string()
    } else {
        format!("provider.{}", field)
    };
    format!("TEXTWIRE_{}", key.replace('.', "__").to_uppercase())
}
