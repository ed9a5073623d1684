use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application status code the outputs endpoint uses for success.
pub const STATUS_SUCCESS: u32 = 10000;

/// The best available status attached to a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Status code reported by the backend inside the response body
    Application(u32),
    /// HTTP status, used when the body carries no application status
    Http(u16),
    /// No status at all: the request never produced a response
    Network,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Application(code) => write!(f, "{}", code),
            ErrorCode::Http(status) => write!(f, "{}", status),
            ErrorCode::Network => f.write_str("network error"),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Clarifai Personal Access Token (PAT) is not configured.")]
    MissingCredential,

    #[error("Clarifai Model ID is not configured.")]
    MissingModel,

    #[error(
        "Invalid Clarifai Model ID format: {0}. Expected format: user_id/app_id/models/model_name."
    )]
    InvalidModelId(String),

    #[error("Invalid Clarifai API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Clarifai API error ({code}): {description}")]
    Api { code: ErrorCode, description: String },

    #[error("Could not decode Clarifai response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn api<S: Into<String>>(code: ErrorCode, description: S) -> Self {
        ProviderError::Api {
            code,
            description: description.into(),
        }
    }

    /// Configuration errors are raised before any network activity
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ProviderError::MissingCredential
                | ProviderError::MissingModel
                | ProviderError::InvalidModelId(_)
                | ProviderError::InvalidBaseUrl(_)
        )
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::Application(21200).to_string(), "21200");
        assert_eq!(ErrorCode::Http(503).to_string(), "503");
        assert_eq!(ErrorCode::Network.to_string(), "network error");
    }

    #[test]
    fn test_api_error_message() {
        let err = ProviderError::api(ErrorCode::Application(11102), "Invalid request");
        assert_eq!(
            err.to_string(),
            "Clarifai API error (11102): Invalid request"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_errors() {
        let err = ProviderError::InvalidModelId("foo/bar".to_string());
        assert!(err.is_configuration());
        assert!(err.to_string().contains("foo/bar"));
        assert!(ProviderError::MissingCredential.is_configuration());
        assert!(ProviderError::MissingModel.is_configuration());
    }
}
