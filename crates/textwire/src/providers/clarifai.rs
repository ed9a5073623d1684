use anyhow::Result;
use async_stream::stream;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Dispatch;
use url::Url;

use super::base::{ApiHandler, ApiStream, ModelInfo, ModelSelection};
use super::configs::{ClarifaiProviderConfig, CLARIFAI_FALLBACK_MODEL, CLARIFAI_KNOWN_MODELS};
use super::utils::messages_to_transcript;
use crate::errors::{ErrorCode, ProviderError, ProviderResult, STATUS_SUCCESS};
use crate::models::message::Message;
use crate::parser::grammar::Grammar;
use crate::parser::{OutputParser, ToolUseIds};

/// A model id of the form `<owner>/<app>/models/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPath {
    pub owner: String,
    pub app: String,
    pub name: String,
}

impl ModelPath {
    pub fn parse(model_id: &str) -> ProviderResult<Self> {
        match model_id.split('/').collect::<Vec<_>>()[..] {
            [owner, app, "models", name]
                if !owner.is_empty() && !app.is_empty() && !name.is_empty() =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    app: app.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ProviderError::InvalidModelId(model_id.to_string())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawText {
    #[serde(default)]
    raw: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputData {
    #[serde(default)]
    text: Option<RawText>,
}

#[derive(Debug, Default, Deserialize)]
struct Output {
    #[serde(default)]
    data: Option<OutputData>,
}

/// Body of a reply from the outputs endpoint
#[derive(Debug, Default, Deserialize)]
pub struct OutputsResponse {
    #[serde(default)]
    pub status: Option<ApiStatus>,
    #[serde(default)]
    outputs: Vec<Output>,
}

impl OutputsResponse {
    /// Every non-empty output text, each followed by a newline
    pub fn output_text(&self) -> String {
        self.outputs
            .iter()
            .filter_map(|output| output.data.as_ref()?.text.as_ref()?.raw.as_deref())
            .filter(|raw| !raw.is_empty())
            .map(|raw| format!("{}\n", raw))
            .collect()
    }

    /// The application-level failure reported in a successful HTTP reply, if any
    fn application_error(&self) -> Option<ProviderError> {
        let status = self.status.as_ref()?;
        let code = status.code?;
        if code == STATUS_SUCCESS {
            return None;
        }
        Some(ProviderError::api(
            ErrorCode::Application(code),
            status
                .description
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

pub struct ClarifaiHandler {
    client: Client,
    config: ClarifaiProviderConfig,
    grammar: Grammar,
    tool_use_ids: ToolUseIds,
    dispatch: Dispatch,
}

impl ClarifaiHandler {
    pub fn new(config: ClarifaiProviderConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;
        let grammar = Grammar::for_version(config.grammar);
        let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());

        Ok(Self {
            client,
            config,
            grammar,
            tool_use_ids: ToolUseIds::new(),
            dispatch,
        })
    }

    /// Send this handler's log events to `dispatch` instead of the subscriber that
    /// was current when it was built
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Parse replies with a custom block grammar
    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn config(&self) -> &ClarifaiProviderConfig {
        &self.config
    }

    /// Run `f` with this handler's dispatcher as the default subscriber
    fn log<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    fn credential(&self) -> ProviderResult<&str> {
        self.config
            .pat
            .as_deref()
            .filter(|pat| !pat.is_empty())
            .ok_or(ProviderError::MissingCredential)
    }

    /// Resolve the outputs endpoint for the configured model
    fn endpoint(&self) -> ProviderResult<String> {
        let model_id = self
            .config
            .model_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ProviderError::MissingModel)?;
        let model = ModelPath::parse(model_id)?;

        let host = self.config.host.trim_end_matches('/');
        Url::parse(host).map_err(|_| ProviderError::InvalidBaseUrl(host.to_string()))?;

        let mut url = format!(
            "{}/v2/users/{}/apps/{}/models/{}",
            host,
            urlencoding::encode(&model.owner),
            urlencoding::encode(&model.app),
            urlencoding::encode(&model.name),
        );
        match self.config.model_version_id.as_deref() {
            Some(version) if !version.is_empty() && version != "latest" => {
                url.push_str("/versions/");
                url.push_str(&urlencoding::encode(version));
            }
            _ => {}
        }
        url.push_str("/outputs");
        Ok(url)
    }

    fn payload(&self, transcript: String) -> Value {
        json!({
            "inputs": [{ "data": { "text": { "raw": transcript } } }],
            "model": {
                "model_version": {
                    "output_info": {
                        "params": {
                            "temperature": self.config.temperature,
                            "max_tokens": self.config.max_tokens,
                            "top_k": self.config.top_k,
                        }
                    }
                }
            }
        })
    }

    async fn post(&self, url: &str, pat: &str, payload: &Value) -> ProviderResult<OutputsResponse> {
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Key {}", pat))
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        self.log(|| tracing::debug!(status = %status, bytes = body.len(), "Clarifai response received"));

        // Only 200 carries outputs; other 2xx codes are failures too
        if status != StatusCode::OK {
            let parsed: OutputsResponse = serde_json::from_str(&body).unwrap_or_default();
            let app_status = parsed
                .status
                .filter(|app_status| app_status.code != Some(STATUS_SUCCESS))
                .unwrap_or_default();
            let code = app_status
                .code
                .map(ErrorCode::Application)
                .unwrap_or(ErrorCode::Http(status.as_u16()));
            let description = app_status
                .description
                .filter(|description| !description.is_empty())
                .or_else(|| Some(body.trim().to_string()).filter(|body| !body.is_empty()))
                .or_else(|| status.canonical_reason().map(String::from))
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(ProviderError::api(code, description));
        }

        let parsed: OutputsResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;
        match parsed.application_error() {
            Some(err) => Err(err),
            None => Ok(parsed),
        }
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    let code = err
        .status()
        .map(|status| ErrorCode::Http(status.as_u16()))
        .unwrap_or(ErrorCode::Network);
    ProviderError::api(code, err.to_string())
}

#[async_trait]
impl ApiHandler for ClarifaiHandler {
    fn stream<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [Message],
        cancel: CancellationToken,
    ) -> ProviderResult<ApiStream<'a>> {
        let pat = self.credential()?;
        let url = self.endpoint()?;
        let payload = self.payload(messages_to_transcript(system, messages));
        self.log(|| tracing::info!(url = %url, messages = messages.len(), "sending Clarifai request"));

        Ok(Box::pin(stream! {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.post(&url, pat, &payload) => Some(result),
            };
            let Some(result) = outcome else {
                self.log(|| tracing::info!("Clarifai request cancelled"));
                return;
            };

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    self.log(|| tracing::error!(error = %err, "Clarifai request failed"));
                    yield Err(err);
                    return;
                }
            };

            let output_text = response.output_text();
            if output_text.is_empty() {
                self.log(|| tracing::warn!("Clarifai response was successful but contained no text output"));
                return;
            }
            self.log(|| tracing::debug!(chars = output_text.len(), "parsing Clarifai output"));

            let parser = OutputParser::new(&self.grammar, &self.tool_use_ids);
            let mut chunks = parser.parse(&output_text);
            while let Some(chunk) = self.log(|| chunks.next()) {
                if cancel.is_cancelled() {
                    self.log(|| tracing::info!("Clarifai stream cancelled"));
                    return;
                }
                yield Ok(chunk);
            }
        }))
    }

    fn get_model(&self) -> ModelSelection {
        let id = self
            .config
            .model_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| CLARIFAI_FALLBACK_MODEL.to_string());

        ModelSelection {
            id,
            info: ModelInfo {
                supports_prompt_cache: false,
                max_tokens: Some(self.config.max_tokens),
                ..Default::default()
            },
        }
    }

    async fn list_models(&self) -> ProviderResult<Vec<String>> {
        if self.credential().is_err() {
            self.log(|| tracing::warn!("Cannot list Clarifai models without a PAT"));
            return Ok(Vec::new());
        }

        if self.config.models.is_empty() {
            Ok(CLARIFAI_KNOWN_MODELS.iter().map(|m| m.to_string()).collect())
        } else {
            Ok(self.config.models.clone())
        }
    }
}
