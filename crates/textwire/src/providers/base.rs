use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::ProviderResult;
use crate::models::chunk::ApiStreamChunk;
use crate::models::message::Message;

/// The chunk stream of one request. Errors that happen after the request started
/// (network, backend status) arrive as an `Err` item and end the stream.
pub type ApiStream<'a> = BoxStream<'a, ProviderResult<ApiStreamChunk>>;

/// Capability metadata shown next to a model id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub supports_prompt_cache: bool,
    #[serde(default)]
    pub supports_images: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub id: String,
    pub info: ModelInfo,
}

/// Base trait for backend integrations the agent loop can drive
#[async_trait]
pub trait ApiHandler: Send + Sync {
    /// Start a turn and stream its chunks.
    ///
    /// Configuration problems are returned right away, before any network activity.
    fn stream<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [Message],
        cancel: CancellationToken,
    ) -> ProviderResult<ApiStream<'a>>;

    /// Start a turn that is never cancelled
    fn create_message<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [Message],
    ) -> ProviderResult<ApiStream<'a>> {
        self.stream(system, messages, CancellationToken::new())
    }

    /// The active model id and its metadata. Never touches the network.
    fn get_model(&self) -> ModelSelection;

    /// Model ids this handler can be pointed at
    async fn list_models(&self) -> ProviderResult<Vec<String>> {
        Ok(Vec::new())
    }
}
