use async_stream::stream;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::errors::ProviderResult;
use crate::models::chunk::ApiStreamChunk;
use crate::models::message::Message;
use crate::providers::base::{ApiHandler, ApiStream, ModelInfo, ModelSelection};

/// A mock handler that replays pre-configured chunk lists, one list per call
pub struct MockHandler {
    responses: Arc<Mutex<Vec<Vec<ProviderResult<ApiStreamChunk>>>>>,
    requests: Arc<Mutex<Vec<(String, Vec<Message>)>>>,
    model: ModelSelection,
}

impl MockHandler {
    /// Create a new mock handler with a sequence of replies
    pub fn new(responses: Vec<Vec<ApiStreamChunk>>) -> Self {
        Self::with_results(
            responses
                .into_iter()
                .map(|chunks| chunks.into_iter().map(Ok).collect())
                .collect(),
        )
    }

    /// Like `new`, but replies may contain errors
    pub fn with_results(responses: Vec<Vec<ProviderResult<ApiStreamChunk>>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
            model: ModelSelection {
                id: "mock".to_string(),
                info: ModelInfo::default(),
            },
        }
    }

    /// Every `(system, messages)` pair this handler was called with
    pub fn requests(&self) -> Vec<(String, Vec<Message>)> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ApiHandler for MockHandler {
    fn stream<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [Message],
        cancel: CancellationToken,
    ) -> ProviderResult<ApiStream<'a>> {
        lock(&self.requests).push((system.to_string(), messages.to_vec()));
        let reply = {
            let mut responses = lock(&self.responses);
            // Empty reply once the script runs out
            if responses.is_empty() {
                Vec::new()
            } else {
                responses.remove(0)
            }
        };

        Ok(Box::pin(stream! {
            for item in reply {
                if cancel.is_cancelled() {
                    return;
                }
                yield item;
            }
        }))
    }

    fn get_model(&self) -> ModelSelection {
        self.model.clone()
    }

    async fn list_models(&self) -> ProviderResult<Vec<String>> {
        Ok(vec![self.model.id.clone()])
    }
}
