//! Ordered groups of interchangeable providers.

use futures::TryStreamExt;
use rand::seq::SliceRandom;
use std::sync::Arc;

use super::types::{ChatResult, DispatchRequest};
use crate::error::{Error, Result};
use crate::providers::{ChatProvider, Completion, ProviderError};

/// Providers considered interchangeable for one request class.
///
/// The configured order is fixed; shuffling permutes a per-request copy.
#[derive(Clone, Default)]
pub struct ProviderGroup {
    providers: Vec<Arc<dyn ChatProvider>>,
}

impl std::fmt::Debug for ProviderGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ProviderGroup {
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>) -> Self {
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in configured order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }

    fn ordered(&self, shuffle: bool) -> Vec<Arc<dyn ChatProvider>> {
        let mut order = self.providers.clone();
        if shuffle {
            order.shuffle(&mut rand::thread_rng());
        }
        order
    }

    /// Try each provider in turn and return the first success with its name.
    ///
    /// Individual failures are logged and skipped; once every member has
    /// failed the result is [`Error::ProviderExhausted`].
    pub async fn dispatch(
        &self,
        request: &DispatchRequest<'_>,
        shuffle: bool,
    ) -> Result<(String, ChatResult)> {
        let order = self.ordered(shuffle);
        let mut attempts = 0;

        for provider in order {
            attempts += 1;
            match attempt_once(provider.as_ref(), request).await {
                Ok(result) => {
                    tracing::info!(
                        provider = %provider.name(),
                        attempt = attempts,
                        "Provider answered"
                    );
                    return Ok((provider.name().to_string(), result));
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider.name(),
                        model = ?request.model,
                        error = %e,
                        "Provider failed, trying next"
                    );
                }
            }
        }

        Err(Error::ProviderExhausted { attempts })
    }
}

/// One provider attempt, with streamed output drained into an ordered result.
pub async fn attempt_once(
    provider: &dyn ChatProvider,
    request: &DispatchRequest<'_>,
) -> std::result::Result<ChatResult, ProviderError> {
    let completion = provider.attempt(request).await?;
    collect(completion, request.stream).await
}

/// Normalize a completion to the shape the caller asked for.
///
/// A streaming request always yields `Chunks`, a non-streaming one `Complete`,
/// whatever the provider actually produced.
pub async fn collect(
    completion: Completion,
    stream: bool,
) -> std::result::Result<ChatResult, ProviderError> {
    match (completion, stream) {
        (Completion::Text(text), false) => Ok(ChatResult::Complete(text)),
        (Completion::Text(text), true) => Ok(ChatResult::Chunks(vec![text])),
        (Completion::Stream(chunks), true) => {
            Ok(ChatResult::Chunks(chunks.try_collect().await?))
        }
        (Completion::Stream(chunks), false) => {
            let parts: Vec<String> = chunks.try_collect().await?;
            Ok(ChatResult::Complete(parts.concat()))
        }
    }
}
