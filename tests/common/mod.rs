//! Scripted chat providers shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use omnicron::providers::{ChatProvider, Completion, ProviderError};
use omnicron::router::DispatchRequest;

/// What a stub does for a given model.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(&'static str),
    Chunks(Vec<&'static str>),
    /// Emits the chunks, then fails mid-stream.
    BrokenStream(Vec<&'static str>),
    Fail,
}

type Script = Box<dyn Fn(Option<&str>) -> Reply + Send + Sync>;

/// A provider whose reply depends only on the requested model.
/// Every attempt is recorded as `(provider, model)` in the shared call log.
pub struct StubProvider {
    name: String,
    script: Script,
    calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl StubProvider {
    pub fn new(
        name: &str,
        calls: &Arc<Mutex<Vec<(String, Option<String>)>>>,
        script: impl Fn(Option<&str>) -> Reply + Send + Sync + 'static,
    ) -> Arc<dyn ChatProvider> {
        Arc::new(Self {
            name: name.to_string(),
            script: Box::new(script),
            calls: calls.clone(),
        })
    }

    pub fn always(
        name: &str,
        calls: &Arc<Mutex<Vec<(String, Option<String>)>>>,
        reply: Reply,
    ) -> Arc<dyn ChatProvider> {
        Self::new(name, calls, move |_| reply.clone())
    }
}

#[async_trait]
impl ChatProvider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, request: &DispatchRequest<'_>) -> Result<Completion, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((self.name.clone(), request.model.map(str::to_string)));

        let failure = || ProviderError::Status {
            provider: self.name.clone(),
            status: 503,
            body: "unavailable".to_string(),
        };

        match (self.script)(request.model) {
            Reply::Text(text) => Ok(Completion::Text(text.to_string())),
            Reply::Chunks(chunks) => Ok(Completion::Stream(
                stream::iter(chunks.into_iter().map(|c| Ok(c.to_string()))).boxed(),
            )),
            Reply::BrokenStream(chunks) => {
                let mut items: Vec<Result<String, ProviderError>> =
                    chunks.into_iter().map(|c| Ok(c.to_string())).collect();
                items.push(Err(ProviderError::Stream {
                    provider: self.name.clone(),
                    message: "connection reset".to_string(),
                }));
                Ok(Completion::Stream(stream::iter(items).boxed()))
            }
            Reply::Fail => Err(failure()),
        }
    }
}

pub fn call_log() -> Arc<Mutex<Vec<(String, Option<String>)>>> {
    Arc::new(Mutex::new(Vec::new()))
}
