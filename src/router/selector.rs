//! Provider selection logic.

use reqwest::Client;
use std::sync::Arc;

use super::fallback::{with_model_fallback, ModelPlan};
use super::group::{attempt_once, ProviderGroup};
use super::types::{ChatRequest, RouteOutcome};
use crate::config::{Config, ModelsConfig};
use crate::error::{Error, Result};
use crate::providers::{ChatProvider, OpenAiCompatProvider};

/// Router for chat requests.
///
/// Holds the model allow-list, the general provider pool and the optional
/// image-capable provider. Immutable once built.
#[derive(Clone)]
pub struct Router {
    models: ModelsConfig,
    pool: ProviderGroup,
    image_provider: Option<Arc<dyn ChatProvider>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("models", &self.models)
            .field("pool", &self.pool)
            .field("image_provider", &self.image_provider.as_ref().map(|p| p.name()))
            .finish()
    }
}

impl Router {
    /// Create a new router from already-built providers.
    pub fn new(
        models: ModelsConfig,
        pool: Vec<Arc<dyn ChatProvider>>,
        image_provider: Option<Arc<dyn ChatProvider>>,
    ) -> Self {
        Self {
            models,
            pool: ProviderGroup::new(pool),
            image_provider,
        }
    }

    /// Build OpenAI-compatible adapters for every configured provider.
    pub fn from_config(config: &Config, client: &Client) -> Self {
        let weak = config.models.weak.as_str();
        let pool = config
            .providers
            .iter()
            .map(|p| Arc::new(OpenAiCompatProvider::new(p, weak, client.clone())) as Arc<dyn ChatProvider>)
            .collect();
        let image_provider = config.image_provider.as_ref().map(|p| {
            Arc::new(OpenAiCompatProvider::new(p, weak, client.clone())) as Arc<dyn ChatProvider>
        });

        Self::new(config.models.clone(), pool, image_provider)
    }

    /// Reject any model outside the allow-list. `None` is always accepted.
    pub fn validate_model(&self, model: Option<&str>) -> Result<()> {
        match model {
            None => Ok(()),
            Some(m) if m == self.models.strong || m == self.models.weak => Ok(()),
            Some(m) => {
                tracing::warn!(model = %m, "Model not in allow-list");
                Err(Error::InvalidModel {
                    model: m.to_string(),
                    allowed: format!("'{}' or '{}'", self.models.weak, self.models.strong),
                })
            }
        }
    }

    /// Route a chat request: validate, classify, dispatch, fall back once.
    pub async fn route(&self, request: &ChatRequest) -> Result<RouteOutcome> {
        self.validate_model(request.model.as_deref())?;

        if request.messages.is_empty() {
            return Err(Error::BadRequest("messages must not be empty".to_string()));
        }

        let image_provider = match (&request.image, &self.image_provider) {
            (Some(_), Some(provider)) => Some(provider.as_ref()),
            (Some(_), None) => {
                return Err(Error::BadRequest(
                    "image input is not supported: no image provider configured".to_string(),
                ))
            }
            (None, _) => None,
        };

        let plan = ModelPlan::for_request(&self.models, request.model.as_deref());
        tracing::debug!(
            model = ?plan.primary,
            fallback = ?plan.fallback,
            image = image_provider.is_some(),
            stream = request.stream,
            "Routing chat request"
        );

        let outcome = with_model_fallback(&plan, |model| async move {
            let dispatch = request.dispatch(model.as_deref());
            match image_provider {
                Some(provider) => attempt_once(provider, &dispatch)
                    .await
                    .map(|result| (provider.name().to_string(), result))
                    .map_err(|e| Error::Upstream(e.to_string())),
                None => self.pool.dispatch(&dispatch, request.shuffle).await,
            }
        })
        .await?;

        let (provider, result) = outcome.value;
        Ok(RouteOutcome {
            result,
            provider,
            model: outcome.model,
            fell_back: outcome.fell_back,
        })
    }

    /// Names of the general pool in configured order.
    pub fn pool_names(&self) -> Vec<String> {
        self.pool.names().map(str::to_string).collect()
    }

    /// Name of the image-capable provider, if any.
    pub fn image_provider_name(&self) -> Option<&str> {
        self.image_provider.as_ref().map(|p| p.name())
    }
}
