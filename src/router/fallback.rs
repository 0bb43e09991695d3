//! Bounded strong-to-weak model fallback.
//!
//! A request that explicitly asks for the strong model gets exactly one
//! more attempt with the weak model if the first dispatch fails. The plan
//! is a two-element list at most, so there is no recursion and the retry
//! count is visible in the type.

use crate::config::ModelsConfig;
use crate::error::{Error, Result};

/// Models to try, in order. Never longer than two.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPlan {
    /// `None` means "provider default".
    pub primary: Option<String>,
    pub fallback: Option<String>,
}

impl ModelPlan {
    /// Build the plan for an already-validated model request.
    pub fn for_request(models: &ModelsConfig, requested: Option<&str>) -> Self {
        let fallback = match requested {
            Some(model) if models.fallback && model == models.strong => Some(models.weak.clone()),
            _ => None,
        };
        Self {
            primary: requested.map(str::to_string),
            fallback,
        }
    }

    fn candidates(&self) -> impl Iterator<Item = Option<String>> + '_ {
        std::iter::once(self.primary.clone()).chain(self.fallback.iter().map(|m| Some(m.clone())))
    }
}

/// Successful outcome plus whether the fallback model produced it.
#[derive(Debug)]
pub struct FallbackOutcome<T> {
    pub value: T,
    pub model: Option<String>,
    pub fell_back: bool,
}

/// Whether a failed dispatch is worth repeating with another model.
///
/// Only provider-side failures qualify; bad input stays bad.
pub fn is_model_failure(error: &Error) -> bool {
    matches!(error, Error::ProviderExhausted { .. } | Error::Upstream(_))
}

/// Run `send` with the primary model, then once with the fallback model if
/// the first attempt failed with a model failure.
///
/// The error surfaced after both attempts fail is the fallback's error.
pub async fn with_model_fallback<T, F, Fut>(plan: &ModelPlan, send: F) -> Result<FallbackOutcome<T>>
where
    F: Fn(Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;

    for (index, model) in plan.candidates().enumerate() {
        if let Some(previous) = &last_error {
            tracing::warn!(
                from = ?plan.primary,
                to = ?model,
                error = %previous,
                "Falling back to weaker model"
            );
        }

        match send(model.clone()).await {
            Ok(value) => {
                return Ok(FallbackOutcome {
                    value,
                    model,
                    fell_back: index > 0,
                });
            }
            Err(err) if is_model_failure(&err) => last_error = Some(err),
            Err(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Internal("model plan was empty".to_string())))
}
