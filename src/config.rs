//! Configuration parsing and validation for omnicron.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::path::Path;

/// Environment variable consulted when `server.api_key` is absent.
pub const GATEWAY_KEY_ENV: &str = "MY_API_KEY";

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub providers: Vec<ProviderConfig>,
    pub image_provider: Option<ProviderConfig>,
    pub songs: Option<ServiceConfig>,
    pub ocr: Option<ServiceConfig>,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen: String,
    /// Shared secret every caller must present in the `Api-Key` header
    pub api_key: ApiKey,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How a secret was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was auto-discovered from convention env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// The two allow-listed models and the fallback direction between them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelsConfig {
    /// Model retried with `weak` when it fails
    #[serde(default = "default_strong_model")]
    pub strong: String,
    #[serde(default = "default_weak_model")]
    pub weak: String,
    /// Whether a failed `strong` request is retried once with `weak`
    #[serde(default = "default_true")]
    pub fallback: bool,
}

fn default_strong_model() -> String {
    "gpt-4".to_string()
}

fn default_weak_model() -> String {
    "gpt-3.5-turbo".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            strong: default_strong_model(),
            weak: default_weak_model(),
            fallback: true,
        }
    }
}

/// Chat provider configuration (OpenAI-compatible endpoint).
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Unique name for this provider
    pub name: String,
    /// Base URL for the provider's API (e.g., "https://api.example.com/v1")
    pub url: String,
    /// Optional bearer token
    pub api_key: Option<ApiKey>,
    /// Model sent upstream when the caller did not ask for one
    pub default_model: Option<String>,
}

/// External HTTP service (song recognition, OCR).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

fn default_service_timeout() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for '{owner}': {message}")]
    EnvVar {
        var: String,
        owner: String,
        message: String,
    },
}

/// Raw server section; the secret may still hold `${VAR}` references.
#[derive(Deserialize)]
pub struct RawServerConfig {
    #[serde(default = "default_listen")]
    listen: String,
    api_key: Option<String>,
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            api_key: None,
        }
    }
}

/// Raw provider config deserialized directly from TOML.
#[derive(Deserialize)]
pub struct RawProviderConfig {
    name: String,
    url: String,
    api_key: Option<String>,
    default_model: Option<String>,
}

/// Raw external service section.
#[derive(Deserialize)]
pub struct RawServiceConfig {
    url: String,
    #[serde(default = "default_service_timeout")]
    timeout_secs: u64,
}

/// Raw configuration deserialized directly from TOML.
/// Secrets and URLs may contain `${VAR}` references not yet expanded.
#[derive(Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    server: RawServerConfig,
    #[serde(default)]
    models: ModelsConfig,
    #[serde(default)]
    providers: Vec<RawProviderConfig>,
    image_provider: Option<RawProviderConfig>,
    songs: Option<RawServiceConfig>,
    ocr: Option<RawServiceConfig>,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}/v1`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, owner: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            owner: owner.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                owner: owner.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            owner: owner.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced in '{}')",
                var_name, owner
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Derive the convention-based env var name for a provider.
///
/// - "blackbox" -> "OMNICRON_BLACKBOX_API_KEY"
/// - "gemini-pro" -> "OMNICRON_GEMINI_PRO_API_KEY"
pub fn convention_env_var_name(provider_name: &str) -> String {
    let upper_snake = provider_name.to_uppercase().replace(['-', ' '], "_");
    format!("OMNICRON_{}_API_KEY", upper_snake)
}

/// Resolve an optional raw secret: expand `${VAR}`, keep literals, or fall back
/// to the given convention variable.
fn resolve_key<F>(
    raw_key: Option<&str>,
    owner: &str,
    convention_var: &str,
    lookup: &F,
) -> Result<(Option<ApiKey>, KeySource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let resolved = match raw_key {
        Some(raw) if raw.contains("${") => {
            let expanded = expand_env_vars_with(raw, owner, lookup)?;
            (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
        }
        Some(raw) => (Some(ApiKey::from(raw)), KeySource::Literal),
        None => match lookup(convention_var) {
            Some(value) => (
                Some(ApiKey::from(value)),
                KeySource::Convention(convention_var.to_string()),
            ),
            None => (None, KeySource::None),
        },
    };
    Ok(resolved)
}

fn provider_from_raw<F>(
    raw: RawProviderConfig,
    lookup: &F,
) -> Result<(ProviderConfig, KeySource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (api_key, source) = resolve_key(
        raw.api_key.as_deref(),
        &raw.name,
        &convention_env_var_name(&raw.name),
        lookup,
    )?;
    let url = expand_env_vars_with(&raw.url, &raw.name, lookup)?;

    Ok((
        ProviderConfig {
            name: raw.name,
            url,
            api_key,
            default_model: raw.default_model,
        },
        source,
    ))
}

fn service_from_raw<F>(
    raw: Option<RawServiceConfig>,
    owner: &str,
    lookup: &F,
) -> Result<Option<ServiceConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    raw.map(|raw| {
        Ok(ServiceConfig {
            url: expand_env_vars_with(&raw.url, owner, lookup)?,
            timeout_secs: raw.timeout_secs,
        })
    })
    .transpose()
}

impl Config {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.api_key.expose_secret().is_empty() {
            return Err(ConfigError::Validation(
                "Gateway API key must not be empty".to_string(),
            ));
        }

        if self.models.strong.is_empty() || self.models.weak.is_empty() {
            return Err(ConfigError::Validation(
                "Model names in [models] must not be empty".to_string(),
            ));
        }

        if self.models.strong == self.models.weak {
            return Err(ConfigError::Validation(format!(
                "[models] strong and weak must differ (both are '{}')",
                self.models.strong
            )));
        }

        if self.providers.is_empty() {
            tracing::warn!("No providers configured - text chat requests will fail");
        }

        let mut seen = HashSet::new();
        for provider in self.providers.iter().chain(self.image_provider.iter()) {
            if provider.url.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty URL",
                    provider.name
                )));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate provider name '{}'",
                    provider.name
                )));
            }
        }

        for (section, service) in [("songs", &self.songs), ("ocr", &self.ocr)] {
            if let Some(service) = service {
                if service.url.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "[{}] has empty URL",
                        section
                    )));
                }
            }
        }

        Ok(())
    }

    /// Convert raw (deserialized) config to final config using real environment variables.
    pub fn from_raw(raw: RawConfig) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        Self::from_raw_with(raw, |name| std::env::var(name).ok())
    }

    /// Convert raw config to final config with env var expansion through `lookup`.
    ///
    /// For each secret:
    /// - If it contains `${VAR}`: expand, source = `EnvExpanded`
    /// - If it is a literal string: wrap directly, source = `Literal`
    /// - If it is absent: try the convention variable, source = `Convention(var_name)`
    ///   or `KeySource::None`
    ///
    /// The gateway secret is reported under the name `"server"` and is required.
    pub fn from_raw_with<F>(
        raw: RawConfig,
        lookup: F,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut key_sources = Vec::with_capacity(raw.providers.len() + 2);

        let (gateway_key, gateway_source) = resolve_key(
            raw.server.api_key.as_deref(),
            "server",
            GATEWAY_KEY_ENV,
            &lookup,
        )?;
        let api_key = gateway_key.ok_or_else(|| {
            ConfigError::Validation(format!(
                "No gateway API key: set server.api_key or {}",
                GATEWAY_KEY_ENV
            ))
        })?;
        key_sources.push(("server".to_string(), gateway_source));

        let mut providers = Vec::with_capacity(raw.providers.len());
        for rp in raw.providers {
            let (provider, source) = provider_from_raw(rp, &lookup)?;
            key_sources.push((provider.name.clone(), source));
            providers.push(provider);
        }

        let image_provider = match raw.image_provider {
            Some(rp) => {
                let (provider, source) = provider_from_raw(rp, &lookup)?;
                key_sources.push((provider.name.clone(), source));
                Some(provider)
            }
            None => None,
        };

        let config = Config {
            server: ServerConfig {
                listen: raw.server.listen,
                api_key,
            },
            models: raw.models,
            providers,
            image_provider,
            songs: service_from_raw(raw.songs, "songs", &lookup)?,
            ocr: service_from_raw(raw.ocr, "ocr", &lookup)?,
            logging: raw.logging,
        };

        Ok((config, key_sources))
    }

    /// Load configuration from a TOML file with environment variable expansion.
    ///
    /// Returns the config and per-secret key source information.
    pub fn from_file_with_env(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        let raw: RawConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
        let (config, key_sources) = Self::from_raw(raw)?;
        config.validate()?;

        Ok((config, key_sources))
    }
}
