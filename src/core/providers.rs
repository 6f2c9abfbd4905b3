use crate::core::config::Config;
use std::error::Error;
use std::fmt;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Wire dialect spoken by the upstream provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderMode {
    OpenAi,
    Anthropic,
}

impl ProviderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderMode::OpenAi => "openai",
            ProviderMode::Anthropic => "anthropic",
        }
    }
}

/// Everything needed to call one upstream provider.
#[derive(Clone, Debug)]
pub struct ProviderSession {
    pub mode: ProviderMode,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ProviderSession {
    /// Join `endpoint` onto the base URL without doubling slashes.
    pub fn endpoint(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Attach the provider's authentication headers.
    ///
    /// Anthropic wants `x-api-key` plus a pinned `anthropic-version`;
    /// everything else takes a bearer token.
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.mode {
            ProviderMode::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            ProviderMode::OpenAi => {
                request.header("Authorization", format!("Bearer {}", self.api_key))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResolutionError {
    message: String,
}

impl ProviderResolutionError {
    pub fn missing_authentication() -> Self {
        Self {
            message: "No LLM provider configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY."
                .to_string(),
        }
    }
}

impl fmt::Display for ProviderResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ProviderResolutionError {}

/// Resolve a provider from the process environment.
pub fn resolve_env_session(config: &Config) -> Result<ProviderSession, ProviderResolutionError> {
    resolve_session_with(config, |key| std::env::var(key).ok())
}

/// OpenAI wins when both keys are present; Anthropic is the fallback.
pub fn resolve_session_with<F>(
    config: &Config,
    lookup: F,
) -> Result<ProviderSession, ProviderResolutionError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(api_key) = non_empty("OPENAI_API_KEY") {
        return Ok(ProviderSession {
            mode: ProviderMode::OpenAi,
            api_key,
            base_url: non_empty("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: non_empty("OPENAI_MODEL")
                .or_else(|| config.openai_model.clone())
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });
    }

    if let Some(api_key) = non_empty("ANTHROPIC_API_KEY") {
        return Ok(ProviderSession {
            mode: ProviderMode::Anthropic,
            api_key,
            base_url: non_empty("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
            model: config
                .anthropic_model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
        });
    }

    Err(ProviderResolutionError::missing_authentication())
}
