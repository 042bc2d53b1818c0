//! edgequake-llm backend: any vision provider the factory can build.
//!
//! These providers have no portable structured-output switch, so the schema
//! is appended to the system prompt and the reply text is parsed as JSON
//! after stripping a surrounding code fence if the model added one.

use super::{StructuredRequest, VisionCompletionService};
use crate::error::InvoiceError;
use crate::prompts::schema_instruction;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Default model when a provider is named without one.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Adapter from an edgequake-llm provider to [`VisionCompletionService`].
pub struct LlmProviderService {
    provider: Arc<dyn LLMProvider>,
    name: String,
}

impl LlmProviderService {
    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
        }
    }

    /// Resolve a provider, from most-specific to least-specific:
    ///
    /// 1. **Named provider** — `ProviderFactory::create_llm_provider(name, model)`,
    ///    which reads that provider's API key.
    /// 2. **Auto-detection** — `ProviderFactory::from_env()` picks the first
    ///    provider with an API key present.
    ///
    /// Called once at startup; the extraction path never resolves providers.
    pub fn resolve(provider_name: Option<&str>, model: Option<&str>) -> Result<Self, InvoiceError> {
        if let Some(name) = provider_name {
            let model = model.unwrap_or(DEFAULT_PROVIDER_MODEL);
            let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
                InvoiceError::ProviderNotConfigured {
                    provider: name.to_string(),
                    hint: format!("{e}"),
                }
            })?;
            return Ok(Self::new(provider, format!("{name}:{model}")));
        }

        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| InvoiceError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or use the Azure backend.\n\
                    Error: {}",
                    e
                ),
            })?;
        Ok(Self::new(provider, "auto"))
    }
}

#[async_trait]
impl VisionCompletionService for LlmProviderService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &StructuredRequest) -> Result<Value, InvoiceError> {
        let start = Instant::now();

        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::system(schema_instruction(&request.schema)),
            ChatMessage::user_with_images(
                request.user_text.as_str(),
                vec![ImageData::new(request.image.base64.clone(), request.image.mime_type.as_str())
                    .with_detail("high")],
            ),
        ];

        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        info!("Calling provider '{}'", self.name);
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| InvoiceError::ServiceUnavailable {
                endpoint: self.name.clone(),
                reason: format!("{e}"),
            })?;

        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        serde_json::from_str(strip_code_fences(&response.content))
            .map_err(|e| InvoiceError::schema(format!("reply is not valid JSON: {e}")))
    }
}

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```\s*$").expect("valid regex"));

/// Remove a single code fence wrapping the whole reply, if present.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    match FENCE_RE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}
