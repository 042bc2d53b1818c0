//! Configuration types for invoice extraction.
//!
//! Two structs, both built once at startup and passed by reference:
//!
//! * [`ExtractionConfig`] — how the page is rasterised and how the request is
//!   shaped (DPI, pixel cap, password, prompt override, token budget).
//! * [`ServiceBackend`] — which completion service answers the request and
//!   with what credentials. Nothing inside the pipeline reads the environment;
//!   the CLI resolves env vars into these structs before anything runs.

use crate::error::InvoiceError;
use std::fmt;
use std::path::PathBuf;

/// Default Azure deployment name.
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";

/// Default Azure OpenAI REST API version.
pub const DEFAULT_API_VERSION: &str = "2023-12-01-preview";

/// Configuration for rasterising and extracting one invoice.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_invoice::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(300)
///     .max_tokens(2048)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI for page 1. Range: 72–400. Default: 200.
    ///
    /// 200 DPI renders a US Letter page at 1700 × 2200 px, enough for the
    /// model to read line-item tables and small print on a scan.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// Only kicks in for oversized pages; Letter and A4 at 200 DPI stay well
    /// below it.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit path to the pdfium shared library. If None, the system loader
    /// is asked for it.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Maximum tokens the model may generate. Default: 4096.
    pub max_tokens: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 4000,
            password: None,
            pdfium_lib_path: None,
            system_prompt: None,
            max_tokens: 4096,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(InvoiceError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(InvoiceError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(ref p) = c.system_prompt {
            if p.trim().is_empty() {
                return Err(InvoiceError::InvalidConfig(
                    "system prompt override is empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Service backends ─────────────────────────────────────────────────────

/// How the schema is communicated to an Azure OpenAI deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructuredOutputMode {
    /// A single forced function tool whose parameters are the schema; the
    /// payload comes back as the tool call's `arguments`. Works on every API
    /// version that supports tools. (default)
    #[default]
    FunctionCalling,
    /// `response_format: { type: "json_schema" }`; the payload comes back as
    /// the message content. Needs API version 2024-08-01-preview or later.
    JsonSchema,
}

/// Connection settings for an Azure OpenAI chat-completions deployment.
#[derive(Clone)]
pub struct AzureConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    /// Value of the `api-key` header.
    pub api_key: String,
    /// Deployment name. Default: `gpt-4o`.
    pub deployment: String,
    /// REST API version query parameter. Default: `2023-12-01-preview`.
    pub api_version: String,
    /// Structured output mechanism. Default: function calling.
    pub output_mode: StructuredOutputMode,
    /// Skip TLS certificate verification. Default: false.
    pub accept_invalid_certs: bool,
    /// Request timeout in seconds. Default: 60.
    pub timeout_secs: u64,
}

impl AzureConfig {
    /// Settings with the default deployment, API version and timeout.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            deployment: DEFAULT_DEPLOYMENT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            output_mode: StructuredOutputMode::default(),
            accept_invalid_certs: false,
            timeout_secs: 60,
        }
    }

    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = deployment.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_output_mode(mut self, mode: StructuredOutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_accept_invalid_certs(mut self, v: bool) -> Self {
        self.accept_invalid_certs = v;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Full chat-completions URL for this deployment.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }

    /// Check that every required field is usable.
    pub fn validate(&self) -> Result<(), InvoiceError> {
        if self.endpoint.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "Azure endpoint is empty; set AZURE_OPENAI_ENDPOINT".into(),
            ));
        }
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(InvoiceError::InvalidConfig(format!(
                "Azure endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "Azure API key is empty; set AZURE_OPENAI_API_KEY".into(),
            ));
        }
        if self.deployment.trim().is_empty() || self.api_version.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "Azure deployment and API version must not be empty".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig("timeout must be ≥ 1s".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("output_mode", &self.output_mode)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Which completion service answers the extraction request.
#[derive(Debug, Clone)]
pub enum ServiceBackend {
    /// Azure OpenAI deployment called directly over HTTPS.
    Azure(AzureConfig),
    /// Any edgequake-llm provider. With both fields `None` the provider is
    /// auto-detected from API-key environment variables at construction time.
    Provider {
        provider_name: Option<String>,
        model: Option<String>,
    },
}
