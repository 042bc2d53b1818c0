//! Azure OpenAI chat-completions backend.
//!
//! One POST to `{endpoint}/openai/deployments/{deployment}/chat/completions`
//! with the `api-key` header. The page travels as an `image_url` content part
//! holding a base64 data URI; the schema travels either as a single forced
//! function tool or as a `response_format` JSON schema, depending on
//! [`StructuredOutputMode`].

use super::provider::strip_code_fences;
use super::{StructuredRequest, VisionCompletionService};
use crate::config::{AzureConfig, StructuredOutputMode};
use crate::error::InvoiceError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Direct client for one Azure OpenAI deployment.
pub struct AzureOpenAiService {
    client: Client,
    config: AzureConfig,
    name: String,
}

impl AzureOpenAiService {
    /// Validate `config` and build the HTTP client.
    pub fn new(config: AzureConfig) -> Result<Self, InvoiceError> {
        config.validate()?;

        if config.accept_invalid_certs {
            warn!(
                "TLS certificate verification is disabled for {}",
                config.endpoint
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| InvoiceError::InvalidConfig(format!("HTTP client: {e}")))?;

        let name = format!("azure:{}", config.deployment);
        Ok(Self {
            client,
            config,
            name,
        })
    }

    /// JSON body for a chat-completions call.
    pub fn request_body(&self, request: &StructuredRequest) -> Value {
        let mut body = json!({
            "messages": [
                { "role": "system", "content": request.system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": request.user_text },
                        {
                            "type": "image_url",
                            "image_url": { "url": request.image.data_uri(), "detail": "high" }
                        }
                    ]
                }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let schema = &request.schema;
        match self.config.output_mode {
            StructuredOutputMode::FunctionCalling => {
                body["tools"] = json!([{
                    "type": "function",
                    "function": {
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.parameters,
                    }
                }]);
                body["tool_choice"] = json!({
                    "type": "function",
                    "function": { "name": schema.name }
                });
            }
            StructuredOutputMode::JsonSchema => {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": schema.name,
                        "description": schema.description,
                        "schema": schema.parameters,
                        "strict": false,
                    }
                });
            }
        }

        body
    }

    fn unavailable(&self, reason: impl Into<String>) -> InvoiceError {
        InvoiceError::ServiceUnavailable {
            endpoint: self.config.endpoint.clone(),
            reason: reason.into(),
        }
    }

    /// Pull the schema payload out of a chat-completions envelope.
    fn extract_payload(&self, envelope: ChatResponse, schema_name: &str) -> Result<Value, InvoiceError> {
        let choice = envelope
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InvoiceError::schema("completion contained no choices"))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(InvoiceError::schema(
                "completion was blocked by the content filter",
            ));
        }

        let message = choice.message;
        let tool_calls = message.tool_calls.unwrap_or_default();

        let text = match self.config.output_mode {
            StructuredOutputMode::FunctionCalling if !tool_calls.is_empty() => {
                let call = tool_calls
                    .iter()
                    .find(|c| c.function.name == schema_name)
                    .or_else(|| tool_calls.first())
                    .ok_or_else(|| InvoiceError::schema("completion contained no tool call"))?;
                call.function.arguments.clone()
            }
            // Some deployments ignore `tool_choice` and answer in the content.
            _ => message
                .content
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| InvoiceError::schema("completion contained neither a tool call nor content"))?,
        };

        serde_json::from_str(strip_code_fences(&text))
            .map_err(|e| InvoiceError::schema(format!("reply is not valid JSON: {e}")))
    }
}

#[async_trait]
impl VisionCompletionService for AzureOpenAiService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &StructuredRequest) -> Result<Value, InvoiceError> {
        let start = Instant::now();
        let url = self.config.completions_url();
        let body = self.request_body(request);

        info!(
            "Calling Azure deployment '{}' (api-version {}, {:?})",
            self.config.deployment, self.config.api_version, self.config.output_mode
        );

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvoiceError::ServiceTimeout {
                        endpoint: self.config.endpoint.clone(),
                        secs: self.config.timeout_secs,
                    }
                } else {
                    self.unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.unavailable(format!("failed to read response body: {e}")))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(InvoiceError::AuthError {
                endpoint: self.config.endpoint.clone(),
                detail: format!("HTTP {}: {}", status.as_u16(), truncate(&text, 300)),
            });
        }
        if !status.is_success() {
            return Err(InvoiceError::ServiceRejected {
                status: status.as_u16(),
                body: truncate(&text, 500),
            });
        }

        let envelope: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| InvoiceError::schema(format!("malformed completion envelope: {e}")))?;

        if let Some(ref usage) = envelope.usage {
            debug!(
                "{} input tokens, {} output tokens, {:?}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                start.elapsed()
            );
        }

        self.extract_payload(envelope, &request.schema.name)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let cut = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    format!("{}…", &s[..cut])
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}
