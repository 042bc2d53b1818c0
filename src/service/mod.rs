//! The vision completion service the extractor talks to.
//!
//! The extractor only needs one thing from a model endpoint: "here is a page
//! image, a system instruction and a schema; give me back JSON". That is the
//! whole [`VisionCompletionService`] trait. Two implementations ship with the
//! crate:
//!
//! * [`azure::AzureOpenAiService`] — direct HTTPS call to an Azure OpenAI
//!   deployment with native structured output (forced tool or JSON schema).
//! * [`provider::LlmProviderService`] — any edgequake-llm provider; the schema
//!   rides in the prompt and the reply text is parsed as JSON.
//!
//! Tests plug in their own implementation of the trait.

pub mod azure;
pub mod provider;

use crate::config::ServiceBackend;
use crate::error::InvoiceError;
use crate::pipeline::encode::EncodedPage;
use crate::schema::SchemaDescriptor;
use async_trait::async_trait;
use std::sync::Arc;

/// Everything needed for one structured extraction call.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub image: EncodedPage,
    pub schema: SchemaDescriptor,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// A vision-capable completion endpoint that answers with schema-shaped JSON.
///
/// Implementations make exactly one outbound call per [`complete`] and do not
/// retry. Transport, auth and HTTP failures map to the ServiceUnavailable
/// family of [`InvoiceError`]; a reply that is not JSON maps to
/// [`InvoiceError::SchemaViolation`].
///
/// [`complete`]: VisionCompletionService::complete
#[async_trait]
pub trait VisionCompletionService: Send + Sync {
    /// Short name for logs, e.g. `"azure:gpt-4o"`.
    fn name(&self) -> &str;

    /// Send the request and return the raw JSON payload.
    async fn complete(&self, request: &StructuredRequest) -> Result<serde_json::Value, InvoiceError>;
}

/// Construct the service described by `backend`.
pub fn build_service(backend: &ServiceBackend) -> Result<Arc<dyn VisionCompletionService>, InvoiceError> {
    match backend {
        ServiceBackend::Azure(cfg) => Ok(Arc::new(azure::AzureOpenAiService::new(cfg.clone())?)),
        ServiceBackend::Provider {
            provider_name,
            model,
        } => Ok(Arc::new(provider::LlmProviderService::resolve(
            provider_name.as_deref(),
            model.as_deref(),
        )?)),
    }
}
