//! Prompts sent to the vision model.
//!
//! Callers can override the system instruction via
//! [`crate::config::ExtractionConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

use crate::schema::SchemaDescriptor;

/// Default system instruction for invoice extraction.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert extraction algorithm. \
Only extract relevant information from the text. \
If you do not know the value of an attribute asked to extract, return null for the attribute's value.";

/// Text accompanying the page image in the user turn.
pub const USER_INSTRUCTION: &str = "Extract the invoice shown in this image.";

/// Sampling temperature for every extraction call. Pinned so two runs over
/// the same page produce the same record.
pub const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// Extra instruction for backends without native structured output: the
/// schema travels inside the system prompt and the reply must be bare JSON.
pub fn schema_instruction(schema: &SchemaDescriptor) -> String {
    format!(
        "Respond with a single JSON object named {name} that conforms to this JSON Schema. \
Output only the JSON object, with no commentary and no code fences.\n\n{schema}",
        name = schema.name,
        schema = schema.to_pretty_json()
    )
}
