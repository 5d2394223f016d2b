//! Generation oracle trait, prompt template, and response normalization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Marker that ends every prompt and precedes the answer.
pub const ANSWER_MARKER: &str = "Answer:";

/// Fixed instructions placed ahead of the context in every prompt.
pub const INSTRUCTIONS: &str = "You are a financial analyst assistant for CrediTrust. \
Your task is to answer questions about customer complaints. \
Use ONLY the following retrieved complaint excerpts to formulate your answer. \
If the context does not contain the answer, say you don't have enough information.";

/// Generation parameters sent with each prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Maximum number of tokens to generate.
    pub max_new_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { max_new_tokens: 256 }
    }
}

/// A text-generation backend.
///
/// The backend returns its raw response; [`normalize_response`] turns any of
/// the shapes hosted endpoints produce into plain text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A short name for logs and error messages.
    fn name(&self) -> &str;

    /// Complete `prompt`.
    ///
    /// Transport failures should be reported as
    /// [`RagError::GenerationError`](crate::RagError::GenerationError).
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<Value>;
}

/// Lay out the instructions, the `Context:` section, the `Question:` line,
/// and a trailing [`ANSWER_MARKER`] for the model to continue from.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("{INSTRUCTIONS}\n\nContext:\n{context}\n\nQuestion: {question}\n{ANSWER_MARKER}")
}

/// Fold a raw generation response into text.
///
/// - a string is returned as-is
/// - a sequence yields its first element's `generated_text`
/// - a mapping yields its `generated_text`
///
/// Anything else, including a sequence or mapping without a string
/// `generated_text`, becomes its JSON representation.
pub fn normalize_response(response: &Value) -> String {
    match response {
        Value::String(text) => text.clone(),
        Value::Array(items) => match items.first() {
            Some(Value::String(text)) => text.clone(),
            Some(first) => generated_text(first).unwrap_or_else(|| response.to_string()),
            None => response.to_string(),
        },
        Value::Object(_) => generated_text(response).unwrap_or_else(|| response.to_string()),
        other => other.to_string(),
    }
}

fn generated_text(value: &Value) -> Option<String> {
    value.get("generated_text").and_then(Value::as_str).map(str::to_string)
}

/// Strip an echoed prompt: keep only the text after the last
/// [`ANSWER_MARKER`], trimmed.
pub fn extract_answer(generated: &str) -> String {
    match generated.rfind(ANSWER_MARKER) {
        Some(position) => generated[position + ANSWER_MARKER.len()..].trim().to_string(),
        None => generated.trim().to_string(),
    }
}
