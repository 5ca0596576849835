//! Answer generation through a remote language model

pub mod gemini;

use async_trait::async_trait;

pub use gemini::GeminiClient;

use crate::Result;

/// Output cap for every generation call
///
/// Roughly 25 spoken words, which bounds both upstream latency and the
/// length of the synthesized reply.
pub const MAX_OUTPUT_TOKENS: u32 = 25;

/// Characters used for emphasis markup that have no spoken form
pub const EMPHASIS_MARKERS: &[char] = &['*', '_', '`'];

/// Produces a short text answer for a prompt
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer of at most `max_output_tokens` tokens
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Generation`] if the upstream call fails
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String>;

    /// Model identifier for logs
    fn model(&self) -> &str;
}

/// Remove emphasis markers, leaving every other character untouched
#[must_use]
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| !EMPHASIS_MARKERS.contains(c)).collect()
}
