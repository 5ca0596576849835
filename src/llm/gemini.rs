//! Gemini `generateContent` client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::AnswerGenerator;
use crate::{Error, Result};

/// Default Gemini API root
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for short spoken answers
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Client for the Gemini text generation API
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("GEMINI_API_KEY is required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root (proxies, tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl AnswerGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig { max_output_tokens },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                // reqwest errors carry the URL, which carries the key
                let e = e.without_url();
                tracing::error!(error = %e, "Gemini request failed");
                Error::Generation(format!("request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(status = %status, model = %self.model, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Gemini API error");
            return Err(Error::Generation(format!("Gemini API error {status}")));
        }

        let result: GenerateResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            tracing::error!(error = %e, "failed to parse Gemini response");
            Error::Generation(format!("invalid response: {e}"))
        })?;

        let text: String = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(Error::Generation("response contained no text".to_string()));
        }

        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
