//! Inbound request classification

use crate::voice::PcmAudio;
use crate::{Error, Result};

/// Mimetype of the success response body
pub const PCM_MIMETYPE: &str = "audio/L16";

/// What the client declared it is sending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Structured text payload carrying a `prompt`
    Json,
    /// Raw PCM16 mono 16 kHz capture
    RawAudio,
    /// Anything else
    Unsupported,
}

impl ContentKind {
    /// Classify a Content-Type header value
    ///
    /// Parameters (`; charset=utf-8`) and case are ignored.
    #[must_use]
    pub fn from_content_type(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Unsupported;
        };

        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => Self::Json,
            "application/octet-stream" | "audio/l16" => Self::RawAudio,
            _ => Self::Unsupported,
        }
    }
}

/// One request's input, exactly one variant per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundRequest {
    TextPrompt(String),
    RawAudio(PcmAudio),
}

impl InboundRequest {
    /// Build a request from its declared content type and body
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMediaType`] for unknown content types, and
    /// [`Error::InvalidInput`] when a JSON body has no non-empty `prompt`
    pub fn dispatch(content_type: Option<&str>, body: Vec<u8>) -> Result<Self> {
        match ContentKind::from_content_type(content_type) {
            ContentKind::Json => parse_prompt(&body).map(Self::TextPrompt),
            ContentKind::RawAudio => Ok(Self::RawAudio(PcmAudio::client_capture(body))),
            ContentKind::Unsupported => Err(Error::UnsupportedMediaType(
                content_type.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Build a text request from a prompt typed outside HTTP
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the prompt is blank
    pub fn text_prompt(prompt: impl Into<String>) -> Result<Self> {
        non_blank(prompt.into()).map(Self::TextPrompt)
    }
}

fn parse_prompt(body: &[u8]) -> Result<String> {
    // Only a JSON object carries a `prompt` key
    let mut payload: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| Error::InvalidInput(e.to_string()))?;

    match payload.remove("prompt") {
        Some(serde_json::Value::String(prompt)) => non_blank(prompt),
        Some(other) => Err(Error::InvalidInput(format!("prompt is not a string: {other}"))),
        None => Err(Error::InvalidInput("missing prompt".to_string())),
    }
}

fn non_blank(prompt: String) -> Result<String> {
    if prompt.trim().is_empty() {
        return Err(Error::InvalidInput("prompt is empty".to_string()));
    }
    Ok(prompt)
}
