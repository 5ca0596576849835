//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

const GOOGLE_TRANSLATE_BASE_URL: &str = "https://translate.google.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Longest text the Google Translate endpoint accepts per request
const GOOGLE_CHUNK_CHARS: usize = 100;

/// Turns answer text into provider-native compressed audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize text to speech
    ///
    /// Returns the provider's own encoding (MP3 or WAV), fully in memory.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>>;

    /// Short provider name for logs and readiness checks
    fn name(&self) -> &'static str;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    GoogleTranslate,
    OpenAI,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    voice: String,
    model: String,
    base_url: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using the Google Translate voice
    ///
    /// Needs no key; returns MP3.
    #[must_use]
    pub fn new_google() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: None,
            voice: String::new(),
            model: String::new(),
            base_url: GOOGLE_TRANSLATE_BASE_URL.to_string(),
            provider: TtsProvider::GoogleTranslate,
        }
    }

    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: SecretString, voice: String, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key),
            voice,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
            provider: TtsProvider::OpenAI,
        })
    }

    /// Point the provider at a different host (proxies, tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Synthesize using the Google Translate voice, one request per chunk
    ///
    /// MP3 frames are self-delimiting, so the chunk responses concatenate
    /// into one playable stream.
    async fn synthesize_google(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        let chunks = split_for_google(text);
        let total = chunks.len();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx_param = idx.to_string();
            let total_param = total.to_string();
            let textlen = chunk.chars().count().to_string();

            let response = self
                .client
                .get(format!("{}/translate_tts", self.base_url))
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", language),
                    ("q", chunk.as_str()),
                    ("idx", idx_param.as_str()),
                    ("total", total_param.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .map_err(|e| Error::Tts(format!("Google TTS request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::Tts(format!("Google TTS read failed: {e}")))?;
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("OpenAI API key required for TTS".to_string()))?;

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("OpenAI TTS request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("OpenAI TTS read failed: {e}")))?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        let audio = match self.provider {
            TtsProvider::GoogleTranslate => self.synthesize_google(text, language).await?,
            // The OpenAI voices follow the language of the input text
            TtsProvider::OpenAI => self.synthesize_openai(text).await?,
        };

        if audio.is_empty() {
            return Err(Error::Tts(format!("{} returned no audio", self.name())));
        }

        tracing::debug!(provider = self.name(), bytes = audio.len(), "speech synthesized");
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        match self.provider {
            TtsProvider::GoogleTranslate => "google",
            TtsProvider::OpenAI => "openai",
        }
    }
}

/// Split text into whitespace-delimited chunks of at most
/// [`GOOGLE_CHUNK_CHARS`] characters
fn split_for_google(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > GOOGLE_CHUNK_CHARS {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            chunks.extend(
                chars
                    .chunks(GOOGLE_CHUNK_CHARS)
                    .map(|piece| piece.iter().collect::<String>()),
            );
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > GOOGLE_CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_split_short_text_is_one_chunk() {
        assert_eq!(split_for_google("Paris is the capital."), vec!["Paris is the capital."]);
    }

    #[test]
    fn test_split_respects_limit() {
        let text = "word ".repeat(60);
        let chunks = split_for_google(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= GOOGLE_CHUNK_CHARS));
        assert_eq!(chunks.join(" "), text.trim());
    }

    #[test]
    fn test_split_breaks_long_word() {
        let word = "a".repeat(250);
        let chunks = split_for_google(&format!("hi {word} bye"));
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0], "hi");
        assert_eq!(chunks[3].len(), 50);
        assert_eq!(chunks[4], "bye");
    }

    #[test]
    fn test_split_empty_text() {
        assert!(split_for_google("   ").is_empty());
    }

    #[test]
    fn test_openai_requires_key() {
        let result = TextToSpeech::new_openai(String::new().into(), "alloy".into(), "tts-1".into());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_google_concatenates_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .and(query_param("tl", "en"))
            .and(query_param("client", "tw-ob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfb]))
            .expect(2)
            .mount(&server)
            .await;

        let tts = TextToSpeech::new_google().with_base_url(server.uri());
        let text = "word ".repeat(30);
        let audio = tts.synthesize(&text, "en").await.unwrap();
        assert_eq!(audio, vec![0xff, 0xfb, 0xff, 0xfb]);
    }

    #[tokio::test]
    async fn test_google_error_is_synthesis_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let tts = TextToSpeech::new_google().with_base_url(server.uri());
        let err = tts.synthesize("hello", "en").await.unwrap_err();
        assert!(matches!(err, Error::Tts(_)));
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn test_openai_requests_mp3() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .and(body_partial_json(serde_json::json!({
                "input": "hello",
                "voice": "alloy",
                "response_format": "mp3"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .mount(&server)
            .await;

        let tts = TextToSpeech::new_openai("sk-test".to_string().into(), "alloy".into(), "tts-1".into())
            .unwrap()
            .with_base_url(server.uri());
        assert_eq!(tts.synthesize("hello", "en").await.unwrap(), vec![1, 2, 3]);
    }
}
