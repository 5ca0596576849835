//! Speech-to-text (STT) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::audio::{PcmAudio, pcm_to_wav};
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";
const GOOGLE_SPEECH_BASE_URL: &str = "https://www.google.com";

/// Turns client PCM into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio to text
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpeechUnrecognized`] when nothing intelligible was
    /// heard, [`Error::Stt`] when the engine itself failed
    async fn transcribe(&self, audio: &PcmAudio) -> Result<String>;

    /// Short provider name for logs and readiness checks
    fn name(&self) -> &'static str;
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// One line of the Google web speech response stream
#[derive(serde::Deserialize)]
struct GoogleSpeechLine {
    #[serde(default)]
    result: Vec<GoogleSpeechResult>,
}

#[derive(serde::Deserialize)]
struct GoogleSpeechResult {
    #[serde(default)]
    alternative: Vec<GoogleSpeechAlternative>,
}

#[derive(serde::Deserialize)]
struct GoogleSpeechAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
    GoogleWebSpeech,
}

/// Transcribes speech to text over HTTP
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    language: String,
    base_url: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: SecretString, model: String, language: String) -> Result<Self> {
        Self::build(SttProvider::Whisper, api_key, model, language, OPENAI_BASE_URL)
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: SecretString, model: String, language: String) -> Result<Self> {
        Self::build(SttProvider::Deepgram, api_key, model, language, DEEPGRAM_BASE_URL)
    }

    /// Create a new STT instance using the Google web speech endpoint
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_google(api_key: SecretString, language: String) -> Result<Self> {
        Self::build(
            SttProvider::GoogleWebSpeech,
            api_key,
            String::new(),
            language,
            GOOGLE_SPEECH_BASE_URL,
        )
    }

    fn build(
        provider: SttProvider,
        api_key: SecretString,
        model: String,
        language: String,
        base_url: &str,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!(
                "{} API key required for speech recognition",
                provider_name(provider)
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            base_url: base_url.to_string(),
            provider,
        })
    }

    /// Point the provider at a different host (proxies, tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: &PcmAudio) -> Result<String> {
        let wav = pcm_to_wav(audio)?;
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::SttInput(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::Stt(format!("Whisper request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::Stt(format!("invalid Whisper response: {e}"))
        })?;

        Ok(result.text)
    }

    /// Transcribe using Deepgram
    ///
    /// Deepgram takes the raw PCM directly when told its layout.
    async fn transcribe_deepgram(&self, audio: &PcmAudio) -> Result<String> {
        tracing::debug!(audio_bytes = audio.bytes().len(), "starting Deepgram transcription");

        let response = self
            .client
            .post(format!("{}/v1/listen", self.base_url))
            .query(&[
                ("model", self.model.as_str()),
                ("language", self.language.as_str()),
                ("punctuate", "true"),
                ("encoding", "linear16"),
            ])
            .query(&[
                ("sample_rate", audio.sample_rate()),
                ("channels", u32::from(audio.channels())),
            ])
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", "application/octet-stream")
            .body(audio.bytes().to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                Error::Stt(format!("Deepgram request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            Error::Stt(format!("invalid Deepgram response: {e}"))
        })?;

        Ok(result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default())
    }

    /// Transcribe using the Google web speech endpoint
    async fn transcribe_google(&self, audio: &PcmAudio) -> Result<String> {
        tracing::debug!(audio_bytes = audio.bytes().len(), "starting Google speech transcription");

        let response = self
            .client
            .post(format!("{}/speech-api/v2/recognize", self.base_url))
            .query(&[
                ("client", "chromium"),
                ("lang", self.language.as_str()),
                ("key", self.api_key.expose_secret()),
                ("output", "json"),
            ])
            .header(
                "Content-Type",
                format!("audio/l16; rate={}", audio.sample_rate()),
            )
            .body(audio.bytes().to_vec())
            .send()
            .await
            .map_err(|e| {
                // The key travels in the query string
                let e = e.without_url();
                tracing::error!(error = %e, "Google speech request failed");
                Error::Stt(format!("Google speech request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google speech API error");
            return Err(Error::Stt(format!("Google speech API error {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| {
                let e = e.without_url();
                Error::Stt(format!("failed to read Google speech response: {e}"))
            })?;

        parse_google_speech(&body)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &PcmAudio) -> Result<String> {
        if audio.is_empty() {
            return Err(Error::SpeechUnrecognized);
        }

        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await?,
            SttProvider::GoogleWebSpeech => self.transcribe_google(audio).await?,
        };

        let transcript = transcript.trim();
        if transcript.is_empty() {
            tracing::info!(provider = self.name(), "no speech recognized");
            return Err(Error::SpeechUnrecognized);
        }

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript.to_string())
    }

    fn name(&self) -> &'static str {
        provider_name(self.provider)
    }
}

const fn provider_name(provider: SttProvider) -> &'static str {
    match provider {
        SttProvider::Whisper => "whisper",
        SttProvider::Deepgram => "deepgram",
        SttProvider::GoogleWebSpeech => "google",
    }
}

/// Pick the first transcript out of Google's newline-delimited JSON
///
/// The stream opens with an empty `{"result":[]}` line; when nothing else
/// follows, the audio was not understood.
fn parse_google_speech(body: &str) -> Result<String> {
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: GoogleSpeechLine = serde_json::from_str(line)
            .map_err(|e| Error::Stt(format!("invalid Google speech response: {e}")))?;

        if let Some(alt) = parsed
            .result
            .into_iter()
            .flat_map(|r| r.alternative)
            .find(|a| !a.transcript.trim().is_empty())
        {
            return Ok(alt.transcript);
        }
    }

    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key() -> SecretString {
        SecretString::from("test-key".to_string())
    }

    fn speech() -> PcmAudio {
        PcmAudio::client_capture(vec![0x10, 0x00, 0x20, 0x00])
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = SpeechToText::new_deepgram(SecretString::from(String::new()), "nova-2".into(), "en".into());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_google_speech_result() {
        let body = "{\"result\":[]}\n{\"result\":[{\"alternative\":[{\"transcript\":\"what time is it\",\"confidence\":0.9}],\"final\":true}],\"result_index\":0}\n";
        assert_eq!(parse_google_speech(body).unwrap(), "what time is it");
    }

    #[test]
    fn test_parse_google_speech_empty() {
        assert_eq!(parse_google_speech("{\"result\":[]}\n").unwrap(), "");
        assert_eq!(parse_google_speech("").unwrap(), "");
    }

    #[test]
    fn test_parse_google_speech_garbage() {
        assert!(matches!(parse_google_speech("<html>"), Err(Error::Stt(_))));
    }

    #[tokio::test]
    async fn test_empty_audio_skips_engine() {
        let stt = SpeechToText::new_deepgram(key(), "nova-2".into(), "en".into())
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let result = stt.transcribe(&PcmAudio::client_capture(Vec::new())).await;
        assert!(matches!(result, Err(Error::SpeechUnrecognized)));
    }

    #[tokio::test]
    async fn test_deepgram_sends_raw_pcm() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/listen"))
            .and(query_param("encoding", "linear16"))
            .and(query_param("sample_rate", "16000"))
            .and(header("Authorization", "Token test-key"))
            .and(body_bytes(vec![0x10, 0x00, 0x20, 0x00]))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {"channels": [{"alternatives": [{"transcript": " turn on the lights "}]}]}
            })))
            .mount(&server)
            .await;

        let stt = SpeechToText::new_deepgram(key(), "nova-2".into(), "en".into())
            .unwrap()
            .with_base_url(server.uri());
        assert_eq!(stt.transcribe(&speech()).await.unwrap(), "turn on the lights");
    }

    #[tokio::test]
    async fn test_deepgram_empty_transcript_is_unrecognized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {"channels": [{"alternatives": [{"transcript": ""}]}]}
            })))
            .mount(&server)
            .await;

        let stt = SpeechToText::new_deepgram(key(), "nova-2".into(), "en".into())
            .unwrap()
            .with_base_url(server.uri());
        assert!(matches!(
            stt.transcribe(&speech()).await,
            Err(Error::SpeechUnrecognized)
        ));
    }

    #[tokio::test]
    async fn test_whisper_server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let stt = SpeechToText::new_whisper(key(), "whisper-1".into(), "en".into())
            .unwrap()
            .with_base_url(server.uri());
        let err = stt.transcribe(&speech()).await.unwrap_err();
        assert!(matches!(err, Error::Stt(_)));
        assert_eq!(err.status(), 502);
    }

    #[tokio::test]
    async fn test_whisper_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hello there"})),
            )
            .mount(&server)
            .await;

        let stt = SpeechToText::new_whisper(key(), "whisper-1".into(), "en".into())
            .unwrap()
            .with_base_url(server.uri());
        assert_eq!(stt.transcribe(&speech()).await.unwrap(), "hello there");
        assert_eq!(stt.name(), "whisper");
    }

    #[tokio::test]
    async fn test_google_transport_error_hides_key() {
        let stt = SpeechToText::new_google(SecretString::from("SUPERSECRETKEY".to_string()), "en".into())
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = stt.transcribe(&speech()).await.unwrap_err();

        assert!(matches!(err, Error::Stt(_)));
        assert!(!err.to_string().contains("SUPERSECRETKEY"));
    }

    #[tokio::test]
    async fn test_google_no_result_is_unrecognized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speech-api/v2/recognize"))
            .and(header("Content-Type", "audio/l16; rate=16000"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"result\":[]}\n"))
            .mount(&server)
            .await;

        let stt = SpeechToText::new_google(key(), "en-US".into())
            .unwrap()
            .with_base_url(server.uri());
        assert!(matches!(
            stt.transcribe(&speech()).await,
            Err(Error::SpeechUnrecognized)
        ));
    }
}
