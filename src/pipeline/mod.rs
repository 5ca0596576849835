//! Request pipeline
//!
//! ```text
//! dispatch ─► (transcribe) ─► generate ─► sanitize ─► synthesize ─► normalize
//! ```
//!
//! Stages run strictly in sequence, each one consuming the previous stage's
//! output. Nothing is shared between requests except the engine clients.

mod request;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, SttBackend, TtsBackend};
use crate::error::Stage;
use crate::llm::{self, AnswerGenerator, GeminiClient, MAX_OUTPUT_TOKENS};
use crate::voice::{PcmAudio, SpeechSynthesizer, SpeechToText, SynthesizedAudio, TextToSpeech, Transcriber, audio};
use crate::{Error, Result};

pub use request::{ContentKind, InboundRequest, PCM_MIMETYPE};

/// Per-pipeline settings fixed at startup
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Language for synthesis
    pub language: String,
    pub transcription_timeout: Duration,
    pub generation_timeout: Duration,
    pub synthesis_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            transcription_timeout: Duration::from_secs(15),
            generation_timeout: Duration::from_secs(20),
            synthesis_timeout: Duration::from_secs(20),
        }
    }
}

/// The prompt-to-speech pipeline
pub struct Pipeline {
    transcriber: Option<Arc<dyn Transcriber>>,
    generator: Arc<dyn AnswerGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Create a text-only pipeline
    #[must_use]
    pub fn new(
        generator: Arc<dyn AnswerGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            transcriber: None,
            generator,
            synthesizer,
            settings,
        }
    }

    /// Enable the raw-audio path
    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Build the pipeline and its engine clients from configuration
    ///
    /// # Errors
    ///
    /// Returns error if an engine client cannot be constructed
    pub fn from_config(config: &Config) -> Result<Self> {
        use secrecy::{ExposeSecret, SecretString};

        let copy = |secret: &SecretString| SecretString::from(secret.expose_secret().to_string());

        let generator = GeminiClient::new(copy(&config.gemini.api_key), config.gemini.model.clone())?
            .with_base_url(config.gemini.base_url.clone());

        let mut synthesizer = match &config.tts.backend {
            TtsBackend::Google => TextToSpeech::new_google(),
            TtsBackend::OpenAI {
                api_key,
                model,
                voice,
            } => TextToSpeech::new_openai(copy(api_key), voice.clone(), model.clone())?,
        };
        if let Some(url) = &config.tts.base_url {
            synthesizer = synthesizer.with_base_url(url.clone());
        }

        let settings = PipelineSettings {
            language: config.language.clone(),
            transcription_timeout: config.stt.timeout,
            generation_timeout: config.gemini.timeout,
            synthesis_timeout: config.tts.timeout,
        };

        let mut pipeline = Self::new(Arc::new(generator), Arc::new(synthesizer), settings);

        if let Some(backend) = &config.stt.backend {
            let language = config.language.clone();
            let mut stt = match backend {
                SttBackend::Whisper { api_key, model } => {
                    SpeechToText::new_whisper(copy(api_key), model.clone(), language)?
                }
                SttBackend::Deepgram { api_key, model } => {
                    SpeechToText::new_deepgram(copy(api_key), model.clone(), language)?
                }
                SttBackend::Google { api_key } => SpeechToText::new_google(copy(api_key), language)?,
            };
            if let Some(url) = &config.stt.base_url {
                stt = stt.with_base_url(url.clone());
            }
            pipeline = pipeline.with_transcriber(Arc::new(stt));
        }

        Ok(pipeline)
    }

    /// Name of the configured transcription engine, if any
    #[must_use]
    pub fn transcriber_name(&self) -> Option<&'static str> {
        self.transcriber.as_ref().map(|t| t.name())
    }

    /// Model identifier of the generation engine
    #[must_use]
    pub fn generator_model(&self) -> &str {
        self.generator.model()
    }

    /// Name of the synthesis engine
    #[must_use]
    pub fn synthesizer_name(&self) -> &'static str {
        self.synthesizer.name()
    }

    /// Run one request end to end
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; no partial audio is ever produced
    pub async fn run(&self, request: InboundRequest) -> Result<SynthesizedAudio> {
        let query = self.resolve(request).await?;
        let answer = self.answer(&query).await?;
        self.speak(&answer).await
    }

    /// Turn an inbound request into a text query
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be transcribed
    pub async fn resolve(&self, request: InboundRequest) -> Result<String> {
        match request {
            InboundRequest::TextPrompt(prompt) => {
                tracing::info!(prompt = %prompt, "received prompt");
                Ok(prompt)
            }
            InboundRequest::RawAudio(audio) => {
                tracing::info!(audio_bytes = audio.bytes().len(), "received audio");
                let transcript = self.transcribe(&audio).await?;
                tracing::info!(prompt = %transcript, "received prompt");
                Ok(transcript)
            }
        }
    }

    /// Transcribe client audio
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpeechUnrecognized`] when no speech was understood,
    /// [`Error::Config`] when no engine is configured
    pub async fn transcribe(&self, audio: &PcmAudio) -> Result<String> {
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            Error::Config("speech recognition is not configured".to_string())
        })?;

        let transcript = bounded(
            Stage::Transcription,
            self.settings.transcription_timeout,
            transcriber.transcribe(audio),
        )
        .await?;

        if transcript.trim().is_empty() {
            return Err(Error::SpeechUnrecognized);
        }
        Ok(transcript)
    }

    /// Ask the remote model and sanitize its answer
    ///
    /// # Errors
    ///
    /// Returns error if generation fails, times out or yields nothing speakable
    pub async fn answer(&self, query: &str) -> Result<String> {
        let raw = bounded(
            Stage::Generation,
            self.settings.generation_timeout,
            self.generator.generate(query, MAX_OUTPUT_TOKENS),
        )
        .await?;

        let answer = llm::sanitize(&raw);
        if answer.trim().is_empty() {
            return Err(Error::Generation("answer was empty after sanitizing".to_string()));
        }

        tracing::info!(model = %self.generator.model(), answer = %answer, "upstream answered");
        Ok(answer)
    }

    /// Synthesize text and bring it to the client wire format
    ///
    /// # Errors
    ///
    /// Returns error if synthesis, decoding or resampling fails
    pub async fn speak(&self, text: &str) -> Result<SynthesizedAudio> {
        let encoded = bounded(
            Stage::Synthesis,
            self.settings.synthesis_timeout,
            self.synthesizer.synthesize(text, &self.settings.language),
        )
        .await?;

        // Decoding and resampling are CPU-bound; keep them off the async workers
        let pcm = tokio::task::spawn_blocking(move || audio::to_client_pcm(&encoded))
            .await
            .map_err(|e| Error::Tts(format!("audio conversion task failed: {e}")))??;

        tracing::info!(bytes = pcm.len(), "generated audio");
        Ok(pcm)
    }
}

/// Bound a remote call, reporting an elapsed bound as a timeout of `stage`
async fn bounded<T>(
    stage: Stage,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| {
            tracing::warn!(stage = %stage, limit_secs = limit.as_secs(), "upstream call timed out");
            Error::Timeout {
                stage,
                elapsed: limit,
            }
        })?
}
