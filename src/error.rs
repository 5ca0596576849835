//! Error types for Parley gateway
//!
//! Every pipeline stage converts its own failure into exactly one [`Error`]
//! variant, and every variant belongs to exactly one [`ErrorKind`]. The kind
//! decides the HTTP status and the message shown to the client; the
//! `Display` form carries the detail and is only ever logged.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage that talks to a remote engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Generation,
    Synthesis,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Transcription => "transcription",
            Self::Generation => "generation",
            Self::Synthesis => "synthesis",
        })
    }
}

/// Errors that can occur in Parley gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Text payload was not JSON or had no usable `prompt`
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Content-Type is neither JSON nor raw audio
    #[error("unsupported content type: {0}")]
    UnsupportedMediaType(String),

    /// The transcription engine heard nothing it could turn into text
    #[error("speech not recognized")]
    SpeechUnrecognized,

    /// Remote transcription engine failed
    #[error("STT error: {0}")]
    Stt(String),

    /// Audio could not be prepared for the transcription engine
    #[error("STT input error: {0}")]
    SttInput(String),

    /// Remote text generation failed
    #[error("generation error: {0}")]
    Generation(String),

    /// A remote engine did not answer in time
    #[error("{stage} timed out after {}s", elapsed.as_secs())]
    Timeout { stage: Stage, elapsed: Duration },

    /// Speech synthesis, decoding or resampling failed
    #[error("TTS error: {0}")]
    Tts(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Client-visible failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UnsupportedMediaType,
    SpeechUnrecognized,
    TranscriptionServiceError,
    UpstreamGenerationError,
    SynthesisError,
    ConfigurationError,
    UpstreamTimeout,
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this kind
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::InvalidInput | Self::SpeechUnrecognized => 400,
            Self::UnsupportedMediaType => 415,
            Self::UpstreamGenerationError | Self::TranscriptionServiceError => 502,
            Self::UpstreamTimeout => 504,
            Self::SynthesisError | Self::ConfigurationError | Self::Internal => 500,
        }
    }

    /// Stable snake-case name, used as a log field
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::SpeechUnrecognized => "speech_unrecognized",
            Self::TranscriptionServiceError => "transcription_service_error",
            Self::UpstreamGenerationError => "upstream_generation_error",
            Self::SynthesisError => "synthesis_error",
            Self::ConfigurationError => "configuration_error",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::Internal => "internal",
        }
    }

    /// Whether the failure was caused by the request rather than the gateway
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(
            self,
            Self::InvalidInput | Self::UnsupportedMediaType | Self::SpeechUnrecognized
        )
    }
}

impl Error {
    /// The kind this error reports as
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UnsupportedMediaType(_) => ErrorKind::UnsupportedMediaType,
            Self::SpeechUnrecognized => ErrorKind::SpeechUnrecognized,
            Self::Stt(_) | Self::SttInput(_) => ErrorKind::TranscriptionServiceError,
            Self::Generation(_) => ErrorKind::UpstreamGenerationError,
            Self::Timeout { .. } => ErrorKind::UpstreamTimeout,
            Self::Tts(_) => ErrorKind::SynthesisError,
            Self::Config(_) | Self::Toml(_) => ErrorKind::ConfigurationError,
            Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code for this error
    ///
    /// Transcription failures are upstream (502) unless the audio could not
    /// even be prepared locally (500).
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::SttInput(_) => 500,
            _ => self.kind().status(),
        }
    }

    /// Message safe to return to the client
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(_) => "Invalid JSON or missing 'prompt' key".to_string(),
            Self::UnsupportedMediaType(_) => "Unsupported Content-Type".to_string(),
            Self::SpeechUnrecognized => "Could not understand audio".to_string(),
            Self::Stt(_) | Self::SttInput(_) => "Speech recognition service error".to_string(),
            Self::Generation(_) => "Gemini API request failed".to_string(),
            Self::Timeout { .. } => "Upstream service timed out".to_string(),
            Self::Tts(_) => "Failed to generate audio".to_string(),
            Self::Config(detail) => format!("Configuration error: {detail}"),
            Self::Toml(_) => "Configuration error: invalid config file".to_string(),
            Self::Io(_) => "Internal server error".to_string(),
        }
    }
}
