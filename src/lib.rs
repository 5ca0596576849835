//! Parley Gateway - turns spoken or typed prompts into short spoken answers
//!
//! A client sends either a JSON prompt or raw PCM16 audio. The gateway
//! resolves it to text, asks a remote model for a short answer, synthesizes
//! the answer and returns it as raw `audio/L16` at 16 kHz mono.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  HTTP API (axum)                     │
//! │   /get_audio_response  │  /health  │  /ready        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Pipeline                          │
//! │   dispatch  │  STT  │  Gemini  │  sanitize  │  TTS  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Audio conversion                     │
//! │   WAV/MP3 decode  │  downmix  │  resample  │  PCM16 │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod voice;

pub use config::Config;
pub use error::{Error, ErrorKind, Result, Stage};
pub use llm::{AnswerGenerator, GeminiClient};
pub use pipeline::{InboundRequest, Pipeline, PipelineSettings};
pub use voice::{PcmAudio, SpeechSynthesizer, SpeechToText, SynthesizedAudio, TextToSpeech, Transcriber};
