//! Voice processing module
//!
//! Speech recognition and synthesis engines, plus the PCM conversions that
//! sit between them and the embedded client.

pub mod audio;
mod stt;
mod tts;

pub use audio::{CHANNELS, PcmAudio, SAMPLE_RATE, SAMPLE_WIDTH, SynthesizedAudio};
pub use stt::{SpeechToText, Transcriber};
pub use tts::{SpeechSynthesizer, TextToSpeech};
