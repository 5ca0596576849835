//! Shared test utilities

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley_gateway::{
    AnswerGenerator, Error, PcmAudio, Pipeline, PipelineSettings, Result, SpeechSynthesizer, Transcriber,
};

/// What a fake engine does when called
#[derive(Clone)]
pub enum Behavior {
    Reply(String),
    Fail,
    Hang,
}

/// Transcriber returning a canned transcript
pub struct FakeTranscriber {
    pub behavior: Behavior,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &PcmAudio) -> Result<String> {
        if audio.is_empty() {
            return Err(Error::SpeechUnrecognized);
        }
        match &self.behavior {
            Behavior::Reply(text) if text.trim().is_empty() => Err(Error::SpeechUnrecognized),
            Behavior::Reply(text) => Ok(text.clone()),
            Behavior::Fail => Err(Error::Stt("recognizer unavailable".to_string())),
            Behavior::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &'static str {
        "fake-stt"
    }
}

/// Generator returning a canned answer and recording what it was asked
pub struct FakeGenerator {
    pub behavior: Behavior,
    pub prompts: Mutex<Vec<(String, u32)>>,
}

impl FakeGenerator {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(String, u32)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), max_output_tokens));
        match &self.behavior {
            Behavior::Reply(text) => Ok(text.clone()),
            Behavior::Fail => Err(Error::Generation("upstream returned 500".to_string())),
            Behavior::Hang => std::future::pending().await,
        }
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Synthesizer producing a one-second stereo WAV tone at `sample_rate`
pub struct FakeSynthesizer {
    pub sample_rate: u32,
    pub fail: bool,
    pub texts: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            fail: false,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(24_000)
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>> {
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(Error::Tts("engine refused".to_string()));
        }
        Ok(tone_wav(self.sample_rate, 2, 1.0))
    }

    fn name(&self) -> &'static str {
        "fake-tts"
    }
}

/// Build a 440 Hz 16-bit WAV
pub fn tone_wav(sample_rate: u32, channels: u16, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (sample_rate as f32 * seconds) as usize;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 8000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Short timeouts so hanging fakes fail fast under a paused clock
pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        language: "en".to_string(),
        transcription_timeout: Duration::from_secs(2),
        generation_timeout: Duration::from_secs(2),
        synthesis_timeout: Duration::from_secs(2),
    }
}

/// Build a pipeline around fakes
pub fn build_pipeline(
    transcriber: Option<FakeTranscriber>,
    generator: Arc<FakeGenerator>,
    synthesizer: Arc<FakeSynthesizer>,
) -> Pipeline {
    let pipeline = Pipeline::new(generator, synthesizer, test_settings());
    match transcriber {
        Some(t) => pipeline.with_transcriber(Arc::new(t)),
        None => pipeline,
    }
}

/// Samples per MPEG-2 Layer III frame
pub const MP3_FRAME_SAMPLES: usize = 576;

/// Build a silent MPEG-2 Layer III stream: 24 kHz, mono, 32 kbps
///
/// Each frame is a bare header followed by zeroed side info and main data,
/// which decodes to 576 zero samples.
pub fn silent_mp3(frames: usize) -> Vec<u8> {
    // sync | MPEG-2, layer III, no CRC | 32 kbps, 24 kHz | mono
    const HEADER: [u8; 4] = [0xFF, 0xF3, 0x44, 0xC0];
    // 576 * 32 kbps / 8 / 24 kHz
    const FRAME_BYTES: usize = 96;

    let mut frame = vec![0_u8; FRAME_BYTES];
    frame[..4].copy_from_slice(&HEADER);
    frame.repeat(frames)
}
