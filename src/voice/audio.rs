//! PCM formats and the conversions between them
//!
//! The embedded client speaks exactly one format in both directions: signed
//! 16-bit little-endian samples, one channel, 16 kHz, no container.

use std::io::Cursor;

use crate::{Error, Result};

/// Sample rate of the client wire format
pub const SAMPLE_RATE: u32 = 16000;

/// Bytes per sample of the client wire format
pub const SAMPLE_WIDTH: u16 = 2;

/// Channel count of the client wire format
pub const CHANNELS: u16 = 1;

/// Requested input frames per resampler call
const RESAMPLE_CHUNK: usize = 1024;

/// Upper bound on silent chunks fed to drain the resampler
const MAX_FLUSH_ROUNDS: usize = 8;

/// Raw PCM bytes plus the metadata needed to interpret them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    bytes: Vec<u8>,
    sample_rate: u32,
    sample_width: u16,
    channels: u16,
}

impl PcmAudio {
    /// Wrap bytes captured by the client (PCM16 mono 16 kHz)
    #[must_use]
    pub const fn client_capture(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            sample_rate: SAMPLE_RATE,
            sample_width: SAMPLE_WIDTH,
            channels: CHANNELS,
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub const fn sample_width(&self) -> u16 {
        self.sample_width
    }

    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Samples as i16, ignoring a trailing odd byte
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }
}

/// Synthesized speech in the client wire format
///
/// The byte length is always a multiple of the sample width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio(Vec<u8>);

impl SynthesizedAudio {
    /// Encode mono f32 samples at [`SAMPLE_RATE`]
    #[must_use]
    pub fn from_samples(samples: &[f32]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * usize::from(SAMPLE_WIDTH));
        for &sample in samples {
            bytes.extend_from_slice(&f32_to_i16(sample).to_le_bytes());
        }
        Self(bytes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Decoded audio before normalization
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Re-wrap client PCM as an in-memory WAV file for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn pcm_to_wav(audio: &PcmAudio) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: audio.sample_width() * 8,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::SttInput(e.to_string()))?;

        for sample in audio.samples() {
            writer
                .write_sample(sample)
                .map_err(|e| Error::SttInput(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::SttInput(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Decode provider-native audio (WAV or MP3) into f32 samples
///
/// # Errors
///
/// Returns error if the bytes are neither valid WAV nor valid MP3
pub fn decode(encoded: &[u8]) -> Result<DecodedAudio> {
    if encoded.starts_with(b"RIFF") {
        decode_wav(encoded)
    } else {
        decode_mp3(encoded)
    }
}

fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    let reader =
        hound::WavReader::new(Cursor::new(data)).map_err(|e| Error::Tts(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Tts(format!("WAV decode error: {e}")))?,
        hound::SampleFormat::Int => {
            #[allow(clippy::cast_precision_loss)]
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    #[allow(clippy::cast_precision_loss)]
                    s.map(|v| v as f32 / scale)
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Tts(format!("WAV decode error: {e}")))?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn decode_mp3(data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(data);
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = 0_u32;
    let mut channels = 0_u16;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                channels = frame.channels as u16;
                samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Tts(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(Error::Tts("MP3 stream contained no frames".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Average interleaved channels down to one
#[must_use]
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = usize::from(channels);
    #[allow(clippy::cast_precision_loss)]
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono audio using rubato
///
/// The final partial chunk is zero-padded, the resampler's output delay is
/// dropped from the front, and the output is cut to the length the rate
/// ratio implies so events keep their position and nothing is lost at the end.
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(clippy::cast_possible_truncation)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let sub_chunks = 2;
    let mut resampler = FftFixedIn::<f64>::new(
        from_rate as usize,
        to_rate as usize,
        RESAMPLE_CHUNK,
        sub_chunks,
        1,
    )
    .map_err(|e| Error::Tts(format!("resampler init failed: {e}")))?;

    let chunk_size = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let expected =
        (samples.len() as u64 * u64::from(to_rate)).div_ceil(u64::from(from_rate)) as usize;
    let mut output: Vec<f64> = Vec::with_capacity(delay + expected + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let mut block: Vec<f64> = chunk.iter().map(|&s| f64::from(s)).collect();
        block.resize(chunk_size, 0.0);
        let result = resampler
            .process(&[block], None)
            .map_err(|e| Error::Tts(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    // The FFT resampler lags its input by `delay` frames; feed silence until
    // the tail is out, then drop the leading lag
    let mut flushes = 0;
    while output.len() < delay + expected && flushes < MAX_FLUSH_ROUNDS {
        let result = resampler
            .process(&[vec![0.0; chunk_size]], None)
            .map_err(|e| Error::Tts(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
        flushes += 1;
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output.iter().map(|&s| s as f32).collect())
}

/// Bring decoded audio to the client wire format
///
/// # Errors
///
/// Returns error if the audio is empty or resampling fails
pub fn normalize(decoded: &DecodedAudio) -> Result<SynthesizedAudio> {
    let mono = downmix(&decoded.samples, decoded.channels);
    if mono.is_empty() {
        return Err(Error::Tts("synthesized audio contained no samples".to_string()));
    }

    let resampled = resample(&mono, decoded.sample_rate, SAMPLE_RATE)?;
    Ok(SynthesizedAudio::from_samples(&resampled))
}

/// Decode provider-native bytes and bring them to the client wire format
///
/// # Errors
///
/// Returns error if decoding or resampling fails
pub fn to_client_pcm(encoded: &[u8]) -> Result<SynthesizedAudio> {
    let decoded = decode(encoded)?;
    tracing::debug!(
        sample_rate = decoded.sample_rate,
        channels = decoded.channels,
        samples = decoded.samples.len(),
        "decoded synthesized audio"
    );
    normalize(&decoded)
}

#[allow(clippy::cast_possible_truncation)]
fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}
