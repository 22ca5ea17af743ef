//! Audio frame types shared across the pipeline.
//!
//! Frames are fixed-size, timestamped, and carry a monotonically increasing
//! sequence number per source so downstream consumers can detect gaps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rubato::{FftFixedIn, Resampler};

use crate::error::AudioError;

/// Scale factor for f32 -> i16 conversion
pub const PCM16_SCALE: f32 = 32767.0;
/// Normalization factor for i16 -> f32 conversion
pub const PCM16_NORMALIZE: f32 = 32768.0;

/// Supported sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Hz8000,
    Hz16000,
    Hz22050,
    Hz24000,
    Hz48000,
}

impl SampleRate {
    pub fn as_hz(&self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz16000 => 16000,
            Self::Hz22050 => 22050,
            Self::Hz24000 => 24000,
            Self::Hz48000 => 48000,
        }
    }

    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            8000 => Some(Self::Hz8000),
            16000 => Some(Self::Hz16000),
            22050 => Some(Self::Hz22050),
            24000 => Some(Self::Hz24000),
            48000 => Some(Self::Hz48000),
            _ => None,
        }
    }
}

/// Channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Mono,
    Stereo,
}

impl Channels {
    pub fn count(&self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// A single audio frame.
///
/// Samples are interleaved f32 in [-1.0, 1.0], shared via `Arc` so frames can
/// be fanned out to multiple consumers without copying.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Arc<[f32]>,
    pub sample_rate: SampleRate,
    pub channels: Channels,
    pub sequence: u64,
    pub timestamp: Instant,
}

impl AudioFrame {
    pub fn new(
        samples: Vec<f32>,
        sample_rate: SampleRate,
        channels: Channels,
        sequence: u64,
    ) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
            sequence,
            timestamp: Instant::now(),
        }
    }

    /// Build a frame from PCM16 samples.
    pub fn from_pcm16(
        pcm: &[i16],
        sample_rate: SampleRate,
        channels: Channels,
        sequence: u64,
    ) -> Self {
        let samples: Vec<f32> = pcm.iter().map(|s| *s as f32 / PCM16_NORMALIZE).collect();
        Self::new(samples, sample_rate, channels, sequence)
    }

    /// Convert to PCM16 with clamping.
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * PCM16_SCALE) as i16)
            .collect()
    }

    /// Frame duration derived from sample count and rate.
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / self.channels.count();
        Duration::from_secs_f64(frames as f64 / self.sample_rate.as_hz() as f64)
    }

    /// RMS energy in dBFS.
    pub fn energy_db(&self) -> f32 {
        if self.samples.is_empty() {
            return -100.0;
        }
        let sum_squares: f32 = self.samples.iter().map(|s| s * s).sum();
        let rms = (sum_squares / self.samples.len() as f32).sqrt();
        20.0 * rms.max(1e-10).log10()
    }

}

/// Streaming sample-rate converter for adapter audio that arrives at a
/// different rate than the transport.
///
/// Rubato's FFT resampler is stateful: one instance must persist across the
/// whole stream, or the filter delay eats the head of every chunk fed to it.
/// Feed frames with [`Self::push`] and drain the filter tail with
/// [`Self::flush`] once the stream ends. Mono only.
pub struct StreamResampler {
    inner: FftFixedIn<f32>,
    pending: Vec<f32>,
    /// Filter delay (in output samples) still to be skipped
    delay_remaining: usize,
    ratio: f64,
    consumed: u64,
    produced: u64,
    input_rate: SampleRate,
    output_rate: SampleRate,
}

impl StreamResampler {
    const CHUNK_IN: usize = 512;

    pub fn new(input: SampleRate, output: SampleRate) -> Result<Self, AudioError> {
        let inner = FftFixedIn::<f32>::new(
            input.as_hz() as usize,
            output.as_hz() as usize,
            Self::CHUNK_IN,
            2,
            1,
        )
        .map_err(|e| AudioError::Resample(e.to_string()))?;
        let delay_remaining = inner.output_delay();

        Ok(Self {
            inner,
            pending: Vec::with_capacity(Self::CHUNK_IN * 2),
            delay_remaining,
            ratio: output.as_hz() as f64 / input.as_hz() as f64,
            consumed: 0,
            produced: 0,
            input_rate: input,
            output_rate: output,
        })
    }

    pub fn input_rate(&self) -> SampleRate {
        self.input_rate
    }

    pub fn output_rate(&self) -> SampleRate {
        self.output_rate
    }

    /// Feed input samples; returns whatever output is ready.
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>, AudioError> {
        self.consumed += samples.len() as u64;
        self.pending.extend_from_slice(samples);

        let mut out = Vec::new();
        while self.pending.len() >= Self::CHUNK_IN {
            let chunk: Vec<f32> = self.pending.drain(..Self::CHUNK_IN).collect();
            self.process_chunk(chunk, &mut out)?;
        }
        Ok(out)
    }

    /// Drain the filter tail after the last `push`, zero-padding until every
    /// real input sample has cleared the filter.
    pub fn flush(&mut self) -> Result<Vec<f32>, AudioError> {
        let expected = (self.consumed as f64 * self.ratio).round() as u64;

        let mut out = Vec::new();
        while self.produced < expected {
            let mut chunk = std::mem::take(&mut self.pending);
            chunk.resize(Self::CHUNK_IN, 0.0);
            self.process_chunk(chunk, &mut out)?;
        }

        let excess = (self.produced - expected) as usize;
        out.truncate(out.len().saturating_sub(excess));
        self.produced = expected;
        Ok(out)
    }

    fn process_chunk(&mut self, chunk: Vec<f32>, out: &mut Vec<f32>) -> Result<(), AudioError> {
        let mut output = self
            .inner
            .process(&[chunk], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        let mut samples = output.swap_remove(0);

        if self.delay_remaining > 0 {
            let skip = self.delay_remaining.min(samples.len());
            samples.drain(..skip);
            self.delay_remaining -= skip;
        }
        self.produced += samples.len() as u64;
        out.extend_from_slice(&samples);
        Ok(())
    }
}
