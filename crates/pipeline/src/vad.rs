//! Energy-based voice activity detection.
//!
//! RMS energy against a dBFS threshold with onset/offset debounce. Good
//! enough for clean telephony audio; swap in a model-backed [`VadEngine`]
//! behind the same trait when the input gets noisy.

use leasing_agent_core::{AudioFrame, VadEngine, VadEvent};
use parking_lot::Mutex;

use leasing_agent_config::constants::vad;

/// Energy VAD tuning
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Frames at or above this RMS level count as voiced (dBFS)
    pub energy_threshold_db: f32,
    /// Voiced audio required before speech onset is confirmed (ms)
    pub min_speech_ms: u32,
    /// Unvoiced audio required before a speech segment closes (ms)
    pub min_silence_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold_db: vad::ENERGY_THRESHOLD_DB,
            min_speech_ms: vad::MIN_SPEECH_MS,
            min_silence_ms: vad::MIN_SILENCE_MS,
        }
    }
}

impl From<&leasing_agent_config::VadSettings> for VadConfig {
    fn from(settings: &leasing_agent_config::VadSettings) -> Self {
        Self {
            energy_threshold_db: settings.energy_threshold_db,
            min_speech_ms: settings.min_speech_ms,
            min_silence_ms: settings.min_silence_ms,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    in_speech: bool,
    voiced_ms: f64,
    unvoiced_ms: f64,
}

/// RMS-energy voice activity detector.
pub struct EnergyVad {
    config: VadConfig,
    inner: Mutex<Inner>,
}

impl EnergyVad {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Map frame energy to a speech probability in [0, 1].
    fn probability(&self, energy_db: f32) -> f32 {
        let span = -self.config.energy_threshold_db;
        if span <= 0.0 {
            return 1.0;
        }
        ((energy_db - self.config.energy_threshold_db) / span).clamp(0.0, 1.0)
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(VadConfig::default())
    }
}

impl VadEngine for EnergyVad {
    fn process_frame(&self, frame: &AudioFrame) -> VadEvent {
        let energy_db = frame.energy_db();
        let voiced = energy_db >= self.config.energy_threshold_db;
        let frame_ms = frame.duration().as_secs_f64() * 1000.0;

        let mut inner = self.inner.lock();

        if voiced {
            inner.unvoiced_ms = 0.0;
            inner.voiced_ms += frame_ms;

            if inner.in_speech {
                VadEvent::Speech {
                    probability: self.probability(energy_db),
                }
            } else if inner.voiced_ms >= self.config.min_speech_ms as f64 {
                inner.in_speech = true;
                VadEvent::SpeechStart
            } else {
                // onset not yet confirmed
                VadEvent::Silence
            }
        } else {
            inner.voiced_ms = 0.0;

            if inner.in_speech {
                inner.unvoiced_ms += frame_ms;
                if inner.unvoiced_ms >= self.config.min_silence_ms as f64 {
                    inner.in_speech = false;
                    inner.unvoiced_ms = 0.0;
                    VadEvent::SpeechEnd
                } else {
                    // hangover: bridge short pauses inside a phrase
                    VadEvent::Speech {
                        probability: self.probability(energy_db),
                    }
                }
            } else {
                VadEvent::Silence
            }
        }
    }

    fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }
}
