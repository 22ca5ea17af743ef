//! Cancellable speech synthesis.
//!
//! [`SynthesisController::speak`] spawns a task that pulls frames from the
//! TTS adapter, re-chunks them to the transport frame size, and forwards
//! them to the outbound audio channel. Cancellation interrupts both a
//! pending adapter read and a send blocked on transport backpressure, so a
//! barge-in stops playback within one frame of audio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use leasing_agent_core::{
    AudioFrame, Channels, PipelineError, SampleRate, StreamResampler, TextToSpeech,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use leasing_agent_config::constants::audio;

/// Playback framing
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Sample rate of the outbound transport
    pub output_sample_rate: SampleRate,
    /// Samples per outbound frame
    pub frame_samples: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            output_sample_rate: SampleRate::Hz16000,
            frame_samples: audio::FRAME_SAMPLES,
        }
    }
}

/// How a synthesis task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// All frames were delivered
    Completed,
    /// Playback was cancelled mid-stream
    Cancelled,
    /// The TTS adapter failed
    Failed(String),
}

/// Handle to an in-flight synthesis task.
pub struct SpeechHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<SynthesisOutcome>,
}

impl SpeechHandle {
    /// Request cancellation. Returns immediately; await [`Self::finished`]
    /// to join the task and observe the outcome.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Wait for the synthesis task to end.
    pub async fn finished(&mut self) -> SynthesisOutcome {
        match (&mut self.task).await {
            Ok(outcome) => outcome,
            Err(e) => SynthesisOutcome::Failed(format!("synthesis task panicked: {e}")),
        }
    }
}

/// Drives one utterance of TTS playback at a time.
pub struct SynthesisController {
    tts: Arc<dyn TextToSpeech>,
    config: SynthesisConfig,
    active: Arc<AtomicBool>,
}

impl SynthesisController {
    pub fn new(tts: Arc<dyn TextToSpeech>, config: SynthesisConfig) -> Self {
        Self {
            tts,
            config,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start speaking `text` into `out`. Fails with [`PipelineError::SynthesisBusy`]
    /// if a previous utterance has not finished or been cancelled yet.
    pub fn speak(
        &self,
        text: &str,
        out: mpsc::Sender<AudioFrame>,
    ) -> Result<SpeechHandle, PipelineError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::SynthesisBusy);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_synthesis(
            Arc::clone(&self.tts),
            self.config.clone(),
            text.to_string(),
            out,
            cancel_rx,
            Arc::clone(&self.active),
        ));

        Ok(SpeechHandle {
            cancel: cancel_tx,
            task,
        })
    }
}

async fn run_synthesis(
    tts: Arc<dyn TextToSpeech>,
    config: SynthesisConfig,
    text: String,
    out: mpsc::Sender<AudioFrame>,
    mut cancel: watch::Receiver<bool>,
    active: Arc<AtomicBool>,
) -> SynthesisOutcome {
    let outcome = pump_frames(tts, &config, &text, &out, &mut cancel).await;
    active.store(false, Ordering::SeqCst);
    if let SynthesisOutcome::Failed(ref message) = outcome {
        warn!(%message, "synthesis failed");
    }
    outcome
}

async fn pump_frames(
    tts: Arc<dyn TextToSpeech>,
    config: &SynthesisConfig,
    text: &str,
    out: &mpsc::Sender<AudioFrame>,
    cancel: &mut watch::Receiver<bool>,
) -> SynthesisOutcome {
    let mut stream = match tts.synthesize_stream(text).await {
        Ok(stream) => stream,
        Err(e) => return SynthesisOutcome::Failed(e.to_string()),
    };

    let mut buffer: Vec<f32> = Vec::with_capacity(config.frame_samples * 4);
    let mut resampler: Option<StreamResampler> = None;
    let mut sequence: u64 = 0;

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.changed() => return SynthesisOutcome::Cancelled,
            item = stream.next() => item,
        };
        let Some(item) = item else { break };

        let frame = match item {
            Ok(frame) => frame,
            Err(e) => return SynthesisOutcome::Failed(e.to_string()),
        };

        if frame.sample_rate == config.output_sample_rate {
            buffer.extend_from_slice(&frame.samples);
        } else {
            if frame.channels != Channels::Mono {
                return SynthesisOutcome::Failed(
                    "resampling supports mono frames only".to_string(),
                );
            }
            if resampler.is_none() {
                match StreamResampler::new(frame.sample_rate, config.output_sample_rate) {
                    Ok(rs) => resampler = Some(rs),
                    Err(e) => return SynthesisOutcome::Failed(e.to_string()),
                }
            }
            if let Some(rs) = resampler.as_mut() {
                if rs.input_rate() != frame.sample_rate {
                    return SynthesisOutcome::Failed(
                        "adapter sample rate changed mid-stream".to_string(),
                    );
                }
                match rs.push(&frame.samples) {
                    Ok(samples) => buffer.extend_from_slice(&samples),
                    Err(e) => return SynthesisOutcome::Failed(e.to_string()),
                }
            }
        }

        while buffer.len() >= config.frame_samples {
            let chunk: Vec<f32> = buffer.drain(..config.frame_samples).collect();
            match send_frame(out, cancel, config, chunk, &mut sequence).await {
                Ok(()) => {}
                Err(outcome) => return outcome,
            }
        }
    }

    if let Some(mut rs) = resampler.take() {
        match rs.flush() {
            Ok(tail) => buffer.extend_from_slice(&tail),
            Err(e) => return SynthesisOutcome::Failed(e.to_string()),
        }
        while buffer.len() >= config.frame_samples {
            let chunk: Vec<f32> = buffer.drain(..config.frame_samples).collect();
            if let Err(outcome) = send_frame(out, cancel, config, chunk, &mut sequence).await {
                return outcome;
            }
        }
    }

    // trailing partial frame
    if !buffer.is_empty() {
        let chunk = std::mem::take(&mut buffer);
        if let Err(outcome) = send_frame(out, cancel, config, chunk, &mut sequence).await {
            return outcome;
        }
    }

    debug!(frames = sequence, "synthesis complete");
    SynthesisOutcome::Completed
}

/// Races the send against cancellation, so a task blocked on a full
/// outbound channel still observes cancel immediately.
async fn send_frame(
    out: &mpsc::Sender<AudioFrame>,
    cancel: &mut watch::Receiver<bool>,
    config: &SynthesisConfig,
    samples: Vec<f32>,
    sequence: &mut u64,
) -> Result<(), SynthesisOutcome> {
    let frame = AudioFrame::new(
        samples,
        config.output_sample_rate,
        Channels::Mono,
        *sequence,
    );
    tokio::select! {
        biased;
        _ = cancel.changed() => Err(SynthesisOutcome::Cancelled),
        sent = out.send(frame) => match sent {
            Ok(()) => {
                *sequence += 1;
                Ok(())
            }
            // receiver gone: the session is tearing down
            Err(_) => Err(SynthesisOutcome::Cancelled),
        },
    }
}
