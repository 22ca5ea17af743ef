//! Turn segmentation and barge-in detection.
//!
//! Fuses voice activity from the VAD with transcripts from the STT adapter
//! and decides when the caller's turn is over. A turn ends only when both
//! hold: a final transcript has arrived for the utterance AND the caller
//! has been silent for the configured threshold. Either condition may
//! become true first.
//!
//! While the agent is speaking the segmenter instead watches for sustained
//! caller speech and reports a single barge-in per playback interval.

use std::time::Instant;

use leasing_agent_core::{TranscriptResult, UtteranceEvent};
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use leasing_agent_config::constants::turn;

/// Turn-taking tuning
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Silence required after a final transcript to close the utterance (ms)
    pub silence_threshold_ms: u64,
    /// Sustained speech required before an utterance opens (ms)
    pub min_speech_ms: u64,
    /// Sustained speech during playback before barge-in fires (ms)
    pub barge_in_min_speech_ms: u64,
    /// Force-finalize cap for long monologues (ms)
    pub max_utterance_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            silence_threshold_ms: turn::SILENCE_THRESHOLD_MS,
            min_speech_ms: turn::MIN_SPEECH_MS,
            barge_in_min_speech_ms: turn::BARGE_IN_MIN_SPEECH_MS,
            max_utterance_ms: turn::MAX_UTTERANCE_MS,
        }
    }
}

impl From<&leasing_agent_config::TurnSettings> for TurnConfig {
    fn from(settings: &leasing_agent_config::TurnSettings) -> Self {
        Self {
            silence_threshold_ms: settings.silence_threshold_ms,
            min_speech_ms: settings.min_speech_ms,
            barge_in_min_speech_ms: settings.barge_in_min_speech_ms,
            max_utterance_ms: settings.max_utterance_ms,
        }
    }
}

/// Where the segmenter believes the conversational floor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Nobody is speaking
    Idle,
    /// Caller utterance in progress
    CallerSpeaking,
    /// Caller went quiet; waiting for the silence threshold and a final transcript
    Evaluating,
    /// Agent playback in progress; watching for barge-in
    AgentSpeaking,
}

/// Events the segmenter emits upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmenterEvent {
    /// A caller turn completed
    Utterance(UtteranceEvent),
    /// The caller talked over agent playback long enough to take the floor
    BargeIn,
    /// The length cap elapsed without a final transcript ever arriving
    TranscriptionGap,
}

#[derive(Debug)]
struct Draft {
    utterance_id: Uuid,
    text: String,
    confidence: f32,
    start_time_ms: u64,
    end_time_ms: u64,
    has_final: bool,
    started_at: Instant,
}

impl Draft {
    fn new(now: Instant) -> Self {
        Self {
            utterance_id: Uuid::new_v4(),
            text: String::new(),
            confidence: 0.0,
            start_time_ms: 0,
            end_time_ms: 0,
            has_final: false,
            started_at: now,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: SegmenterState,
    draft: Option<Draft>,
    /// Set while the caller is quiet in CallerSpeaking/Evaluating
    silence_since: Option<Instant>,
    /// Speech onset gate while Idle
    speech_since: Option<Instant>,
    /// Sustained caller speech tracker while AgentSpeaking
    barge_in_speech_since: Option<Instant>,
    /// At most one barge-in per playback interval
    barge_in_fired: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: SegmenterState::Idle,
            draft: None,
            silence_since: None,
            speech_since: None,
            barge_in_speech_since: None,
            barge_in_fired: false,
        }
    }
}

/// Turn segmenter. All methods take `&self`; state lives behind a mutex so
/// the session loop can share it across handlers.
pub struct TurnSegmenter {
    config: TurnConfig,
    inner: Mutex<Inner>,
}

impl TurnSegmenter {
    pub fn new(config: TurnConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn state(&self) -> SegmenterState {
        self.inner.lock().state
    }

    /// Feed one frame's worth of voice activity.
    pub fn on_activity(&self, is_speech: bool, now: Instant) -> Option<SegmenterEvent> {
        let mut inner = self.inner.lock();

        match inner.state {
            SegmenterState::AgentSpeaking => {
                if is_speech {
                    let since = *inner.barge_in_speech_since.get_or_insert(now);
                    let sustained_ms = now.duration_since(since).as_millis() as u64;
                    if !inner.barge_in_fired && sustained_ms >= self.config.barge_in_min_speech_ms
                    {
                        inner.barge_in_fired = true;
                        debug!(sustained_ms, "barge-in detected");
                        return Some(SegmenterEvent::BargeIn);
                    }
                } else {
                    inner.barge_in_speech_since = None;
                }
                None
            }
            SegmenterState::Idle => {
                if is_speech {
                    let since = *inner.speech_since.get_or_insert(now);
                    let sustained_ms = now.duration_since(since).as_millis() as u64;
                    if sustained_ms >= self.config.min_speech_ms {
                        inner.speech_since = None;
                        inner.state = SegmenterState::CallerSpeaking;
                        if inner.draft.is_none() {
                            inner.draft = Some(Draft::new(since));
                        }
                    }
                } else {
                    inner.speech_since = None;
                }
                None
            }
            SegmenterState::CallerSpeaking => {
                if is_speech {
                    self.check_max_utterance(&mut inner, now)
                } else {
                    inner.silence_since = Some(now);
                    inner.state = SegmenterState::Evaluating;
                    None
                }
            }
            SegmenterState::Evaluating => {
                if is_speech {
                    inner.silence_since = None;
                    inner.state = SegmenterState::CallerSpeaking;
                    self.check_max_utterance(&mut inner, now)
                } else {
                    if self.silence_elapsed(&inner, now)
                        && inner.draft.as_ref().map_or(false, |d| d.has_final)
                    {
                        return self.close_utterance(&mut inner);
                    }
                    self.check_max_utterance(&mut inner, now)
                }
            }
        }
    }

    /// Feed a transcript result for the current utterance.
    pub fn on_transcript(
        &self,
        result: &TranscriptResult,
        now: Instant,
    ) -> Option<SegmenterEvent> {
        let mut inner = self.inner.lock();

        if inner.state == SegmenterState::AgentSpeaking && !inner.barge_in_fired {
            debug!(text = %result.text, "dropping transcript during agent playback");
            return None;
        }

        if inner.draft.is_none() {
            if result.is_final {
                debug!(text = %result.text, "final transcript with no open utterance");
                return None;
            }
            // STT can outrun VAD onset confirmation; open the draft eagerly.
            inner.draft = Some(Draft::new(now));
        }

        let mut check_close = false;
        if let Some(draft) = inner.draft.as_mut() {
            if result.is_final {
                if draft.has_final {
                    warn!(
                        kept = %draft.text,
                        dropped = %result.text,
                        "duplicate final transcript for utterance"
                    );
                    return None;
                }
                draft.text = result.text.clone();
                draft.confidence = result.confidence;
                draft.start_time_ms = result.start_time_ms;
                draft.end_time_ms = result.end_time_ms;
                draft.has_final = true;
                check_close = true;
            } else {
                draft.text = result.text.clone();
                draft.confidence = result.confidence;
            }
        }

        // Silence may already have elapsed; the final was the missing half.
        if check_close
            && inner.state == SegmenterState::Evaluating
            && self.silence_elapsed(&inner, now)
        {
            return self.close_utterance(&mut inner);
        }

        None
    }

    /// Enter playback mode. Any open caller draft is abandoned.
    pub fn set_agent_speaking(&self) {
        let mut inner = self.inner.lock();
        if inner.draft.is_some() {
            debug!("abandoning open caller draft at playback start");
        }
        inner.state = SegmenterState::AgentSpeaking;
        inner.draft = None;
        inner.silence_since = None;
        inner.speech_since = None;
        inner.barge_in_speech_since = None;
        inner.barge_in_fired = false;
    }

    /// Leave playback mode, after a barge-in was handled or playback finished.
    pub fn resume_listening(&self, now: Instant) {
        let mut inner = self.inner.lock();
        if inner.state != SegmenterState::AgentSpeaking {
            return;
        }
        let interrupted = inner.barge_in_fired;
        inner.barge_in_speech_since = None;
        inner.barge_in_fired = false;
        inner.silence_since = None;
        inner.speech_since = None;
        if interrupted {
            // The caller already has the floor.
            inner.state = SegmenterState::CallerSpeaking;
            if inner.draft.is_none() {
                inner.draft = Some(Draft::new(now));
            }
        } else {
            inner.state = SegmenterState::Idle;
            inner.draft = None;
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::new();
    }

    fn silence_elapsed(&self, inner: &Inner, now: Instant) -> bool {
        inner.silence_since.map_or(false, |since| {
            now.duration_since(since).as_millis() as u64 >= self.config.silence_threshold_ms
        })
    }

    fn check_max_utterance(&self, inner: &mut Inner, now: Instant) -> Option<SegmenterEvent> {
        let over_cap = inner.draft.as_ref().map_or(false, |d| {
            now.duration_since(d.started_at).as_millis() as u64 >= self.config.max_utterance_ms
        });
        if !over_cap {
            return None;
        }

        let has_final = inner.draft.as_ref().map_or(false, |d| d.has_final);
        if has_final {
            warn!("utterance hit the length cap, force-finalizing");
            self.close_utterance(inner)
        } else {
            warn!("utterance hit the length cap with no final transcript, discarding");
            inner.draft = Some(Draft::new(now));
            inner.silence_since = None;
            inner.state = SegmenterState::CallerSpeaking;
            Some(SegmenterEvent::TranscriptionGap)
        }
    }

    fn close_utterance(&self, inner: &mut Inner) -> Option<SegmenterEvent> {
        let draft = inner.draft.take()?;
        inner.silence_since = None;
        inner.speech_since = None;
        inner.state = SegmenterState::Idle;

        let text = draft.text.trim().to_string();
        if text.is_empty() {
            warn!("utterance closed with empty text, dropping");
            return None;
        }

        Some(SegmenterEvent::Utterance(UtteranceEvent {
            utterance_id: draft.utterance_id,
            text,
            confidence: draft.confidence,
            start_time_ms: draft.start_time_ms,
            end_time_ms: draft.end_time_ms,
        }))
    }
}

impl Default for TurnSegmenter {
    fn default() -> Self {
        Self::new(TurnConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> TurnConfig {
        TurnConfig {
            silence_threshold_ms: 600,
            min_speech_ms: 200,
            barge_in_min_speech_ms: 200,
            max_utterance_ms: 30_000,
        }
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn final_result(text: &str) -> TranscriptResult {
        TranscriptResult::final_result(text, 0.9).with_time_range(0, 1000)
    }

    /// Drive sustained speech so the utterance opens.
    fn open_utterance(seg: &TurnSegmenter, base: Instant) {
        seg.on_activity(true, base);
        seg.on_activity(true, at(base, 250));
        assert_eq!(seg.state(), SegmenterState::CallerSpeaking);
    }

    #[test]
    fn turn_ends_when_silence_follows_final() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();

        open_utterance(&seg, base);
        assert!(seg.on_transcript(&final_result("do you allow pets"), at(base, 300)).is_none());

        // silence begins
        assert!(seg.on_activity(false, at(base, 400)).is_none());
        // not enough silence yet
        assert!(seg.on_activity(false, at(base, 800)).is_none());

        let event = seg.on_activity(false, at(base, 1100));
        match event {
            Some(SegmenterEvent::Utterance(u)) => {
                assert_eq!(u.text, "do you allow pets");
                assert_eq!(u.confidence, 0.9);
            }
            other => panic!("expected utterance, got {other:?}"),
        }
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn turn_ends_when_final_follows_silence() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();

        open_utterance(&seg, base);
        seg.on_transcript(&TranscriptResult::partial("do you", 0.5), at(base, 300));

        seg.on_activity(false, at(base, 400));
        // silence threshold elapses with only a partial on record
        assert!(seg.on_activity(false, at(base, 1200)).is_none());

        // the late final completes the AND condition immediately
        let event = seg.on_transcript(&final_result("do you allow pets"), at(base, 1300));
        match event {
            Some(SegmenterEvent::Utterance(u)) => assert_eq!(u.text, "do you allow pets"),
            other => panic!("expected utterance, got {other:?}"),
        }
    }

    #[test]
    fn resumed_speech_cancels_evaluation() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();

        open_utterance(&seg, base);
        seg.on_transcript(&final_result("one bedroom"), at(base, 300));
        seg.on_activity(false, at(base, 400));

        // caller keeps talking before the threshold elapses
        seg.on_activity(true, at(base, 700));
        assert_eq!(seg.state(), SegmenterState::CallerSpeaking);

        // the earlier silence window must not carry over
        seg.on_activity(false, at(base, 800));
        assert!(seg.on_activity(false, at(base, 1100)).is_none());
        assert!(seg
            .on_activity(false, at(base, 1500))
            .is_some());
    }

    #[test]
    fn duplicate_final_keeps_first() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();

        open_utterance(&seg, base);
        seg.on_transcript(&final_result("first"), at(base, 300));
        seg.on_transcript(&final_result("second"), at(base, 350));

        seg.on_activity(false, at(base, 400));
        let event = seg.on_activity(false, at(base, 1100));
        match event {
            Some(SegmenterEvent::Utterance(u)) => assert_eq!(u.text, "first"),
            other => panic!("expected utterance, got {other:?}"),
        }
    }

    #[test]
    fn barge_in_requires_sustained_speech() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();
        seg.set_agent_speaking();

        // a short blip resets the tracker
        assert!(seg.on_activity(true, base).is_none());
        assert!(seg.on_activity(false, at(base, 100)).is_none());

        assert!(seg.on_activity(true, at(base, 200)).is_none());
        assert!(seg.on_activity(true, at(base, 300)).is_none());
        assert_eq!(
            seg.on_activity(true, at(base, 450)),
            Some(SegmenterEvent::BargeIn)
        );
    }

    #[test]
    fn barge_in_fires_once_per_playback() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();
        seg.set_agent_speaking();

        seg.on_activity(true, base);
        assert_eq!(
            seg.on_activity(true, at(base, 250)),
            Some(SegmenterEvent::BargeIn)
        );
        assert!(seg.on_activity(true, at(base, 500)).is_none());
        assert!(seg.on_activity(true, at(base, 1000)).is_none());
    }

    #[test]
    fn resume_after_barge_in_keeps_the_floor_with_caller() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();
        seg.set_agent_speaking();

        seg.on_activity(true, base);
        seg.on_activity(true, at(base, 250));
        seg.resume_listening(at(base, 300));
        assert_eq!(seg.state(), SegmenterState::CallerSpeaking);

        seg.on_transcript(&final_result("wait, how much is rent"), at(base, 600));
        seg.on_activity(false, at(base, 700));
        assert!(seg.on_activity(false, at(base, 1400)).is_some());
    }

    #[test]
    fn resume_without_barge_in_goes_idle() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();
        seg.set_agent_speaking();
        seg.resume_listening(at(base, 100));
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn transcripts_during_playback_are_dropped() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();
        seg.set_agent_speaking();

        assert!(seg
            .on_transcript(&final_result("agent echo"), at(base, 100))
            .is_none());
        seg.resume_listening(at(base, 200));

        // the dropped transcript must not leak into the next turn
        open_utterance(&seg, at(base, 300));
        seg.on_transcript(&final_result("real question"), at(base, 700));
        seg.on_activity(false, at(base, 800));
        match seg.on_activity(false, at(base, 1500)) {
            Some(SegmenterEvent::Utterance(u)) => assert_eq!(u.text, "real question"),
            other => panic!("expected utterance, got {other:?}"),
        }
    }

    #[test]
    fn length_cap_discards_partial_only_monologue() {
        let mut cfg = config();
        cfg.max_utterance_ms = 1000;
        let seg = TurnSegmenter::new(cfg);
        let base = Instant::now();

        open_utterance(&seg, base);
        seg.on_transcript(&TranscriptResult::partial("rambling", 0.5), at(base, 300));

        // cap reached with no final transcript: draft is discarded and the
        // gap is reported so the caller is not left hanging
        assert_eq!(
            seg.on_activity(true, at(base, 1100)),
            Some(SegmenterEvent::TranscriptionGap)
        );
        assert_eq!(seg.state(), SegmenterState::CallerSpeaking);

        // a fresh draft is open for the continuing speech
        seg.on_transcript(&final_result("the actual question"), at(base, 1200));
        seg.on_activity(false, at(base, 1300));
        match seg.on_activity(false, at(base, 2000)) {
            Some(SegmenterEvent::Utterance(u)) => assert_eq!(u.text, "the actual question"),
            other => panic!("expected utterance, got {other:?}"),
        }
    }

    #[test]
    fn length_cap_finalizes_when_final_exists() {
        let mut cfg = config();
        cfg.max_utterance_ms = 1000;
        let seg = TurnSegmenter::new(cfg);
        let base = Instant::now();

        open_utterance(&seg, base);
        seg.on_transcript(&final_result("long but transcribed"), at(base, 300));

        match seg.on_activity(true, at(base, 1100)) {
            Some(SegmenterEvent::Utterance(u)) => assert_eq!(u.text, "long but transcribed"),
            other => panic!("expected utterance, got {other:?}"),
        }
    }

    #[test]
    fn empty_final_is_dropped() {
        let seg = TurnSegmenter::new(config());
        let base = Instant::now();

        open_utterance(&seg, base);
        seg.on_transcript(&final_result("   "), at(base, 300));
        seg.on_activity(false, at(base, 400));
        assert!(seg.on_activity(false, at(base, 1100)).is_none());
        assert_eq!(seg.state(), SegmenterState::Idle);
    }
}
