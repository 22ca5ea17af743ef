//! End-to-end session tests with scripted LLM and TTS adapters.
//!
//! Audio is driven through the real energy VAD and turn segmenter, so the
//! tests pace frames with short real-time sleeps and use tightened
//! turn-taking thresholds.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leasing_agent::{
    EndReason, ReasoningConfig, SessionEvent, SessionInput, SessionState, SessionSummary,
    VoiceSession, VoiceSessionConfig,
};
use leasing_agent_core::{
    AudioFrame, Channels, Error, FinishReason, GenerateRequest, GenerateResponse, LanguageModel,
    LeadSink, LlmError, PipelineError, SampleRate, SynthesisStream, TextToSpeech,
    ToolCallRequest, ToolDefinition, TranscriptResult,
};
use leasing_agent_pipeline::{EnergyVad, SynthesisConfig, TurnConfig, VadConfig};
use leasing_agent_tools::{create_default_registry, InMemoryLeadSink, PropertyStore};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// `None` entries make the model hang forever.
struct ScriptedLlm {
    responses: Mutex<VecDeque<Option<GenerateResponse>>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<Option<GenerateResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate_with_tools(
        &self,
        _request: GenerateRequest,
        _tools: &[ToolDefinition],
    ) -> Result<GenerateResponse, LlmError> {
        let next = self.responses.lock().pop_front();
        match next {
            Some(Some(response)) => Ok(response),
            Some(None) => futures::future::pending().await,
            None => Err(LlmError::Request("script exhausted".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn text_response(content: &str) -> Option<GenerateResponse> {
    Some(GenerateResponse {
        text: content.to_string(),
        tool_calls: vec![],
        finish_reason: FinishReason::Stop,
    })
}

fn tool_response(name: &str, arguments: serde_json::Value) -> Option<GenerateResponse> {
    Some(GenerateResponse {
        text: String::new(),
        tool_calls: vec![ToolCallRequest::new("call_1", name, arguments)],
        finish_reason: FinishReason::ToolCalls,
    })
}

/// TTS that emits a fixed number of paced frames per reply. The first
/// `fail_next` replies fail outright.
struct ScriptedTts {
    frames_per_reply: usize,
    frame_delay: Duration,
    fail_next: AtomicUsize,
}

impl ScriptedTts {
    fn new(frames_per_reply: usize, frame_delay: Duration) -> Self {
        Self {
            frames_per_reply,
            frame_delay,
            fail_next: AtomicUsize::new(0),
        }
    }

    fn failing_first(mut self, count: usize) -> Self {
        self.fail_next = AtomicUsize::new(count);
        self
    }
}

#[async_trait]
impl TextToSpeech for ScriptedTts {
    async fn synthesize_stream(&self, _text: &str) -> Result<SynthesisStream, Error> {
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Pipeline(PipelineError::SynthesisFailure(
                "voice model unavailable".to_string(),
            )));
        }
        let frames = self.frames_per_reply;
        let delay = self.frame_delay;
        Ok(Box::pin(async_stream::stream! {
            for i in 0..frames {
                tokio::time::sleep(delay).await;
                yield Ok(AudioFrame::new(
                    vec![0.1; 320],
                    SampleRate::Hz16000,
                    Channels::Mono,
                    i as u64,
                ));
            }
        }))
    }

    fn sample_rate(&self) -> SampleRate {
        SampleRate::Hz16000
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    inputs: mpsc::Sender<SessionInput>,
    audio: mpsc::Receiver<AudioFrame>,
    events: broadcast::Receiver<SessionEvent>,
    sink: Arc<InMemoryLeadSink>,
    task: JoinHandle<SessionSummary>,
}

fn start_session(llm: ScriptedLlm, tts: ScriptedTts) -> Harness {
    start_session_with_turn(
        llm,
        tts,
        TurnConfig {
            silence_threshold_ms: 50,
            min_speech_ms: 30,
            barge_in_min_speech_ms: 40,
            max_utterance_ms: 30_000,
        },
    )
}

fn start_session_with_turn(llm: ScriptedLlm, tts: ScriptedTts, turn: TurnConfig) -> Harness {
    let config = VoiceSessionConfig {
        turn,
        synthesis: SynthesisConfig {
            output_sample_rate: SampleRate::Hz16000,
            frame_samples: 320,
        },
        reasoning: ReasoningConfig::default(),
        greeting: None,
        ..VoiceSessionConfig::default()
    };
    let vad = Arc::new(EnergyVad::new(VadConfig {
        energy_threshold_db: -40.0,
        min_speech_ms: 20,
        min_silence_ms: 20,
    }));
    let sink = Arc::new(InMemoryLeadSink::new());
    let lead_sink: Arc<dyn LeadSink> = sink.clone();
    let registry = Arc::new(create_default_registry(Arc::new(PropertyStore::seeded())));

    let session = VoiceSession::new(
        config,
        vad,
        Arc::new(tts),
        Arc::new(llm),
        registry,
        Some(lead_sink),
    );
    let events = session.subscribe();

    let (input_tx, input_rx) = mpsc::channel(256);
    let (audio_tx, audio_rx) = mpsc::channel(256);
    let task = tokio::spawn(session.run(input_rx, audio_tx));

    Harness {
        inputs: input_tx,
        audio: audio_rx,
        events,
        sink,
        task,
    }
}

fn frame(amplitude: f32) -> AudioFrame {
    AudioFrame::new(vec![amplitude; 320], SampleRate::Hz16000, Channels::Mono, 0)
}

async fn send_speech(harness: &Harness, frames: usize) {
    for _ in 0..frames {
        harness
            .inputs
            .send(SessionInput::Audio(frame(0.5)))
            .await
            .expect("session should accept input");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn send_silence(harness: &Harness, frames: usize) {
    for _ in 0..frames {
        harness
            .inputs
            .send(SessionInput::Audio(frame(0.0)))
            .await
            .expect("session should accept input");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Speak, deliver a final transcript, then go quiet long enough to close
/// the turn.
async fn caller_says(harness: &Harness, text: &str) {
    send_speech(harness, 6).await;
    harness
        .inputs
        .send(SessionInput::Transcript(
            TranscriptResult::final_result(text, 0.95).with_time_range(0, 600),
        ))
        .await
        .expect("session should accept input");
    send_silence(harness, 10).await;
}

async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut predicate: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event stream should stay open");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event within 5s")
}

async fn finish(harness: Harness) -> (SessionSummary, Arc<InMemoryLeadSink>) {
    harness
        .inputs
        .send(SessionInput::Disconnect)
        .await
        .expect("session should accept input");
    let summary = harness.task.await.expect("session task should not panic");
    (summary, harness.sink)
}

#[tokio::test]
async fn answers_a_property_question_with_a_tool_call() {
    let llm = ScriptedLlm::new(vec![
        tool_response("get_property_info", json!({"property_name": "boulder"})),
        text_response("The Boulder condo is twenty-two hundred a month with utilities included."),
    ]);
    let mut harness = start_session(llm, ScriptedTts::new(5, Duration::from_millis(2)));

    caller_says(&harness, "tell me about the boulder place").await;

    wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::ToolCall { name, success: true } if name == "get_property_info")
    })
    .await;
    wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::AgentResponse { .. })
    })
    .await;
    wait_for_event(&mut harness.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged {
                new: SessionState::Listening,
                old: SessionState::Speaking,
            }
        )
    })
    .await;

    // the synthesized reply reached the outbound channel
    let mut delivered = 0;
    while harness.audio.try_recv().is_ok() {
        delivered += 1;
    }
    assert_eq!(delivered, 5);

    let (summary, _) = finish(harness).await;
    assert_eq!(summary.history.len(), 2);
    assert_eq!(
        summary.history.turns()[0].text,
        "tell me about the boulder place"
    );
    assert_eq!(summary.history.turns()[1].tool_calls.len(), 1);
    assert!(!summary.history.turns()[1].interrupted);
}

#[tokio::test]
async fn lists_the_catalog_end_to_end() {
    let llm = ScriptedLlm::new(vec![
        tool_response("list_available_properties", json!({})),
        text_response("We have a condo in Boulder and a house out in Lander."),
    ]);
    let mut harness = start_session(llm, ScriptedTts::new(4, Duration::from_millis(2)));

    caller_says(&harness, "what do you have available").await;

    wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::ToolCall { name, success: true } if name == "list_available_properties")
    })
    .await;
    wait_for_event(&mut harness.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged {
                new: SessionState::Listening,
                old: SessionState::Speaking,
            }
        )
    })
    .await;

    let (summary, _) = finish(harness).await;
    assert_eq!(summary.history.len(), 2);
    let (_, result) = &summary.history.turns()[1].tool_calls[0];
    let listing = result
        .payload
        .as_str()
        .expect("catalog payload should be a spoken string");
    assert!(listing.contains("Boulder"), "missing Boulder: {listing}");
    assert!(listing.contains("Lander"), "missing Lander: {listing}");
}

#[tokio::test]
async fn missing_final_transcript_triggers_a_reprompt() {
    // no LLM turns expected; the re-prompt comes from the session itself
    let llm = ScriptedLlm::new(vec![]);
    let mut harness = start_session_with_turn(
        llm,
        ScriptedTts::new(3, Duration::from_millis(2)),
        TurnConfig {
            silence_threshold_ms: 50,
            min_speech_ms: 30,
            barge_in_min_speech_ms: 40,
            max_utterance_ms: 150,
        },
    );

    // a partial opens the utterance, but no final ever arrives
    harness
        .inputs
        .send(SessionInput::Transcript(TranscriptResult::partial(
            "mumbling", 0.4,
        )))
        .await
        .expect("session should accept input");
    send_speech(&harness, 18).await;

    wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::Error { .. })
    })
    .await;
    let response = wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::AgentResponse { .. })
    })
    .await;
    match response {
        SessionEvent::AgentResponse { text } => {
            assert_eq!(
                text,
                leasing_agent_config::constants::reasoning::REPROMPT_TEXT
            );
        }
        _ => unreachable!(),
    }
    wait_for_event(&mut harness.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged {
                new: SessionState::Listening,
                old: SessionState::Speaking,
            }
        )
    })
    .await;

    let (summary, _) = finish(harness).await;
    assert_eq!(summary.history.len(), 1);
    assert_eq!(
        summary.history.turns()[0].text,
        leasing_agent_config::constants::reasoning::REPROMPT_TEXT
    );
}

#[tokio::test]
async fn barge_in_cancels_playback_and_marks_the_turn() {
    let llm = ScriptedLlm::new(vec![text_response(
        "Let me tell you everything about every property we have ever listed...",
    )]);
    // a long reply: 200 frames at 10ms each
    let mut harness = start_session(llm, ScriptedTts::new(200, Duration::from_millis(10)));

    caller_says(&harness, "what do you have").await;
    wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::AgentResponse { .. })
    })
    .await;

    // talk over the reply until barge-in fires
    send_speech(&harness, 8).await;
    wait_for_event(&mut harness.events, |e| matches!(e, SessionEvent::BargedIn)).await;
    wait_for_event(&mut harness.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged {
                new: SessionState::Listening,
                ..
            }
        )
    })
    .await;

    let mut delivered = 0;
    while harness.audio.try_recv().is_ok() {
        delivered += 1;
    }
    assert!(delivered < 200, "playback was not cancelled");

    let (summary, _) = finish(harness).await;
    let agent_turn = summary
        .history
        .turns()
        .iter()
        .find(|t| !t.tool_calls.is_empty() || t.text.starts_with("Let me"))
        .expect("agent turn should be recorded");
    assert!(agent_turn.interrupted);
}

#[tokio::test]
async fn captured_lead_is_flushed_on_disconnect() {
    let llm = ScriptedLlm::new(vec![
        tool_response(
            "save_lead",
            json!({
                "name": "Dana Whitfield",
                "email": "dana@example.com",
                "property_interest": "boulder"
            }),
        ),
        text_response("I've saved your information. We'll reach out within 24 hours."),
    ]);
    let mut harness = start_session(llm, ScriptedTts::new(3, Duration::from_millis(2)));

    caller_says(&harness, "sign me up, dana at example dot com").await;
    wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::ToolCall { name, success: true } if name == "save_lead")
    })
    .await;
    wait_for_event(&mut harness.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged {
                new: SessionState::Listening,
                old: SessionState::Speaking,
            }
        )
    })
    .await;

    let (summary, sink) = finish(harness).await;
    assert_eq!(summary.lead.name.as_deref(), Some("Dana Whitfield"));
    assert_eq!(summary.lead.email.as_deref(), Some("dana@example.com"));
    assert_eq!(summary.lead.property_interest.as_deref(), Some("boulder"));
    assert_eq!(sink.count(), 1);
    assert_eq!(sink.all()[0].email.as_deref(), Some("dana@example.com"));
}

#[tokio::test]
async fn reasoning_failure_speaks_the_fallback() {
    // empty script: the first generate call fails
    let llm = ScriptedLlm::new(vec![]);
    let mut harness = start_session(llm, ScriptedTts::new(3, Duration::from_millis(2)));

    caller_says(&harness, "hello").await;

    let response = wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::AgentResponse { .. })
    })
    .await;
    match response {
        SessionEvent::AgentResponse { text } => {
            assert_eq!(
                text,
                leasing_agent_config::constants::reasoning::FALLBACK_TEXT
            );
        }
        _ => unreachable!(),
    }

    let (summary, _) = finish(harness).await;
    assert_eq!(summary.history.len(), 2);
    assert_eq!(summary.history.turns()[0].text, "hello");
}

#[tokio::test]
async fn synthesis_failure_retries_with_an_apology() {
    let llm = ScriptedLlm::new(vec![text_response("Here's what we have available.")]);
    let tts = ScriptedTts::new(3, Duration::from_millis(2)).failing_first(1);
    let mut harness = start_session(llm, tts);

    caller_says(&harness, "what do you have").await;

    wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::AgentResponse { text } if text == "Here's what we have available.")
    })
    .await;
    wait_for_event(&mut harness.events, |e| matches!(e, SessionEvent::Error { .. })).await;
    let apology = wait_for_event(&mut harness.events, |e| {
        matches!(e, SessionEvent::AgentResponse { .. })
    })
    .await;
    match apology {
        SessionEvent::AgentResponse { text } => {
            assert_eq!(text, leasing_agent_config::constants::reasoning::APOLOGY_TEXT);
        }
        _ => unreachable!(),
    }
    wait_for_event(&mut harness.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged {
                new: SessionState::Listening,
                old: SessionState::Speaking,
            }
        )
    })
    .await;

    // the apology's audio made it out
    let mut delivered = 0;
    while harness.audio.try_recv().is_ok() {
        delivered += 1;
    }
    assert_eq!(delivered, 3);

    let (summary, _) = finish(harness).await;
    assert_eq!(summary.reason, EndReason::Disconnected);
}

#[tokio::test]
async fn disconnect_mid_thinking_aborts_without_a_partial_turn() {
    // the model hangs forever
    let llm = ScriptedLlm::new(vec![None]);
    let mut harness = start_session(llm, ScriptedTts::new(3, Duration::from_millis(2)));

    caller_says(&harness, "are you still there").await;
    wait_for_event(&mut harness.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged {
                new: SessionState::Thinking,
                ..
            }
        )
    })
    .await;

    let (summary, sink) = finish(harness).await;
    assert_eq!(summary.reason, EndReason::Disconnected);
    assert!(summary.history.is_empty(), "no partial turn should be recorded");
    assert!(summary.lead.is_empty());
    assert_eq!(sink.count(), 0);
}
