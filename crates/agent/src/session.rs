//! Voice session orchestration.
//!
//! [`VoiceSession::run`] owns the whole call: it feeds inbound audio
//! through the VAD and turn segmenter, hands completed utterances to the
//! reasoning loop, and streams synthesized replies to the outbound channel.
//! Barge-in, synthesis retries, and disconnect teardown all live here.

use std::sync::Arc;
use std::time::Instant;

use leasing_agent_core::{
    AgentError, AudioFrame, ConversationHistory, ConversationTurn, LanguageModel, LeadRecord,
    LeadSink, PipelineError, TextToSpeech, TranscriptResult, VadEngine,
};
use leasing_agent_pipeline::{
    SegmenterEvent, SpeechHandle, SynthesisConfig, SynthesisController, SynthesisOutcome,
    TurnConfig, TurnSegmenter,
};
use leasing_agent_tools::ToolRegistry;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::reasoning::{ReasoningConfig, ReasoningLoop, ReasoningOutcome};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet started
    Idle,
    /// Waiting for the caller
    Listening,
    /// Reasoning over a completed utterance
    Thinking,
    /// Playing a synthesized reply
    Speaking,
    /// Barge-in received; cancelling playback
    Interrupted,
    /// Torn down
    Ended,
}

/// Inbound events from the transport.
#[derive(Debug)]
pub enum SessionInput {
    Audio(AudioFrame),
    Transcript(TranscriptResult),
    Disconnect,
}

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The transport sent an explicit disconnect
    Disconnected,
    /// The input channel closed
    InputClosed,
}

/// Observable session events, for transports and tests.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started { session_id: Uuid },
    StateChanged { old: SessionState, new: SessionState },
    Utterance { text: String },
    AgentResponse { text: String },
    ToolCall { name: String, success: bool },
    BargedIn,
    Ended { reason: EndReason },
    Error { message: String },
}

/// What the session hands back when the call ends.
#[derive(Debug)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub history: ConversationHistory,
    pub lead: LeadRecord,
    pub reason: EndReason,
}

#[derive(Debug, Clone)]
pub struct VoiceSessionConfig {
    pub turn: TurnConfig,
    pub synthesis: SynthesisConfig,
    pub reasoning: ReasoningConfig,
    /// Spoken when the session starts; `None` skips the greeting
    pub greeting: Option<String>,
    /// Spoken when the reasoning loop fails
    pub fallback_text: String,
    /// Spoken once when synthesis fails mid-reply
    pub apology_text: String,
    /// Spoken when the caller's speech never produced a final transcript
    pub reprompt_text: String,
}

impl Default for VoiceSessionConfig {
    fn default() -> Self {
        use leasing_agent_config::constants::{reasoning, session};
        Self {
            turn: TurnConfig::default(),
            synthesis: SynthesisConfig::default(),
            reasoning: ReasoningConfig::default(),
            greeting: Some(session::GREETING.to_string()),
            fallback_text: reasoning::FALLBACK_TEXT.to_string(),
            apology_text: reasoning::APOLOGY_TEXT.to_string(),
            reprompt_text: reasoning::REPROMPT_TEXT.to_string(),
        }
    }
}

impl VoiceSessionConfig {
    pub fn from_settings(settings: &leasing_agent_config::Settings) -> Self {
        Self {
            turn: TurnConfig::from(&settings.turn),
            synthesis: SynthesisConfig::default(),
            reasoning: ReasoningConfig {
                max_steps: settings.reasoning.max_steps,
                temperature: settings.llm.temperature,
                max_tokens: settings.llm.max_tokens,
            },
            greeting: if settings.session.greeting.is_empty() {
                None
            } else {
                Some(settings.session.greeting.clone())
            },
            fallback_text: settings.reasoning.fallback_text.clone(),
            apology_text: settings.reasoning.apology_text.clone(),
            reprompt_text: settings.reasoning.reprompt_text.clone(),
        }
    }
}

struct ActiveSpeech {
    handle: SpeechHandle,
    /// An apology replay gets no second retry
    is_retry: bool,
}

enum LoopEvent {
    Input(Option<SessionInput>),
    SpeechDone(SynthesisOutcome),
    ReasoningDone(Result<ReasoningOutcome, AgentError>),
}

pub struct VoiceSession {
    session_id: Uuid,
    config: VoiceSessionConfig,
    vad: Arc<dyn VadEngine>,
    segmenter: TurnSegmenter,
    synthesis: SynthesisController,
    reasoning: Arc<ReasoningLoop>,
    lead_sink: Option<Arc<dyn LeadSink>>,
    history: ConversationHistory,
    lead: LeadRecord,
    state: SessionState,
    events: broadcast::Sender<SessionEvent>,
}

impl VoiceSession {
    pub fn new(
        config: VoiceSessionConfig,
        vad: Arc<dyn VadEngine>,
        tts: Arc<dyn TextToSpeech>,
        llm: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
        lead_sink: Option<Arc<dyn LeadSink>>,
    ) -> Self {
        let segmenter = TurnSegmenter::new(config.turn.clone());
        let synthesis = SynthesisController::new(tts, config.synthesis.clone());
        let reasoning = Arc::new(ReasoningLoop::new(llm, tools, config.reasoning.clone()));
        let (events, _) = broadcast::channel(64);
        Self {
            session_id: Uuid::new_v4(),
            config,
            vad,
            segmenter,
            synthesis,
            reasoning,
            lead_sink,
            history: ConversationHistory::new(),
            lead: LeadRecord::default(),
            state: SessionState::Idle,
            events,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Drive the session to completion. Consumes the session and returns
    /// the conversation record and any captured lead.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<SessionInput>,
        audio_out: mpsc::Sender<AudioFrame>,
    ) -> SessionSummary {
        info!(session_id = %self.session_id, "session started");
        self.emit(SessionEvent::Started {
            session_id: self.session_id,
        });

        let mut speech: Option<ActiveSpeech> = None;
        let mut reasoning_task: Option<JoinHandle<Result<ReasoningOutcome, AgentError>>> = None;
        let mut pending_utterance: Option<String> = None;

        self.set_state(SessionState::Listening);
        if let Some(greeting) = self.config.greeting.clone() {
            if !greeting.is_empty() {
                self.history.push(ConversationTurn::agent(&greeting));
                self.start_speaking(&greeting, false, &audio_out, &mut speech);
            }
        }

        let reason = loop {
            let event = tokio::select! {
                input = inputs.recv() => LoopEvent::Input(input),
                outcome = Self::next_speech(&mut speech), if speech.is_some() => {
                    LoopEvent::SpeechDone(outcome)
                }
                result = Self::next_reasoning(&mut reasoning_task), if reasoning_task.is_some() => {
                    LoopEvent::ReasoningDone(result)
                }
            };

            match event {
                LoopEvent::Input(None) => break EndReason::InputClosed,
                LoopEvent::Input(Some(SessionInput::Disconnect)) => {
                    break EndReason::Disconnected
                }
                LoopEvent::Input(Some(SessionInput::Audio(frame))) => {
                    let vad_event = self.vad.process_frame(&frame);
                    let seg_event = self
                        .segmenter
                        .on_activity(vad_event.is_speech(), Instant::now());
                    self.handle_segmenter_event(
                        seg_event,
                        &audio_out,
                        &mut speech,
                        &mut reasoning_task,
                        &mut pending_utterance,
                    )
                    .await;
                }
                LoopEvent::Input(Some(SessionInput::Transcript(result))) => {
                    let seg_event = self.segmenter.on_transcript(&result, Instant::now());
                    self.handle_segmenter_event(
                        seg_event,
                        &audio_out,
                        &mut speech,
                        &mut reasoning_task,
                        &mut pending_utterance,
                    )
                    .await;
                }
                LoopEvent::SpeechDone(outcome) => {
                    self.handle_speech_done(outcome, &audio_out, &mut speech);
                }
                LoopEvent::ReasoningDone(result) => {
                    reasoning_task = None;
                    self.handle_reasoning_done(
                        result,
                        &audio_out,
                        &mut speech,
                        &mut pending_utterance,
                    );
                }
            }
        };

        self.shutdown(reason, reasoning_task, speech).await
    }

    async fn next_speech(speech: &mut Option<ActiveSpeech>) -> SynthesisOutcome {
        match speech.as_mut() {
            Some(active) => active.handle.finished().await,
            None => std::future::pending().await,
        }
    }

    async fn next_reasoning(
        task: &mut Option<JoinHandle<Result<ReasoningOutcome, AgentError>>>,
    ) -> Result<ReasoningOutcome, AgentError> {
        match task.as_mut() {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(AgentError::Task(e.to_string())),
            },
            None => std::future::pending().await,
        }
    }

    async fn handle_segmenter_event(
        &mut self,
        event: Option<SegmenterEvent>,
        audio_out: &mpsc::Sender<AudioFrame>,
        speech: &mut Option<ActiveSpeech>,
        reasoning_task: &mut Option<JoinHandle<Result<ReasoningOutcome, AgentError>>>,
        pending_utterance: &mut Option<String>,
    ) {
        match event {
            Some(SegmenterEvent::Utterance(utterance)) => {
                if self.state != SessionState::Listening {
                    debug!(
                        state = ?self.state,
                        text = %utterance.text,
                        "dropping utterance outside listening state"
                    );
                    return;
                }
                info!(text = %utterance.text, "caller turn complete");
                self.emit(SessionEvent::Utterance {
                    text: utterance.text.clone(),
                });
                self.set_state(SessionState::Thinking);
                *pending_utterance = Some(utterance.text.clone());

                let reasoning = Arc::clone(&self.reasoning);
                let history = self.history.snapshot();
                *reasoning_task = Some(tokio::spawn(async move {
                    reasoning.run(&history, &utterance.text).await
                }));
            }
            Some(SegmenterEvent::BargeIn) => {
                if self.state != SessionState::Speaking {
                    debug!(state = ?self.state, "ignoring barge-in outside playback");
                    return;
                }
                info!("caller barged in, cancelling playback");
                self.set_state(SessionState::Interrupted);
                self.emit(SessionEvent::BargedIn);

                if let Some(mut active) = speech.take() {
                    active.handle.cancel();
                    let outcome = active.handle.finished().await;
                    debug!(?outcome, "playback cancelled");
                }
                self.history.mark_last_agent_interrupted();
                self.segmenter.resume_listening(Instant::now());
                self.set_state(SessionState::Listening);
            }
            Some(SegmenterEvent::TranscriptionGap) => {
                let error = PipelineError::TranscriptionGap(
                    "no final transcript within the utterance cap".to_string(),
                );
                warn!(error = %error, "re-prompting the caller");
                self.emit(SessionEvent::Error {
                    message: error.to_string(),
                });
                if self.state == SessionState::Listening {
                    let reprompt = self.config.reprompt_text.clone();
                    self.history.push(ConversationTurn::agent(&reprompt));
                    self.start_speaking(&reprompt, false, audio_out, speech);
                }
            }
            None => {}
        }
    }

    fn handle_reasoning_done(
        &mut self,
        result: Result<ReasoningOutcome, AgentError>,
        audio_out: &mpsc::Sender<AudioFrame>,
        speech: &mut Option<ActiveSpeech>,
        pending_utterance: &mut Option<String>,
    ) {
        let utterance = pending_utterance.take();
        if self.state != SessionState::Thinking {
            debug!(state = ?self.state, "discarding reasoning result after interruption");
            return;
        }
        let utterance = utterance.unwrap_or_default();
        self.history.push(ConversationTurn::caller(&utterance));

        match result {
            Ok(outcome) => {
                for (request, result) in &outcome.tool_log {
                    self.emit(SessionEvent::ToolCall {
                        name: request.name.clone(),
                        success: result.success,
                    });
                    if request.name == "save_lead" && result.success {
                        self.merge_lead(&result.payload);
                    }
                }
                self.history.push(
                    ConversationTurn::agent(&outcome.final_text)
                        .with_tool_calls(outcome.tool_log.clone()),
                );
                self.start_speaking(&outcome.final_text, false, audio_out, speech);
            }
            Err(e) => {
                warn!(error = %e, "reasoning failed, speaking fallback");
                self.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                let fallback = self.config.fallback_text.clone();
                self.history.push(ConversationTurn::agent(&fallback));
                self.start_speaking(&fallback, false, audio_out, speech);
            }
        }
    }

    fn handle_speech_done(
        &mut self,
        outcome: SynthesisOutcome,
        audio_out: &mpsc::Sender<AudioFrame>,
        speech: &mut Option<ActiveSpeech>,
    ) {
        let active = match speech.take() {
            Some(active) => active,
            None => return,
        };

        match outcome {
            SynthesisOutcome::Completed | SynthesisOutcome::Cancelled => {
                if self.state == SessionState::Speaking {
                    self.segmenter.resume_listening(Instant::now());
                    self.set_state(SessionState::Listening);
                }
            }
            SynthesisOutcome::Failed(message) => {
                self.emit(SessionEvent::Error {
                    message: message.clone(),
                });
                if active.is_retry {
                    warn!(%message, "synthesis failed twice, giving up on this reply");
                    self.segmenter.resume_listening(Instant::now());
                    self.set_state(SessionState::Listening);
                } else {
                    warn!(%message, "synthesis failed, retrying with an apology");
                    let apology = self.config.apology_text.clone();
                    self.start_speaking(&apology, true, audio_out, speech);
                }
            }
        }
    }

    fn start_speaking(
        &mut self,
        text: &str,
        is_retry: bool,
        audio_out: &mpsc::Sender<AudioFrame>,
        speech: &mut Option<ActiveSpeech>,
    ) {
        match self.synthesis.speak(text, audio_out.clone()) {
            Ok(handle) => {
                self.segmenter.set_agent_speaking();
                self.set_state(SessionState::Speaking);
                self.emit(SessionEvent::AgentResponse {
                    text: text.to_string(),
                });
                *speech = Some(ActiveSpeech { handle, is_retry });
            }
            Err(e) => {
                warn!(error = %e, "could not start playback");
                self.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                self.segmenter.resume_listening(Instant::now());
                self.set_state(SessionState::Listening);
            }
        }
    }

    /// Fold a successful `save_lead` payload into the session's lead record.
    fn merge_lead(&mut self, payload: &serde_json::Value) {
        let lead = &payload["lead"];
        let field = |key: &str| lead[key].as_str().map(str::to_string);
        self.lead.merge(LeadRecord {
            name: field("name"),
            email: field("email"),
            phone: field("phone"),
            property_interest: field("property_interest"),
            notes: field("notes"),
            updated_at: None,
        });
    }

    async fn shutdown(
        mut self,
        reason: EndReason,
        reasoning_task: Option<JoinHandle<Result<ReasoningOutcome, AgentError>>>,
        speech: Option<ActiveSpeech>,
    ) -> SessionSummary {
        // In-flight reasoning produces no partial turn.
        if let Some(task) = reasoning_task {
            task.abort();
        }
        if let Some(mut active) = speech {
            active.handle.cancel();
            let _ = active.handle.finished().await;
        }
        self.set_state(SessionState::Ended);

        if !self.lead.is_empty() {
            if let Some(sink) = &self.lead_sink {
                if let Err(e) = sink.store(&self.lead).await {
                    warn!(error = %e, "failed to flush lead at session end");
                }
            }
        }

        info!(
            session_id = %self.session_id,
            turns = self.history.len(),
            ?reason,
            "session ended"
        );
        self.emit(SessionEvent::Ended { reason });

        SessionSummary {
            session_id: self.session_id,
            history: self.history,
            lead: self.lead,
            reason,
        }
    }

    fn set_state(&mut self, new: SessionState) {
        if self.state == new {
            return;
        }
        let old = self.state;
        self.state = new;
        debug!(?old, ?new, "session state changed");
        self.emit(SessionEvent::StateChanged { old, new });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
