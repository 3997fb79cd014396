//! Session and interruption state machine.
//!
//! Every component callback, inbound protocol message, timer firing, and UI
//! command funnels into [`SessionMachine::dispatch`], which returns the
//! side effects the engine must carry out. The machine itself never touches
//! the socket, the microphone, or the scheduler, so the full transition
//! table can be driven in tests with plain `Instant`s.
//!
//! Delayed behaviors (resume-listening debounce, the interrupted flash) are
//! modeled as named timers the machine schedules and cancels explicitly; a
//! transition out of a state cancels the timers that state armed, so a
//! stale firing can never act on the wrong state.

use crate::config::{INTERRUPT_FLASH, RESUME_LISTEN_DEBOUNCE};
use std::time::{Duration, Instant};
use voicelink_types::events::client::{
    AudioPlaybackStoppedEvent, InputAudioBufferAppendEvent, InputAudioBufferClearEvent,
    InputAudioBufferCommitEvent, LlmQueryEvent, ResponseCancelEvent,
};
use voicelink_types::{ClientEvent, ServerEvent};

/// UI-visible conversational state. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Connecting,
    Listening,
    Processing,
    Speaking,
    Streaming,
    Interrupted,
    Error,
    Muted,
}

/// Named delayed tasks owned by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    ResumeListening,
    InterruptFlash,
}

/// Everything that can drive the machine.
#[derive(Debug, Clone)]
pub enum Event {
    /// The connection manager started an open attempt.
    Connecting { attempt: u32 },
    /// The channel is open (transport level; the endpoint confirms
    /// separately with `connection_status`).
    Opened,
    /// The channel closed. `will_retry` is false for clean local closes.
    Closed { will_retry: bool },
    /// The reconnect budget is spent; the session is dead until a manual
    /// retry.
    RetriesExhausted,
    /// Inbound protocol message, in arrival order.
    Server(ServerEvent),
    /// The capture pipeline saw a voiced frame.
    Voiced,
    /// An encoded microphone frame ready for appending.
    Frame(String),
    /// The capture pipeline closed a segment at a silence boundary.
    SegmentClosed,
    /// Microphone acquisition or streaming failed.
    CaptureFailed { message: String },
    /// The playback scheduler began rendering a turn.
    PlaybackStarted,
    /// The playback scheduler drained completely.
    PlaybackFinished,
    /// A timer armed via [`Effect::Schedule`] fired.
    Timer(TimerKind),
    Mute,
    Unmute,
    /// Text-chat query from the embedding page.
    TextQuery { request_id: String, query: String },
    /// Manual reconnect after a terminal failure.
    Retry,
    /// Explicit teardown.
    Close,
}

/// Which text stream a delta belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStream {
    /// Transcript of the spoken assistant reply.
    Assistant,
    /// Reply to an `llm.query` on the text-chat sub-protocol.
    Llm,
}

/// Side effects for the engine to execute, in order.
#[derive(Debug, Clone)]
pub enum Effect {
    Send(ClientEvent),
    /// Discard the in-flight capture segment.
    ResetCapture,
    PlayEnqueue(String),
    PlayFlush,
    PlayStopAll,
    Schedule(TimerKind, Duration),
    CancelTimer(TimerKind),
    /// Open (or re-open) the channel.
    Connect,
    CloseChannel,
    TextDelta(TextStream, String),
    TextDone(TextStream),
    /// Transient user-visible status message; no state change implied.
    Notice(String),
}

/// Barge-in bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptionRecord {
    count: u32,
    last_at: Option<Instant>,
}

impl InterruptionRecord {
    fn record(&mut self, now: Instant) {
        self.count += 1;
        self.last_at = Some(now);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last_at(&self) -> Option<Instant> {
        self.last_at
    }
}

pub struct SessionMachine {
    state: ConversationState,
    muted: bool,
    channel_open: bool,
    reconnecting: bool,
    /// A response turn is in flight (commit sent or assistant speaking).
    responding: bool,
    /// The scheduler is rendering audio.
    playing: bool,
    /// Deltas of the current turn are stale after an interruption and must
    /// not reach the scheduler.
    dropping_turn: bool,
    /// The fast-path flush for the current turn has been issued.
    fast_path_done: bool,
    current_request_id: Option<String>,
    interruptions: InterruptionRecord,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: ConversationState::Idle,
            muted: false,
            channel_open: false,
            reconnecting: false,
            responding: false,
            playing: false,
            dropping_turn: false,
            fast_path_done: false,
            current_request_id: None,
            interruptions: InterruptionRecord::default(),
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn interruptions(&self) -> InterruptionRecord {
        self.interruptions
    }

    fn can_listen(&self) -> bool {
        self.channel_open && !self.reconnecting && !self.responding && !self.playing && !self.muted
    }

    fn enter_listening(&mut self, effects: &mut Vec<Effect>) {
        effects.push(Effect::ResetCapture);
        effects.push(Effect::Send(ClientEvent::InputAudioBufferClear(
            InputAudioBufferClearEvent::new(),
        )));
        self.state = ConversationState::Listening;
    }

    /// Shared teardown for any loss of the channel.
    fn on_channel_down(&mut self, effects: &mut Vec<Effect>) {
        self.channel_open = false;
        self.responding = false;
        self.playing = false;
        self.dropping_turn = false;
        self.fast_path_done = false;
        self.current_request_id = None;
        effects.push(Effect::CancelTimer(TimerKind::ResumeListening));
        effects.push(Effect::CancelTimer(TimerKind::InterruptFlash));
        effects.push(Effect::PlayStopAll);
        effects.push(Effect::ResetCapture);
    }

    /// Halt the current assistant turn. `notify_remote` distinguishes a
    /// locally detected barge-in from a `conversation.interrupted` notice.
    fn interrupt(&mut self, now: Instant, notify_remote: bool, effects: &mut Vec<Effect>) {
        effects.push(Effect::PlayStopAll);
        if notify_remote {
            effects.push(Effect::Send(ClientEvent::AudioPlaybackStopped(
                AudioPlaybackStoppedEvent::new(wall_clock_ms()),
            )));
            effects.push(Effect::Send(ClientEvent::ResponseCancel(
                ResponseCancelEvent::new(),
            )));
        }
        effects.push(Effect::CancelTimer(TimerKind::ResumeListening));
        effects.push(Effect::ResetCapture);
        effects.push(Effect::Schedule(TimerKind::InterruptFlash, INTERRUPT_FLASH));
        self.playing = false;
        self.responding = false;
        self.dropping_turn = true;
        self.fast_path_done = false;
        self.interruptions.record(now);
        self.state = ConversationState::Interrupted;
    }

    fn schedule_resume(&self, effects: &mut Vec<Effect>) {
        effects.push(Effect::Schedule(
            TimerKind::ResumeListening,
            RESUME_LISTEN_DEBOUNCE,
        ));
    }

    /// A turn ended without playback in flight; decide where to go.
    fn after_turn(&mut self, effects: &mut Vec<Effect>) {
        if self.muted {
            self.state = ConversationState::Muted;
        } else {
            self.schedule_resume(effects);
        }
    }

    pub fn dispatch(&mut self, event: Event, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            Event::Connecting { attempt } => {
                tracing::debug!(attempt, "channel connecting");
                self.channel_open = false;
                self.reconnecting = attempt > 0;
                if self.state != ConversationState::Error {
                    self.state = ConversationState::Connecting;
                }
            }
            Event::Opened => {
                self.channel_open = true;
                self.reconnecting = false;
            }
            Event::Closed { will_retry } => {
                self.on_channel_down(&mut effects);
                self.reconnecting = will_retry;
                self.state = if will_retry {
                    ConversationState::Connecting
                } else {
                    ConversationState::Idle
                };
            }
            Event::RetriesExhausted => {
                self.on_channel_down(&mut effects);
                self.reconnecting = false;
                self.state = ConversationState::Error;
                effects.push(Effect::Notice(
                    "Connection lost. Tap the widget to retry.".to_string(),
                ));
            }
            Event::Retry => {
                if matches!(
                    self.state,
                    ConversationState::Error | ConversationState::Idle
                ) {
                    self.state = ConversationState::Connecting;
                    effects.push(Effect::Connect);
                } else {
                    tracing::debug!(state = ?self.state, "retry ignored");
                }
            }
            Event::Close => {
                self.on_channel_down(&mut effects);
                effects.push(Effect::CloseChannel);
                self.state = ConversationState::Idle;
            }
            Event::Server(server) => self.on_server_event(server, now, &mut effects),
            Event::Voiced => {
                if self.state == ConversationState::Speaking && !self.muted {
                    tracing::info!("barge-in: voiced input during assistant speech");
                    self.interrupt(now, true, &mut effects);
                }
            }
            Event::Frame(audio) => {
                if self.state == ConversationState::Listening
                    && self.channel_open
                    && !self.reconnecting
                    && !self.muted
                {
                    effects.push(Effect::Send(ClientEvent::InputAudioBufferAppend(
                        InputAudioBufferAppendEvent::new(audio),
                    )));
                }
            }
            Event::SegmentClosed => {
                if self.state == ConversationState::Listening && self.channel_open {
                    effects.push(Effect::Send(ClientEvent::InputAudioBufferCommit(
                        InputAudioBufferCommitEvent::new(),
                    )));
                    self.responding = true;
                    self.state = ConversationState::Processing;
                }
            }
            Event::CaptureFailed { message } => {
                tracing::error!(message = %message, "microphone failure");
                effects.push(Effect::ResetCapture);
                effects.push(Effect::Notice(format!(
                    "Microphone unavailable: {}. Check browser permissions and retry.",
                    message
                )));
                self.state = ConversationState::Error;
            }
            Event::PlaybackStarted => {
                if !self.dropping_turn {
                    self.playing = true;
                    self.responding = true;
                    self.state = ConversationState::Speaking;
                }
            }
            Event::PlaybackFinished => {
                self.playing = false;
                if self.state == ConversationState::Speaking {
                    self.after_turn(&mut effects);
                }
            }
            Event::Timer(TimerKind::ResumeListening) => {
                if self.muted {
                    if matches!(
                        self.state,
                        ConversationState::Listening
                            | ConversationState::Processing
                            | ConversationState::Speaking
                            | ConversationState::Streaming
                            | ConversationState::Interrupted
                    ) {
                        self.state = ConversationState::Muted;
                    }
                } else if self.can_listen() {
                    self.enter_listening(&mut effects);
                }
            }
            Event::Timer(TimerKind::InterruptFlash) => {
                if self.state == ConversationState::Interrupted {
                    if self.muted {
                        self.state = ConversationState::Muted;
                    } else if self.channel_open && !self.reconnecting {
                        self.enter_listening(&mut effects);
                    }
                }
            }
            Event::Mute => {
                self.muted = true;
                effects.push(Effect::CancelTimer(TimerKind::ResumeListening));
                match self.state {
                    ConversationState::Listening | ConversationState::Interrupted => {
                        effects.push(Effect::ResetCapture);
                        if self.channel_open {
                            effects.push(Effect::Send(ClientEvent::InputAudioBufferClear(
                                InputAudioBufferClearEvent::new(),
                            )));
                        }
                        self.state = ConversationState::Muted;
                    }
                    // A turn in flight finishes; the muted flag reroutes the
                    // resume path afterwards.
                    _ => {}
                }
            }
            Event::Unmute => {
                self.muted = false;
                if self.state == ConversationState::Muted {
                    if self.can_listen() {
                        self.enter_listening(&mut effects);
                    } else if self.channel_open {
                        self.schedule_resume(&mut effects);
                    } else {
                        self.state = ConversationState::Connecting;
                    }
                }
            }
            Event::TextQuery { request_id, query } => {
                if self.responding || self.playing || self.state == ConversationState::Streaming {
                    tracing::warn!(%request_id, "text query rejected: a turn is in flight");
                } else if !self.channel_open {
                    tracing::warn!(%request_id, "text query rejected: channel not open");
                } else {
                    effects.push(Effect::CancelTimer(TimerKind::ResumeListening));
                    effects.push(Effect::ResetCapture);
                    effects.push(Effect::Send(ClientEvent::LlmQuery(LlmQueryEvent::new(
                        &request_id,
                        &query,
                    ))));
                    self.current_request_id = Some(request_id);
                    self.state = ConversationState::Streaming;
                }
            }
        }
        effects
    }

    fn on_server_event(&mut self, event: ServerEvent, now: Instant, effects: &mut Vec<Effect>) {
        match event {
            ServerEvent::ConnectionStatus(status) => {
                if status.is_connected() && self.state == ConversationState::Connecting {
                    self.schedule_resume(effects);
                } else {
                    tracing::debug!(status = status.status(), "connection status");
                }
            }
            ServerEvent::SessionCreated(session) => {
                tracing::debug!(session_id = ?session.session_id(), "session created");
            }
            ServerEvent::SessionUpdated(_) => {
                tracing::debug!("session updated");
            }
            ServerEvent::SpeechStarted(_) | ServerEvent::SpeechStopped(_) => {
                // Server-side VAD notices; the local detector drives segments.
            }
            ServerEvent::AssistantSpeechStarted(_) => {
                self.dropping_turn = false;
                self.responding = true;
                effects.push(Effect::CancelTimer(TimerKind::ResumeListening));
                effects.push(Effect::ResetCapture);
                self.state = ConversationState::Speaking;
            }
            ServerEvent::AssistantSpeechEnded(_) => {
                if !self.playing && self.state == ConversationState::Speaking {
                    self.responding = false;
                    self.after_turn(effects);
                }
            }
            ServerEvent::ConversationInterrupted(_) => {
                if self.playing || self.responding {
                    tracing::info!("turn interrupted by the endpoint");
                    self.interrupt(now, false, effects);
                }
            }
            ServerEvent::ResponseAudioDelta(delta) => {
                if self.dropping_turn {
                    tracing::debug!("dropping stale audio delta after interruption");
                    return;
                }
                self.responding = true;
                effects.push(Effect::PlayEnqueue(delta.delta().to_string()));
                if !self.fast_path_done {
                    // Start on the very first chunk instead of waiting for
                    // the backlog threshold or an end-of-stream marker.
                    self.fast_path_done = true;
                    effects.push(Effect::PlayFlush);
                }
            }
            ServerEvent::ResponseAudioDone(_) => {
                if !self.dropping_turn {
                    effects.push(Effect::PlayFlush);
                }
            }
            ServerEvent::ResponseTextDelta(delta) => {
                effects.push(Effect::TextDelta(
                    TextStream::Assistant,
                    delta.delta().to_string(),
                ));
            }
            ServerEvent::ResponseTextDone(_) => {
                effects.push(Effect::TextDone(TextStream::Assistant));
            }
            ServerEvent::ResponseDone(_) => {
                self.responding = false;
                self.fast_path_done = false;
                self.dropping_turn = false;
                if !self.playing && self.state != ConversationState::Interrupted {
                    self.after_turn(effects);
                }
            }
            ServerEvent::ResponseCancelled(_) => {
                self.responding = false;
                self.fast_path_done = false;
                self.dropping_turn = false;
                if !self.playing && self.state != ConversationState::Interrupted {
                    self.after_turn(effects);
                }
            }
            ServerEvent::Error(error) => {
                if error.error().is_empty_commit() {
                    tracing::debug!("empty commit rejected; resuming listening");
                    if self.state == ConversationState::Processing {
                        self.responding = false;
                        self.schedule_resume(effects);
                    }
                } else {
                    tracing::warn!(
                        code = ?error.error().code(),
                        message = error.error().message(),
                        "endpoint reported an error"
                    );
                    effects.push(Effect::Notice(error.error().message().to_string()));
                }
            }
            ServerEvent::Pong(_) => {
                // Liveness is accounted in the connection manager.
            }
            ServerEvent::Close { reason } => {
                tracing::debug!(?reason, "transport close frame");
            }
            ServerEvent::LlmStreamStart(start) => {
                if self.mismatched_request(start.request_id()) {
                    return;
                }
                tracing::debug!(request_id = start.request_id(), "llm stream started");
            }
            ServerEvent::LlmStreamDelta(delta) => {
                if self.mismatched_request(delta.request_id()) {
                    return;
                }
                effects.push(Effect::TextDelta(TextStream::Llm, delta.delta().to_string()));
            }
            ServerEvent::LlmStreamDone(done) => {
                if self.mismatched_request(done.request_id()) {
                    return;
                }
                effects.push(Effect::TextDone(TextStream::Llm));
                self.current_request_id = None;
                if self.state == ConversationState::Streaming {
                    self.after_turn(effects);
                }
            }
            ServerEvent::LlmStreamError(error) => {
                if self.mismatched_request(error.request_id()) {
                    return;
                }
                effects.push(Effect::TextDone(TextStream::Llm));
                effects.push(Effect::Notice(
                    error.message().unwrap_or("assistant error").to_string(),
                ));
                self.current_request_id = None;
                if self.state == ConversationState::Streaming {
                    self.after_turn(effects);
                }
            }
            ServerEvent::Ignored => {
                tracing::trace!("ignored inbound message");
            }
        }
    }

    /// Fragments for a request other than the current one are dropped, but
    /// only while a current request is set.
    fn mismatched_request(&self, request_id: &str) -> bool {
        match &self.current_request_id {
            Some(current) if current != request_id => {
                tracing::debug!(request_id, "dropping fragment for stale request");
                true
            }
            _ => false,
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn wall_clock_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(json: &str) -> Event {
        Event::Server(serde_json::from_str::<ServerEvent>(json).unwrap())
    }

    fn count_clears(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Send(ClientEvent::InputAudioBufferClear(_))))
            .count()
    }

    fn contains_send_append(effects: &[Effect]) -> bool {
        effects
            .iter()
            .any(|e| matches!(e, Effect::Send(ClientEvent::InputAudioBufferAppend(_))))
    }

    fn scheduled(effects: &[Effect], kind: TimerKind) -> bool {
        effects
            .iter()
            .any(|e| matches!(e, Effect::Schedule(k, _) if *k == kind))
    }

    /// Drive the machine to an open, listening session.
    fn listening_machine(now: Instant) -> SessionMachine {
        let mut m = SessionMachine::new();
        m.dispatch(Event::Connecting { attempt: 0 }, now);
        m.dispatch(Event::Opened, now);
        let effects = m.dispatch(
            server(r#"{"type":"connection_status","status":"connected"}"#),
            now,
        );
        assert!(scheduled(&effects, TimerKind::ResumeListening));
        let effects = m.dispatch(Event::Timer(TimerKind::ResumeListening), now);
        assert_eq!(m.state(), ConversationState::Listening);
        assert_eq!(count_clears(&effects), 1);
        m
    }

    #[test]
    fn auto_listen_emits_one_clear_before_first_append() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        let effects = m.dispatch(Event::Frame("UENN".to_string()), now);
        assert!(contains_send_append(&effects));
        assert_eq!(count_clears(&effects), 0);
    }

    #[test]
    fn frames_are_dropped_while_not_listening() {
        let now = Instant::now();
        let mut m = SessionMachine::new();
        m.dispatch(Event::Connecting { attempt: 0 }, now);
        m.dispatch(Event::Opened, now);
        let effects = m.dispatch(Event::Frame("UENN".to_string()), now);
        assert!(!contains_send_append(&effects));
    }

    #[test]
    fn commit_moves_to_processing() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        let effects = m.dispatch(Event::SegmentClosed, now);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Send(ClientEvent::InputAudioBufferCommit(_)))));
        assert_eq!(m.state(), ConversationState::Processing);
    }

    #[test]
    fn first_delta_takes_the_fast_path() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        m.dispatch(Event::SegmentClosed, now);
        let effects = m.dispatch(
            server(r#"{"type":"response.audio.delta","delta":"UENN"}"#),
            now,
        );
        assert!(effects.iter().any(|e| matches!(e, Effect::PlayEnqueue(_))));
        assert!(effects.iter().any(|e| matches!(e, Effect::PlayFlush)));
        // the second delta buffers normally
        let effects = m.dispatch(
            server(r#"{"type":"response.audio.delta","delta":"UENN"}"#),
            now,
        );
        assert!(effects.iter().any(|e| matches!(e, Effect::PlayEnqueue(_))));
        assert!(!effects.iter().any(|e| matches!(e, Effect::PlayFlush)));
    }

    #[test]
    fn barge_in_stops_playback_and_drops_stale_deltas() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        m.dispatch(Event::SegmentClosed, now);
        m.dispatch(server(r#"{"type":"assistant.speech.started"}"#), now);
        m.dispatch(
            server(r#"{"type":"response.audio.delta","delta":"UENN"}"#),
            now,
        );
        m.dispatch(Event::PlaybackStarted, now);
        assert_eq!(m.state(), ConversationState::Speaking);

        let effects = m.dispatch(Event::Voiced, now);
        assert!(effects.iter().any(|e| matches!(e, Effect::PlayStopAll)));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Send(ClientEvent::AudioPlaybackStopped(_)))));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Send(ClientEvent::ResponseCancel(_)))));
        assert_eq!(m.state(), ConversationState::Interrupted);
        assert_eq!(m.interruptions().count(), 1);

        // deltas from the interrupted turn never reach the scheduler
        let effects = m.dispatch(
            server(r#"{"type":"response.audio.delta","delta":"UENN"}"#),
            now,
        );
        assert!(effects.is_empty());

        // the flash timer returns the machine to listening
        let effects = m.dispatch(Event::Timer(TimerKind::InterruptFlash), now);
        assert_eq!(m.state(), ConversationState::Listening);
        assert_eq!(count_clears(&effects), 1);
    }

    #[test]
    fn voiced_while_listening_is_not_an_interruption() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        let effects = m.dispatch(Event::Voiced, now);
        assert!(effects.is_empty());
        assert_eq!(m.interruptions().count(), 0);
    }

    #[test]
    fn mute_while_listening_discards_segment_and_clears() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        let effects = m.dispatch(Event::Mute, now);
        assert!(effects.iter().any(|e| matches!(e, Effect::ResetCapture)));
        assert_eq!(count_clears(&effects), 1);
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::Send(ClientEvent::InputAudioBufferCommit(_)))));
        assert_eq!(m.state(), ConversationState::Muted);

        // frames and segment closes are inert while muted
        let effects = m.dispatch(Event::Frame("UENN".to_string()), now);
        assert!(!contains_send_append(&effects));
        let effects = m.dispatch(Event::SegmentClosed, now);
        assert!(effects.is_empty());
    }

    #[test]
    fn unmute_reenters_listening_when_eligible() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        m.dispatch(Event::Mute, now);
        let effects = m.dispatch(Event::Unmute, now);
        assert_eq!(m.state(), ConversationState::Listening);
        assert_eq!(count_clears(&effects), 1);
    }

    #[test]
    fn exhausted_retries_are_terminal_until_manual_retry() {
        let now = Instant::now();
        let mut m = SessionMachine::new();
        m.dispatch(Event::Connecting { attempt: 0 }, now);
        m.dispatch(Event::RetriesExhausted, now);
        assert_eq!(m.state(), ConversationState::Error);

        // inbound noise does not revive the session
        let effects = m.dispatch(Event::Timer(TimerKind::ResumeListening), now);
        assert!(effects.is_empty());
        assert_eq!(m.state(), ConversationState::Error);

        // a manual retry re-opens and the normal flow resumes
        let effects = m.dispatch(Event::Retry, now);
        assert!(effects.iter().any(|e| matches!(e, Effect::Connect)));
        assert_eq!(m.state(), ConversationState::Connecting);
        m.dispatch(Event::Opened, now);
        m.dispatch(
            server(r#"{"type":"connection_status","status":"connected"}"#),
            now,
        );
        m.dispatch(Event::Timer(TimerKind::ResumeListening), now);
        assert_eq!(m.state(), ConversationState::Listening);
    }

    #[test]
    fn empty_commit_error_silently_resumes_listening() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        m.dispatch(Event::SegmentClosed, now);
        let effects = m.dispatch(
            server(
                r#"{"type":"error","error":{"code":"input_audio_buffer_commit_empty","message":"buffer too small"}}"#,
            ),
            now,
        );
        assert!(scheduled(&effects, TimerKind::ResumeListening));
        assert!(!effects.iter().any(|e| matches!(e, Effect::Notice(_))));
        let _ = m.dispatch(Event::Timer(TimerKind::ResumeListening), now);
        assert_eq!(m.state(), ConversationState::Listening);
    }

    #[test]
    fn application_error_is_a_transient_notice() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        let effects = m.dispatch(
            server(r#"{"type":"error","error":{"code":"rate_limited","message":"slow down"}}"#),
            now,
        );
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Notice(msg) if msg == "slow down")));
        assert_eq!(m.state(), ConversationState::Listening);
    }

    #[test]
    fn post_speech_resume_is_debounced() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        m.dispatch(Event::SegmentClosed, now);
        m.dispatch(
            server(r#"{"type":"response.audio.delta","delta":"UENN"}"#),
            now,
        );
        m.dispatch(Event::PlaybackStarted, now);
        m.dispatch(server(r#"{"type":"response.done"}"#), now);
        // still speaking until the scheduler drains
        assert_eq!(m.state(), ConversationState::Speaking);
        let effects = m.dispatch(Event::PlaybackFinished, now);
        assert!(scheduled(&effects, TimerKind::ResumeListening));
        m.dispatch(Event::Timer(TimerKind::ResumeListening), now);
        assert_eq!(m.state(), ConversationState::Listening);
    }

    #[test]
    fn mute_during_speech_defers_to_turn_end() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        m.dispatch(Event::SegmentClosed, now);
        m.dispatch(
            server(r#"{"type":"response.audio.delta","delta":"UENN"}"#),
            now,
        );
        m.dispatch(Event::PlaybackStarted, now);
        m.dispatch(Event::Mute, now);
        // playback is not cut by mute
        assert_eq!(m.state(), ConversationState::Speaking);
        m.dispatch(server(r#"{"type":"response.done"}"#), now);
        m.dispatch(Event::PlaybackFinished, now);
        assert_eq!(m.state(), ConversationState::Muted);
    }

    #[test]
    fn text_query_streams_and_resumes() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        let effects = m.dispatch(
            Event::TextQuery {
                request_id: "rq_1".to_string(),
                query: "hello".to_string(),
            },
            now,
        );
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Send(ClientEvent::LlmQuery(_)))));
        assert_eq!(m.state(), ConversationState::Streaming);

        // a fragment for another request is dropped while one is current
        let effects = m.dispatch(
            server(r#"{"type":"llm.stream.delta","request_id":"rq_9","delta":"x"}"#),
            now,
        );
        assert!(effects.is_empty());

        let effects = m.dispatch(
            server(r#"{"type":"llm.stream.delta","request_id":"rq_1","delta":"hi"}"#),
            now,
        );
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::TextDelta(TextStream::Llm, text) if text == "hi")));

        let effects = m.dispatch(
            server(r#"{"type":"llm.stream.done","request_id":"rq_1"}"#),
            now,
        );
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::TextDone(TextStream::Llm))));
        assert!(scheduled(&effects, TimerKind::ResumeListening));
    }

    #[test]
    fn text_query_is_rejected_mid_voice_turn() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        m.dispatch(Event::SegmentClosed, now);
        let effects = m.dispatch(
            Event::TextQuery {
                request_id: "rq_2".to_string(),
                query: "hello".to_string(),
            },
            now,
        );
        assert!(effects.is_empty());
        assert_eq!(m.state(), ConversationState::Processing);
    }

    #[test]
    fn disconnect_mid_speech_cleans_up_and_reconnects() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        m.dispatch(Event::SegmentClosed, now);
        m.dispatch(
            server(r#"{"type":"response.audio.delta","delta":"UENN"}"#),
            now,
        );
        m.dispatch(Event::PlaybackStarted, now);
        let effects = m.dispatch(Event::Closed { will_retry: true }, now);
        assert!(effects.iter().any(|e| matches!(e, Effect::PlayStopAll)));
        assert!(effects.iter().any(|e| matches!(e, Effect::ResetCapture)));
        assert_eq!(m.state(), ConversationState::Connecting);
    }

    #[test]
    fn remote_interruption_notice_stops_playback_without_echo() {
        let now = Instant::now();
        let mut m = listening_machine(now);
        m.dispatch(Event::SegmentClosed, now);
        m.dispatch(
            server(r#"{"type":"response.audio.delta","delta":"UENN"}"#),
            now,
        );
        m.dispatch(Event::PlaybackStarted, now);
        let effects = m.dispatch(server(r#"{"type":"conversation.interrupted"}"#), now);
        assert!(effects.iter().any(|e| matches!(e, Effect::PlayStopAll)));
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::Send(ClientEvent::AudioPlaybackStopped(_)))));
        assert_eq!(m.state(), ConversationState::Interrupted);
    }
}
