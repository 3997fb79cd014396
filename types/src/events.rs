pub mod client;
pub mod server;

use client::*;
use server::*;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend(InputAudioBufferAppendEvent),
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit(InputAudioBufferCommitEvent),
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear(InputAudioBufferClearEvent),
    #[serde(rename = "response.cancel")]
    ResponseCancel(ResponseCancelEvent),
    #[serde(rename = "audio_playback.stopped")]
    AudioPlaybackStopped(AudioPlaybackStoppedEvent),
    #[serde(rename = "ping")]
    Ping(PingEvent),
    #[serde(rename = "llm.query")]
    LlmQuery(LlmQueryEvent),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Synthesized locally when the transport closes; never sent on the wire.
    #[serde(rename = "close")]
    Close { reason: Option<String> },
    #[serde(rename = "connection_status")]
    ConnectionStatus(ConnectionStatusEvent),
    #[serde(rename = "session.created")]
    SessionCreated(SessionCreatedEvent),
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionUpdatedEvent),
    #[serde(rename = "speech.started")]
    SpeechStarted(SpeechStartedEvent),
    #[serde(rename = "speech.stopped")]
    SpeechStopped(SpeechStoppedEvent),
    #[serde(rename = "assistant.speech.started")]
    AssistantSpeechStarted(AssistantSpeechStartedEvent),
    #[serde(rename = "assistant.speech.ended")]
    AssistantSpeechEnded(AssistantSpeechEndedEvent),
    #[serde(rename = "conversation.interrupted")]
    ConversationInterrupted(ConversationInterruptedEvent),
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta(ResponseAudioDeltaEvent),
    #[serde(rename = "response.audio.done")]
    ResponseAudioDone(ResponseAudioDoneEvent),
    #[serde(rename = "response.text.delta")]
    ResponseTextDelta(ResponseTextDeltaEvent),
    #[serde(rename = "response.text.done")]
    ResponseTextDone(ResponseTextDoneEvent),
    #[serde(rename = "response.done")]
    ResponseDone(ResponseDoneEvent),
    #[serde(rename = "response.cancelled")]
    ResponseCancelled(ResponseCancelledEvent),
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "pong")]
    Pong(PongEvent),
    #[serde(rename = "llm.stream.start")]
    LlmStreamStart(LlmStreamStartEvent),
    #[serde(rename = "llm.stream.delta")]
    LlmStreamDelta(LlmStreamDeltaEvent),
    #[serde(rename = "llm.stream.done")]
    LlmStreamDone(LlmStreamDoneEvent),
    #[serde(rename = "llm.stream.error")]
    LlmStreamError(LlmStreamErrorEvent),
    /// Any type the engine does not consume, including `*.ack` echoes.
    /// Decoded without error and dropped by the state machine.
    #[serde(other)]
    Ignored,
}
