use crate::audio::Base64EncodedAudioBytes;

/// `input_audio_buffer.append` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferAppendEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,

    /// The audio data to append to the remote input buffer
    audio: Base64EncodedAudioBytes,
}

impl InputAudioBufferAppendEvent {
    pub fn new(audio: Base64EncodedAudioBytes) -> Self {
        Self {
            event_id: None,
            audio,
        }
    }
    pub fn with_event_id(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }

    pub fn audio(&self) -> &Base64EncodedAudioBytes {
        &self.audio
    }
}

/// `input_audio_buffer.commit` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferCommitEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
}

impl InputAudioBufferCommitEvent {
    pub fn new() -> Self {
        Self { event_id: None }
    }
    pub fn with_event_id(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }
}

impl Default for InputAudioBufferCommitEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// `input_audio_buffer.clear` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferClearEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
}

impl InputAudioBufferClearEvent {
    pub fn new() -> Self {
        Self { event_id: None }
    }
    pub fn with_event_id(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }
}

impl Default for InputAudioBufferClearEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// `response.cancel` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseCancelEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
}

impl ResponseCancelEvent {
    pub fn new() -> Self {
        Self { event_id: None }
    }
    pub fn with_event_id(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }
}

impl Default for ResponseCancelEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// `audio_playback.stopped` event
///
/// Sent after local playback has been halted mid-turn so the endpoint can
/// truncate its view of what the user actually heard.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioPlaybackStoppedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,

    /// Wall-clock milliseconds at which playback was stopped
    timestamp: u64,
}

impl AudioPlaybackStoppedEvent {
    pub fn new(timestamp: u64) -> Self {
        Self {
            event_id: None,
            timestamp,
        }
    }
    pub fn with_event_id(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

/// `ping` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PingEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
}

impl PingEvent {
    pub fn new() -> Self {
        Self { event_id: None }
    }
    pub fn with_event_id(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }
}

impl Default for PingEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// `llm.query` event
///
/// Entry point of the text-chat sub-protocol. The reply streams back as
/// `llm.stream.*` events carrying the same request id.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LlmQueryEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,

    /// Correlates the streamed reply with this query
    request_id: String,
    /// The user's text query
    query: String,
}

impl LlmQueryEvent {
    pub fn new(request_id: &str, query: &str) -> Self {
        Self {
            event_id: None,
            request_id: request_id.to_string(),
            query: query.to_string(),
        }
    }
    pub fn with_event_id(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}
