//! Engine configuration.
//!
//! All timing contracts of the engine live here as wall-clock durations so
//! they survive throttled background environments. Device-dependent values
//! (heartbeat cadence, reconnect budget, capture gain, silence window) hang
//! off [`DeviceProfile`].

use secrecy::SecretString;
use std::time::Duration;

// --- Engine Constants ---

/// Samples per capture frame handed to the pipeline.
pub const CAPTURE_FRAME_SIZE: usize = 1024;
/// Peak amplitude above which a frame counts as voiced.
pub const SOUND_DETECTION_THRESHOLD: f32 = 0.02;
/// A segment must last at least this long before it may be committed.
/// Larger than either silence window, so a lone blip followed by silence
/// is held back instead of being committed as an utterance the endpoint
/// would reject as too short.
pub const MIN_SEGMENT_DURATION: Duration = Duration::from_millis(1500);
/// Samples per independently scheduled playback chunk.
pub const PLAYBACK_CHUNK_SIZE: usize = 4096;
/// Linear fade length applied at both edges of every playback chunk.
pub const PLAYBACK_FADE_SAMPLES: usize = 48;
/// Backlog size at which playback starts without an explicit flush.
pub const PLAYBACK_START_THRESHOLD: usize = 12_000;
/// How far ahead of the output clock chunks are scheduled.
pub const PLAYBACK_LOOKAHEAD: Duration = Duration::from_millis(200);
/// Lead applied when the play cursor has fallen behind the output clock.
pub const PLAYBACK_RESYNC_LEAD: Duration = Duration::from_millis(50);
/// Idle time before end-of-playback is declared, covering micro-gaps in
/// the inbound stream.
pub const PLAYBACK_DRAIN_GRACE: Duration = Duration::from_millis(250);
/// Cadence of the playback pacing tick.
pub const PLAYBACK_TICK: Duration = Duration::from_millis(30);
/// Debounce before automatically re-entering listening.
pub const RESUME_LISTEN_DEBOUNCE: Duration = Duration::from_millis(300);
/// How long the interrupted status is held before listening resumes.
pub const INTERRUPT_FLASH: Duration = Duration::from_millis(400);
/// Budget for establishing the channel before the attempt counts as failed.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Consecutive unanswered pings after which the connection is dead.
pub const MAX_MISSED_PONGS: u32 = 3;

/// Device class the widget is running on.
///
/// Mobile devices get a shorter heartbeat (aggressive background throttling
/// kills quiet sockets faster), a larger reconnect budget, a microphone gain
/// boost, and a shorter silence window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfile {
    Desktop,
    Mobile,
}

impl DeviceProfile {
    pub fn heartbeat_interval(&self) -> Duration {
        match self {
            DeviceProfile::Desktop => Duration::from_secs(15),
            DeviceProfile::Mobile => Duration::from_secs(5),
        }
    }

    pub fn reconnect_cap(&self) -> Duration {
        match self {
            DeviceProfile::Desktop => Duration::from_secs(30),
            DeviceProfile::Mobile => Duration::from_secs(60),
        }
    }

    pub fn reconnect_budget(&self) -> u32 {
        match self {
            DeviceProfile::Desktop => 5,
            DeviceProfile::Mobile => 8,
        }
    }

    pub fn capture_gain(&self) -> f32 {
        match self {
            DeviceProfile::Desktop => 1.0,
            DeviceProfile::Mobile => 2.5,
        }
    }

    pub fn silence_commit_window(&self) -> Duration {
        match self {
            DeviceProfile::Desktop => Duration::from_millis(1200),
            DeviceProfile::Mobile => Duration::from_millis(800),
        }
    }
}

pub struct Config {
    server_origin: String,
    assistant_id: String,
    auth_token: SecretString,
    profile: DeviceProfile,
    input_sample_rate: u32,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(assistant_id: &str) -> Self {
        Self {
            config: Config::new(assistant_id),
        }
    }

    pub fn with_server_origin(mut self, server_origin: &str) -> Self {
        self.config.server_origin = server_origin.trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_token(mut self, auth_token: &str) -> Self {
        self.config.auth_token = SecretString::from(auth_token.to_string());
        self
    }

    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn with_input_sample_rate(mut self, input_sample_rate: u32) -> Self {
        self.config.input_sample_rate = input_sample_rate;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Config {
    pub fn new(assistant_id: &str) -> Self {
        Self {
            server_origin: "wss://api.voicelink.dev".to_string(),
            assistant_id: assistant_id.to_string(),
            auth_token: std::env::var("VOICELINK_TOKEN")
                .unwrap_or_else(|_| "".to_string())
                .into(),
            profile: DeviceProfile::Desktop,
            input_sample_rate: voicelink_types::audio::ENDPOINT_PCM16_SAMPLE_RATE,
        }
    }

    pub fn builder(assistant_id: &str) -> ConfigBuilder {
        ConfigBuilder::new(assistant_id)
    }

    pub fn server_origin(&self) -> &str {
        &self.server_origin
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    pub fn auth_token(&self) -> &SecretString {
        &self.auth_token
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    pub fn input_sample_rate(&self) -> u32 {
        self.input_sample_rate
    }
}
