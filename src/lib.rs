mod backoff;
pub mod capture;
mod config;
mod connection;
mod embed;
mod engine;
pub mod playback;
pub mod session;

pub use voicelink_types as types;
pub use voicelink_utils as utils;

pub use config::{Config, ConfigBuilder, DeviceProfile};
pub use connection::{ChannelStatus, SessionInfo};
pub use embed::{EmbedError, ScreenPosition, WidgetEmbed};
pub use engine::{AudioIo, Engine, EngineHandle, EngineNotification, OutputCommand};
pub use playback::AudioChunk;
pub use session::{ConversationState, InterruptionRecord, TextStream};
