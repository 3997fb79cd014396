/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

/// Sample rate of the PCM16 audio streamed by the voice endpoint, in both
/// directions. The output engine must be configured at the same rate to
/// avoid resampling artifacts.
pub const ENDPOINT_PCM16_SAMPLE_RATE: u32 = 24_000;
