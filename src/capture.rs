//! Audio capture pipeline.
//!
//! The pipeline is fed raw microphone frames and decides, frame by frame,
//! what the session should do with them: forward an encoded append, open or
//! close a capture segment, report the input level. It performs no IO of its
//! own; the engine routes every action through the state machine, which is
//! where "is the channel open, are we muted, is the assistant speaking" is
//! judged. Timing is wall-clock, so a throttled tab stretches silence
//! rather than miscounting frames.

use crate::config::{DeviceProfile, MIN_SEGMENT_DURATION, SOUND_DETECTION_THRESHOLD};
use std::time::{Duration, Instant};
use voicelink_types::audio::Base64EncodedAudioBytes;

/// Per-frame outcome handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureAction {
    /// Peak amplitude of the frame after gain, for the listening indicator.
    Level(f32),
    /// The frame was voiced. Fires for every voiced frame so the machine
    /// can detect barge-in while the assistant is speaking.
    Voiced,
    /// Encoded frame ready to be appended to the remote input buffer.
    Append(Base64EncodedAudioBytes),
    /// Silence persisted long enough to close the current segment.
    Commit,
}

/// An open recording span. Opened on the first voiced frame after silence,
/// closed by [`CapturePipeline::push_frame`] when the commit conditions are
/// met, discarded by [`CapturePipeline::reset_segment`].
#[derive(Debug, Clone, Copy)]
struct Segment {
    opened_at: Instant,
    has_voiced: bool,
    last_voiced_at: Instant,
}

pub struct CapturePipeline {
    gain: f32,
    silence_window: Duration,
    min_segment: Duration,
    threshold: f32,
    segment: Option<Segment>,
}

impl CapturePipeline {
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            gain: profile.capture_gain(),
            silence_window: profile.silence_commit_window(),
            min_segment: MIN_SEGMENT_DURATION,
            threshold: SOUND_DETECTION_THRESHOLD,
            segment: None,
        }
    }

    /// Process one microphone frame.
    pub fn push_frame(&mut self, samples: &[f32], now: Instant) -> Vec<CaptureAction> {
        if samples.is_empty() {
            return Vec::new();
        }

        let mut actions = Vec::with_capacity(4);

        let gained: Vec<f32> = samples.iter().map(|s| (s * self.gain).clamp(-1.0, 1.0)).collect();
        let peak = gained.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        actions.push(CaptureAction::Level(peak));

        let voiced = peak > self.threshold;
        if voiced {
            actions.push(CaptureAction::Voiced);
            match self.segment.as_mut() {
                Some(segment) => {
                    segment.has_voiced = true;
                    segment.last_voiced_at = now;
                }
                None => {
                    self.segment = Some(Segment {
                        opened_at: now,
                        has_voiced: true,
                        last_voiced_at: now,
                    });
                    tracing::debug!("capture segment opened");
                }
            }
        }

        actions.push(CaptureAction::Append(voicelink_utils::audio::encode(&gained)));

        if let Some(segment) = self.segment {
            let silence = now.saturating_duration_since(segment.last_voiced_at);
            let length = now.saturating_duration_since(segment.opened_at);
            if silence >= self.silence_window && segment.has_voiced && length >= self.min_segment {
                tracing::debug!(segment_ms = length.as_millis() as u64, "capture segment committed");
                self.segment = None;
                actions.push(CaptureAction::Commit);
            }
        }

        actions
    }

    /// Discard the in-flight segment without committing it. Used on mute,
    /// on channel loss, and whenever the machine leaves listening.
    pub fn reset_segment(&mut self) {
        if self.segment.take().is_some() {
            tracing::debug!("capture segment discarded");
        }
    }

    pub fn segment_open(&self) -> bool {
        self.segment.is_some()
    }
}
