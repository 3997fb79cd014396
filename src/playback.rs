//! Playback scheduler.
//!
//! Inbound audio deltas land in a sample backlog; the scheduler cuts the
//! backlog into fixed-size chunks, fades their edges, and assigns each one
//! a start time against the output clock. A pacing tick drives scheduling
//! so network arrival rate and audio consumption rate stay decoupled. The
//! scheduler performs no audio IO: emitted chunks are handed to whatever
//! sink the engine was constructed with.

use crate::config::{
    PLAYBACK_CHUNK_SIZE, PLAYBACK_DRAIN_GRACE, PLAYBACK_FADE_SAMPLES, PLAYBACK_LOOKAHEAD,
    PLAYBACK_RESYNC_LEAD, PLAYBACK_START_THRESHOLD,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A chunk with an assigned start time, ready for the output sink.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub at: Instant,
    pub samples: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackAction {
    /// Playback of a turn began.
    Started,
    /// A chunk was scheduled; forward it to the output sink.
    Emit(AudioChunk),
    /// Backlog and scheduled chunks drained, grace period elapsed.
    Finished,
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    ends_at: Instant,
}

pub struct Scheduler {
    sample_rate: u32,
    backlog: VecDeque<f32>,
    scheduled: VecDeque<Scheduled>,
    next_play_time: Option<Instant>,
    started: bool,
    drain_pending: bool,
    drained_at: Option<Instant>,
    total_enqueued: u64,
    total_scheduled: u64,
}

impl Scheduler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            backlog: VecDeque::new(),
            scheduled: VecDeque::new(),
            next_play_time: None,
            started: false,
            drain_pending: false,
            drained_at: None,
            total_enqueued: 0,
            total_scheduled: 0,
        }
    }

    /// Decode one base64 PCM16 delta into the backlog. Returns the number
    /// of samples added; zero means the fragment was malformed and dropped.
    pub fn enqueue(&mut self, delta: &str) -> usize {
        let samples = voicelink_utils::audio::decode(delta);
        let added = samples.len();
        self.backlog.extend(samples);
        self.total_enqueued += added as u64;
        if added > 0 {
            self.drained_at = None;
        }
        added
    }

    /// Start playback without waiting for the backlog threshold, and drain
    /// any partial trailing chunk on the next tick. Used for the first
    /// delta of a turn and at end-of-stream.
    pub fn flush(&mut self) {
        if !self.backlog.is_empty() {
            self.started = true;
            self.drain_pending = true;
        }
    }

    /// Halt everything: drop scheduled chunks, clear the backlog. Safe to
    /// call from any state, any number of times.
    pub fn stop_all(&mut self) {
        self.backlog.clear();
        self.scheduled.clear();
        self.next_play_time = None;
        self.started = false;
        self.drain_pending = false;
        self.drained_at = None;
    }

    pub fn is_active(&self) -> bool {
        self.started || !self.scheduled.is_empty()
    }

    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued
    }

    pub fn total_scheduled(&self) -> u64 {
        self.total_scheduled
    }

    fn duration_of(&self, samples: usize) -> Duration {
        Duration::from_secs_f64(samples as f64 / self.sample_rate as f64)
    }

    fn lookahead_filled(&self, now: Instant) -> bool {
        match self.next_play_time {
            Some(t) if t > now => t - now >= PLAYBACK_LOOKAHEAD,
            _ => false,
        }
    }

    fn take_chunk(&mut self) -> Option<Vec<f32>> {
        if self.backlog.len() >= PLAYBACK_CHUNK_SIZE {
            Some(self.backlog.drain(..PLAYBACK_CHUNK_SIZE).collect())
        } else if self.drain_pending && !self.backlog.is_empty() {
            Some(self.backlog.drain(..).collect())
        } else {
            None
        }
    }

    /// Advance the scheduler to `now`. Emits newly scheduled chunks plus
    /// start/finish notifications.
    pub fn tick(&mut self, now: Instant) -> Vec<PlaybackAction> {
        let mut actions = Vec::new();

        while self
            .scheduled
            .front()
            .map_or(false, |chunk| chunk.ends_at <= now)
        {
            self.scheduled.pop_front();
        }

        if !self.started && self.backlog.len() >= PLAYBACK_START_THRESHOLD {
            self.started = true;
        }

        if self.started {
            let mut emitted_any = false;
            while !self.lookahead_filled(now) {
                let Some(mut samples) = self.take_chunk() else {
                    break;
                };
                if !emitted_any && self.scheduled.is_empty() && self.next_play_time.is_none() {
                    actions.push(PlaybackAction::Started);
                }
                emitted_any = true;

                voicelink_utils::audio::apply_edge_fades(&mut samples, PLAYBACK_FADE_SAMPLES);

                // The cursor never moves backwards and never lands behind
                // the output clock; after a stall it resyncs just ahead.
                let floor = now + PLAYBACK_RESYNC_LEAD;
                let start = match self.next_play_time {
                    Some(t) if t >= floor => t,
                    _ => floor,
                };
                let ends_at = start + self.duration_of(samples.len());
                self.next_play_time = Some(ends_at);
                self.total_scheduled += samples.len() as u64;
                self.scheduled.push_back(Scheduled { ends_at });
                actions.push(PlaybackAction::Emit(AudioChunk { at: start, samples }));
            }
            // A flush stays in force until the backlog has fully drained
            // once; afterwards deltas buffer into full chunks again.
            if self.backlog.is_empty() {
                self.drain_pending = false;
            }
        }

        if self.started && self.backlog.is_empty() && self.scheduled.is_empty() {
            match self.drained_at {
                None => self.drained_at = Some(now),
                Some(t) if now.saturating_duration_since(t) >= PLAYBACK_DRAIN_GRACE => {
                    self.started = false;
                    self.drained_at = None;
                    self.next_play_time = None;
                    actions.push(PlaybackAction::Finished);
                }
                Some(_) => {}
            }
        }

        actions
    }
}
