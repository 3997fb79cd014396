//! End-to-end scenarios over the assembled core: session machine, capture
//! pipeline, and playback scheduler wired together by a miniature effect
//! executor, driven with explicit instants instead of real timers.

use std::time::{Duration, Instant};
use voicelink::capture::{CaptureAction, CapturePipeline};
use voicelink::playback::{PlaybackAction, Scheduler};
use voicelink::session::{ConversationState, Effect, Event, SessionMachine, TimerKind};
use voicelink::types::{ClientEvent, ServerEvent};
use voicelink::DeviceProfile;

/// Executes machine effects against the real scheduler and pipeline, and
/// records outbound protocol messages, the way the engine loop does.
struct Harness {
    machine: SessionMachine,
    pipeline: CapturePipeline,
    scheduler: Scheduler,
    sent: Vec<ClientEvent>,
    pending_timers: Vec<TimerKind>,
}

impl Harness {
    fn new() -> Self {
        Self {
            machine: SessionMachine::new(),
            pipeline: CapturePipeline::new(DeviceProfile::Desktop),
            scheduler: Scheduler::new(24_000),
            sent: Vec::new(),
            pending_timers: Vec::new(),
        }
    }

    fn dispatch(&mut self, event: Event, now: Instant) {
        for effect in self.machine.dispatch(event, now) {
            match effect {
                Effect::Send(message) => self.sent.push(message),
                Effect::ResetCapture => self.pipeline.reset_segment(),
                Effect::PlayEnqueue(delta) => {
                    self.scheduler.enqueue(&delta);
                }
                Effect::PlayFlush => self.scheduler.flush(),
                Effect::PlayStopAll => self.scheduler.stop_all(),
                Effect::Schedule(kind, _) => {
                    self.pending_timers.retain(|k| *k != kind);
                    self.pending_timers.push(kind);
                }
                Effect::CancelTimer(kind) => self.pending_timers.retain(|k| *k != kind),
                Effect::Connect | Effect::CloseChannel => {}
                Effect::TextDelta(..) | Effect::TextDone(_) | Effect::Notice(_) => {}
            }
        }
    }

    /// Fire every pending timer, as if its delay elapsed.
    fn fire_timers(&mut self, now: Instant) {
        let timers = std::mem::take(&mut self.pending_timers);
        for kind in timers {
            self.dispatch(Event::Timer(kind), now);
        }
    }

    fn push_frame(&mut self, samples: &[f32], now: Instant) {
        let actions = self.pipeline.push_frame(samples, now);
        for action in actions {
            match action {
                CaptureAction::Level(_) => {}
                CaptureAction::Voiced => self.dispatch(Event::Voiced, now),
                CaptureAction::Append(audio) => self.dispatch(Event::Frame(audio), now),
                CaptureAction::Commit => self.dispatch(Event::SegmentClosed, now),
            }
        }
    }

    fn tick(&mut self, now: Instant) {
        for action in self.scheduler.tick(now) {
            match action {
                PlaybackAction::Started => self.dispatch(Event::PlaybackStarted, now),
                PlaybackAction::Emit(_) => {}
                PlaybackAction::Finished => self.dispatch(Event::PlaybackFinished, now),
            }
        }
    }

    fn server(&mut self, json: &str, now: Instant) {
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        self.dispatch(Event::Server(event), now);
    }

    fn connect(&mut self, now: Instant) {
        self.dispatch(Event::Connecting { attempt: 0 }, now);
        self.dispatch(Event::Opened, now);
        self.server(r#"{"type":"connection_status","status":"connected"}"#, now);
        self.fire_timers(now);
    }

    fn clears_sent(&self) -> usize {
        self.sent
            .iter()
            .filter(|m| matches!(m, ClientEvent::InputAudioBufferClear(_)))
            .count()
    }

    fn appends_sent(&self) -> usize {
        self.sent
            .iter()
            .filter(|m| matches!(m, ClientEvent::InputAudioBufferAppend(_)))
            .count()
    }

    fn commits_sent(&self) -> usize {
        self.sent
            .iter()
            .filter(|m| matches!(m, ClientEvent::InputAudioBufferCommit(_)))
            .count()
    }
}

fn voiced() -> Vec<f32> {
    vec![0.3f32; 512]
}

fn silent() -> Vec<f32> {
    vec![0.0f32; 512]
}

fn delta_json(samples: usize) -> String {
    format!(
        r#"{{"type":"response.audio.delta","delta":"{}"}}"#,
        voicelink::utils::audio::encode(&vec![0.4f32; samples])
    )
}

#[test]
fn connect_then_listen_emits_one_clear_before_first_append() {
    let t0 = Instant::now();
    let mut h = Harness::new();
    h.connect(t0);
    assert_eq!(h.machine.state(), ConversationState::Listening);
    assert_eq!(h.clears_sent(), 1);
    assert_eq!(h.appends_sent(), 0);

    h.push_frame(&voiced(), t0 + Duration::from_millis(50));
    assert_eq!(h.appends_sent(), 1);
    assert_eq!(h.clears_sent(), 1);
}

#[test]
fn utterance_commits_then_reply_plays_and_listening_resumes() {
    let t0 = Instant::now();
    let mut h = Harness::new();
    h.connect(t0);

    // two seconds of speech, then enough silence to commit
    let mut now = t0;
    for _ in 0..40 {
        h.push_frame(&voiced(), now);
        now += Duration::from_millis(50);
    }
    h.push_frame(&silent(), now + Duration::from_millis(1300));
    assert_eq!(h.commits_sent(), 1);
    assert_eq!(h.machine.state(), ConversationState::Processing);

    // streamed reply: fast path starts playback on the first chunk
    now += Duration::from_millis(1400);
    h.server(&delta_json(2400), now);
    h.tick(now);
    assert_eq!(h.machine.state(), ConversationState::Speaking);

    // reply finishes and drains; listening resumes after the debounce
    h.server(r#"{"type":"response.audio.done"}"#, now);
    h.server(r#"{"type":"response.done"}"#, now);
    let mut later = now;
    for _ in 0..40 {
        later += Duration::from_millis(30);
        h.tick(later);
    }
    h.fire_timers(later);
    assert_eq!(h.machine.state(), ConversationState::Listening);
    assert_eq!(h.clears_sent(), 2);
}

#[test]
fn first_chunk_plays_during_a_five_second_stream_stall() {
    let t0 = Instant::now();
    let mut h = Harness::new();
    h.connect(t0);

    h.server(&delta_json(2400), t0);
    h.tick(t0);
    // playback started on the lone chunk with no done marker in sight
    assert_eq!(h.machine.state(), ConversationState::Speaking);
    assert!(h.scheduler.total_scheduled() > 0);

    // five silent seconds: no crash, no new audio needed
    let mut now = t0;
    for _ in 0..160 {
        now += Duration::from_millis(31);
        h.tick(now);
    }
    assert_eq!(
        h.scheduler.total_scheduled(),
        h.scheduler.total_enqueued()
    );
}

#[test]
fn barge_in_renders_nothing_further_from_the_interrupted_turn() {
    let t0 = Instant::now();
    let mut h = Harness::new();
    h.connect(t0);

    h.server(r#"{"type":"assistant.speech.started"}"#, t0);
    h.server(&delta_json(4096), t0);
    h.tick(t0);
    assert_eq!(h.machine.state(), ConversationState::Speaking);
    let rendered_before = h.scheduler.total_scheduled();
    assert!(rendered_before > 0);

    // user speaks over the assistant
    let now = t0 + Duration::from_millis(100);
    h.push_frame(&voiced(), now);
    assert_eq!(h.machine.state(), ConversationState::Interrupted);
    assert!(h
        .sent
        .iter()
        .any(|m| matches!(m, ClientEvent::AudioPlaybackStopped(_))));
    assert!(h
        .sent
        .iter()
        .any(|m| matches!(m, ClientEvent::ResponseCancel(_))));

    // stale deltas keep arriving; none of them is ever scheduled
    for i in 0..5 {
        let later = now + Duration::from_millis(40 * (i + 1));
        h.server(&delta_json(4096), later);
        h.tick(later);
    }
    assert_eq!(h.scheduler.total_scheduled(), rendered_before);
    assert_eq!(h.machine.interruptions().count(), 1);

    // the flash settles back into listening
    h.fire_timers(now + Duration::from_millis(500));
    assert_eq!(h.machine.state(), ConversationState::Listening);
}

#[test]
fn mute_discards_open_segment_and_never_commits_it() {
    let t0 = Instant::now();
    let mut h = Harness::new();
    h.connect(t0);

    // an open, voiced segment
    let mut now = t0;
    for _ in 0..10 {
        h.push_frame(&voiced(), now);
        now += Duration::from_millis(50);
    }
    let appends_before = h.appends_sent();
    assert!(appends_before > 0);

    h.dispatch(Event::Mute, now);
    assert_eq!(h.machine.state(), ConversationState::Muted);
    assert_eq!(h.clears_sent(), 2);

    // a long quiet stretch after the discarded segment: nothing commits,
    // nothing is appended
    for i in 0..60u32 {
        h.push_frame(&silent(), now + Duration::from_millis(50 * i as u64));
    }
    assert_eq!(h.commits_sent(), 0);
    assert_eq!(h.appends_sent(), appends_before);

    // unmute returns to listening
    h.dispatch(Event::Unmute, now + Duration::from_secs(5));
    assert_eq!(h.machine.state(), ConversationState::Listening);
}

#[test]
fn played_samples_match_enqueued_samples_across_a_whole_turn() {
    let t0 = Instant::now();
    let mut h = Harness::new();
    h.connect(t0);

    let mut now = t0;
    for len in [1200usize, 4096, 2400, 9000, 333] {
        h.server(&delta_json(len), now);
        now += Duration::from_millis(40);
        h.tick(now);
    }
    h.server(r#"{"type":"response.audio.done"}"#, now);
    for _ in 0..80 {
        now += Duration::from_millis(30);
        h.tick(now);
    }
    assert_eq!(h.scheduler.total_enqueued(), 1200 + 4096 + 2400 + 9000 + 333);
    assert_eq!(h.scheduler.total_scheduled(), h.scheduler.total_enqueued());
}
