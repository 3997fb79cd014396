//! Engine wiring.
//!
//! Spawns the connection manager and the main loop, routes component
//! callbacks into the session machine, and executes the effects the machine
//! returns. The microphone frame source and the output sink are injected at
//! construction; the engine owns no ambient audio globals.

use crate::capture::{CaptureAction, CapturePipeline};
use crate::config::{Config, PLAYBACK_TICK};
use crate::connection::{self, ConnEvent, ConnectionHandle, SessionInfo};
use crate::playback::{AudioChunk, PlaybackAction, Scheduler};
use crate::session::{ConversationState, Effect, Event, SessionMachine, TextStream, TimerKind};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch};

/// Injected audio endpoints. The frame receiver carries raw microphone
/// frames; the output sender receives scheduled chunks and clear commands.
pub struct AudioIo {
    pub frames: mpsc::Receiver<Vec<f32>>,
    pub output: mpsc::Sender<OutputCommand>,
}

#[derive(Debug, Clone)]
pub enum OutputCommand {
    /// Render this chunk at its scheduled start time.
    Chunk(AudioChunk),
    /// Drop everything queued for rendering, immediately.
    Clear,
}

/// Out-of-band notifications for the embedding page.
#[derive(Debug, Clone)]
pub enum EngineNotification {
    TextDelta(TextStream, String),
    TextDone(TextStream),
    Notice(String),
}

#[derive(Clone)]
pub struct EngineHandle {
    ui_tx: mpsc::Sender<Event>,
    status_rx: watch::Receiver<ConversationState>,
    level_rx: watch::Receiver<f32>,
    info_rx: watch::Receiver<SessionInfo>,
    notify_tx: broadcast::Sender<EngineNotification>,
}

impl EngineHandle {
    pub async fn mute(&self) {
        let _ = self.ui_tx.send(Event::Mute).await;
    }

    pub async fn unmute(&self) {
        let _ = self.ui_tx.send(Event::Unmute).await;
    }

    /// Manual reconnect after the retry budget was exhausted.
    pub async fn retry(&self) {
        let _ = self.ui_tx.send(Event::Retry).await;
    }

    pub async fn close(&self) {
        let _ = self.ui_tx.send(Event::Close).await;
    }

    /// Issue a text-chat query. Rejected (logged) while a voice turn is in
    /// flight; text and voice turns are strictly serialized.
    pub async fn text_query(&self, request_id: &str, query: &str) {
        let _ = self
            .ui_tx
            .send(Event::TextQuery {
                request_id: request_id.to_string(),
                query: query.to_string(),
            })
            .await;
    }

    /// UI-visible conversational state.
    pub fn status(&self) -> watch::Receiver<ConversationState> {
        self.status_rx.clone()
    }

    /// Current input level for the listening indicator.
    pub fn input_level(&self) -> watch::Receiver<f32> {
        self.level_rx.clone()
    }

    /// Transport-level session bookkeeping.
    pub fn session_info(&self) -> watch::Receiver<SessionInfo> {
        self.info_rx.clone()
    }

    pub fn notifications(&self) -> broadcast::Receiver<EngineNotification> {
        self.notify_tx.subscribe()
    }
}

pub struct Engine;

impl Engine {
    /// Start the engine and begin connecting. Must be called on a tokio
    /// runtime.
    pub fn start(config: Config, audio: AudioIo) -> EngineHandle {
        let profile = config.profile();
        let sample_rate = config.input_sample_rate();

        let (conn_tx, conn_rx) = mpsc::channel::<ConnEvent>(256);
        let (conn, info_rx) = connection::spawn(config, conn_tx);

        let (ui_tx, ui_rx) = mpsc::channel::<Event>(32);
        let (status_tx, status_rx) = watch::channel(ConversationState::Idle);
        let (level_tx, level_rx) = watch::channel(0.0f32);
        let (notify_tx, _) = broadcast::channel(64);

        let runtime = Runtime {
            machine: SessionMachine::new(),
            pipeline: CapturePipeline::new(profile),
            scheduler: Scheduler::new(sample_rate),
            conn,
            output: audio.output,
            status_tx,
            level_tx,
            notify_tx: notify_tx.clone(),
            timers: HashMap::new(),
            timer_tx: None,
        };
        tokio::spawn(run(runtime, conn_rx, audio.frames, ui_rx));

        EngineHandle {
            ui_tx,
            status_rx,
            level_rx,
            info_rx,
            notify_tx,
        }
    }
}

struct Runtime {
    machine: SessionMachine,
    pipeline: CapturePipeline,
    scheduler: Scheduler,
    conn: ConnectionHandle,
    output: mpsc::Sender<OutputCommand>,
    status_tx: watch::Sender<ConversationState>,
    level_tx: watch::Sender<f32>,
    notify_tx: broadcast::Sender<EngineNotification>,
    timers: HashMap<TimerKind, tokio::task::JoinHandle<()>>,
    timer_tx: Option<mpsc::Sender<TimerKind>>,
}

impl Runtime {
    async fn dispatch(&mut self, event: Event) {
        let effects = self.machine.dispatch(event, Instant::now());
        for effect in effects {
            self.execute(effect).await;
        }
        let state = self.machine.state();
        if *self.status_tx.borrow() != state {
            let _ = self.status_tx.send(state);
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Send(event) => self.conn.send(event).await,
            Effect::ResetCapture => self.pipeline.reset_segment(),
            Effect::PlayEnqueue(delta) => {
                self.scheduler.enqueue(&delta);
            }
            Effect::PlayFlush => self.scheduler.flush(),
            Effect::PlayStopAll => {
                self.scheduler.stop_all();
                let _ = self.output.send(OutputCommand::Clear).await;
            }
            Effect::Schedule(kind, delay) => {
                if let Some(handle) = self.timers.remove(&kind) {
                    handle.abort();
                }
                if let Some(timer_tx) = self.timer_tx.clone() {
                    self.timers.insert(
                        kind,
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = timer_tx.send(kind).await;
                        }),
                    );
                }
            }
            Effect::CancelTimer(kind) => {
                if let Some(handle) = self.timers.remove(&kind) {
                    handle.abort();
                }
            }
            Effect::Connect => self.conn.open().await,
            Effect::CloseChannel => self.conn.close().await,
            Effect::TextDelta(stream, text) => {
                let _ = self
                    .notify_tx
                    .send(EngineNotification::TextDelta(stream, text));
            }
            Effect::TextDone(stream) => {
                let _ = self.notify_tx.send(EngineNotification::TextDone(stream));
            }
            Effect::Notice(message) => {
                let _ = self.notify_tx.send(EngineNotification::Notice(message));
            }
        }
    }

    async fn on_frame(&mut self, frame: Vec<f32>) {
        let actions = self.pipeline.push_frame(&frame, Instant::now());
        for action in actions {
            match action {
                CaptureAction::Level(level) => {
                    let _ = self.level_tx.send(level);
                }
                CaptureAction::Voiced => self.dispatch(Event::Voiced).await,
                CaptureAction::Append(audio) => self.dispatch(Event::Frame(audio)).await,
                CaptureAction::Commit => self.dispatch(Event::SegmentClosed).await,
            }
        }
    }

    async fn on_tick(&mut self) {
        for action in self.scheduler.tick(Instant::now()) {
            match action {
                PlaybackAction::Started => self.dispatch(Event::PlaybackStarted).await,
                PlaybackAction::Emit(chunk) => {
                    let _ = self.output.send(OutputCommand::Chunk(chunk)).await;
                }
                PlaybackAction::Finished => self.dispatch(Event::PlaybackFinished).await,
            }
        }
    }
}

enum Wake {
    Conn(ConnEvent),
    ConnGone,
    Frame(Vec<f32>),
    FramesGone,
    Tick,
    Ui(Event),
    UiGone,
    Timer(TimerKind),
}

async fn run(
    mut runtime: Runtime,
    mut conn_rx: mpsc::Receiver<ConnEvent>,
    mut frames: mpsc::Receiver<Vec<f32>>,
    mut ui_rx: mpsc::Receiver<Event>,
) {
    let (timer_tx, mut timer_rx) = mpsc::channel::<TimerKind>(32);
    runtime.timer_tx = Some(timer_tx);

    runtime.conn.open().await;

    let mut tick = tokio::time::interval(PLAYBACK_TICK);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut frames_open = true;

    loop {
        let wake = tokio::select! {
            maybe = conn_rx.recv() => maybe.map(Wake::Conn).unwrap_or(Wake::ConnGone),
            maybe = frames.recv(), if frames_open => {
                maybe.map(Wake::Frame).unwrap_or(Wake::FramesGone)
            }
            _ = tick.tick() => Wake::Tick,
            maybe = ui_rx.recv() => maybe.map(Wake::Ui).unwrap_or(Wake::UiGone),
            maybe = timer_rx.recv() => match maybe {
                Some(kind) => Wake::Timer(kind),
                None => continue,
            },
        };

        match wake {
            Wake::Conn(event) => {
                let event = match event {
                    ConnEvent::Connecting { attempt } => Event::Connecting { attempt },
                    ConnEvent::Opened => Event::Opened,
                    ConnEvent::Message(server) => Event::Server(server),
                    ConnEvent::Closed { will_retry, .. } => Event::Closed { will_retry },
                    ConnEvent::Exhausted => Event::RetriesExhausted,
                };
                runtime.dispatch(event).await;
            }
            Wake::ConnGone => break,
            Wake::Frame(frame) => runtime.on_frame(frame).await,
            Wake::FramesGone => {
                frames_open = false;
                runtime
                    .dispatch(Event::CaptureFailed {
                        message: "microphone stream ended".to_string(),
                    })
                    .await;
            }
            Wake::Tick => runtime.on_tick().await,
            Wake::Ui(event) => runtime.dispatch(event).await,
            Wake::UiGone => {
                runtime.dispatch(Event::Close).await;
                break;
            }
            Wake::Timer(kind) => {
                runtime.timers.remove(&kind);
                runtime.dispatch(Event::Timer(kind)).await;
            }
        }
    }
}
