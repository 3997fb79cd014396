//! Connection manager.
//!
//! Owns the channel lifecycle end to end: opening with a timeout, the
//! send/receive halves of the socket, the ping/pong heartbeat, and the
//! exponential-backoff reconnect loop. It is the only component that writes
//! to the channel; everything it learns flows to the engine as [`ConnEvent`]s
//! and it never touches audio state.

use crate::backoff::Backoff;
use crate::config::{Config, CONNECT_TIMEOUT, MAX_MISSED_PONGS};
use futures_util::{SinkExt, StreamExt};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use voicelink_types::{ClientEvent, ServerEvent};

mod utils;

/// Transport-level channel status. Mutated only here; the session machine
/// owns the conversational state layered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

/// Connection bookkeeping surfaced to the embedding page.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub status: ChannelStatus,
    pub retry_count: u32,
    pub assistant_id: String,
    pub last_ping_at: Option<Instant>,
    pub last_pong_at: Option<Instant>,
}

impl SessionInfo {
    fn new(assistant_id: &str) -> Self {
        Self {
            status: ChannelStatus::Idle,
            retry_count: 0,
            assistant_id: assistant_id.to_string(),
            last_ping_at: None,
            last_pong_at: None,
        }
    }
}

#[derive(Debug)]
pub enum ConnCommand {
    Open,
    Close,
    Send(ClientEvent),
}

#[derive(Debug, Clone)]
pub enum ConnEvent {
    Connecting { attempt: u32 },
    Opened,
    Message(ServerEvent),
    Closed { clean: bool, will_retry: bool },
    Exhausted,
}

#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<ConnCommand>,
}

impl ConnectionHandle {
    pub async fn open(&self) {
        let _ = self.cmd_tx.send(ConnCommand::Open).await;
    }

    pub async fn close(&self) {
        let _ = self.cmd_tx.send(ConnCommand::Close).await;
    }

    /// Queue a message for the channel. Dropped with a log line by the
    /// manager when the channel is not open.
    pub async fn send(&self, event: ClientEvent) {
        let _ = self.cmd_tx.send(ConnCommand::Send(event)).await;
    }
}

/// Spawn the manager task. The channel stays idle until
/// [`ConnectionHandle::open`] is called.
pub fn spawn(
    config: Config,
    events: mpsc::Sender<ConnEvent>,
) -> (ConnectionHandle, watch::Receiver<SessionInfo>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let (info_tx, info_rx) = watch::channel(SessionInfo::new(config.assistant_id()));
    tokio::spawn(run(config, cmd_rx, events, info_tx));
    (ConnectionHandle { cmd_tx }, info_rx)
}

enum CloseKind {
    /// Explicit local close; never retried.
    Local,
    /// Remote close, transport error, or heartbeat loss; retried.
    Remote,
    /// The engine is gone.
    Shutdown,
}

enum WaitOutcome {
    Elapsed,
    CloseRequested,
    ChannelGone,
}

async fn run(
    config: Config,
    mut cmd_rx: mpsc::Receiver<ConnCommand>,
    events: mpsc::Sender<ConnEvent>,
    info: watch::Sender<SessionInfo>,
) {
    let profile = config.profile();

    'idle: loop {
        // Disconnected and not retrying. Only an Open command leaves this
        // state; sends are no-ops by contract.
        match cmd_rx.recv().await {
            Some(ConnCommand::Open) => {}
            Some(ConnCommand::Close) => continue,
            Some(ConnCommand::Send(_)) => {
                tracing::warn!("channel not open, dropping message");
                continue;
            }
            None => return,
        }

        let mut backoff = Backoff::new(profile);
        loop {
            let attempt = backoff.attempts();
            info.send_modify(|i| {
                i.status = ChannelStatus::Connecting;
                i.retry_count = attempt;
            });
            if events.send(ConnEvent::Connecting { attempt }).await.is_err() {
                return;
            }

            let opened = match utils::build_request(&config) {
                Ok(request) => {
                    match tokio::time::timeout(
                        CONNECT_TIMEOUT,
                        tokio_tungstenite::connect_async(request),
                    )
                    .await
                    {
                        Ok(Ok((ws_stream, _))) => Some(ws_stream),
                        Ok(Err(e)) => {
                            tracing::error!("failed to open channel: {}", e);
                            None
                        }
                        Err(_) => {
                            tracing::error!("channel open timed out");
                            None
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("failed to build request: {}", e);
                    None
                }
            };

            let close = match opened {
                Some(ws_stream) => {
                    backoff.reset();
                    info.send_modify(|i| {
                        i.status = ChannelStatus::Open;
                        i.retry_count = 0;
                    });
                    if events.send(ConnEvent::Opened).await.is_err() {
                        return;
                    }
                    drive(ws_stream, &mut cmd_rx, &events, &info, &config).await
                }
                None => CloseKind::Remote,
            };

            match close {
                CloseKind::Shutdown => return,
                CloseKind::Local => {
                    info.send_modify(|i| i.status = ChannelStatus::Closed);
                    let _ = events
                        .send(ConnEvent::Closed {
                            clean: true,
                            will_retry: false,
                        })
                        .await;
                    continue 'idle;
                }
                CloseKind::Remote => match backoff.next_delay() {
                    Some(delay) => {
                        info.send_modify(|i| i.status = ChannelStatus::Closed);
                        if events
                            .send(ConnEvent::Closed {
                                clean: false,
                                will_retry: true,
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                        tracing::info!(
                            attempt = backoff.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            "reconnecting after delay"
                        );
                        match wait_disconnected(&mut cmd_rx, delay).await {
                            WaitOutcome::Elapsed => {}
                            WaitOutcome::CloseRequested => {
                                info.send_modify(|i| i.status = ChannelStatus::Closed);
                                let _ = events
                                    .send(ConnEvent::Closed {
                                        clean: true,
                                        will_retry: false,
                                    })
                                    .await;
                                continue 'idle;
                            }
                            WaitOutcome::ChannelGone => return,
                        }
                    }
                    None => {
                        tracing::error!("reconnect budget exhausted, giving up");
                        info.send_modify(|i| i.status = ChannelStatus::Failed);
                        let _ = events.send(ConnEvent::Exhausted).await;
                        continue 'idle;
                    }
                },
            }
        }
    }
}

/// Sit out the backoff delay, still reacting to commands. Sends queued
/// while disconnected are dropped, not replayed onto the next socket.
async fn wait_disconnected(
    cmd_rx: &mut mpsc::Receiver<ConnCommand>,
    delay: std::time::Duration,
) -> WaitOutcome {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return WaitOutcome::Elapsed,
            cmd = cmd_rx.recv() => match cmd {
                None => return WaitOutcome::ChannelGone,
                Some(ConnCommand::Close) => return WaitOutcome::CloseRequested,
                // A manual open skips the rest of the wait.
                Some(ConnCommand::Open) => return WaitOutcome::Elapsed,
                Some(ConnCommand::Send(_)) => {
                    tracing::warn!("channel not open, dropping message");
                }
            },
        }
    }
}

async fn drive(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    cmd_rx: &mut mpsc::Receiver<ConnCommand>,
    events: &mpsc::Sender<ConnEvent>,
    info: &watch::Sender<SessionInfo>,
    config: &Config,
) -> CloseKind {
    let (mut write, mut read) = ws_stream.split();

    let mut heartbeat = tokio::time::interval(config.profile().heartbeat_interval());
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    heartbeat.tick().await;
    let mut unanswered_pings: u32 = 0;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None => {
                    let _ = write.close().await;
                    return CloseKind::Shutdown;
                }
                Some(ConnCommand::Close) => {
                    let _ = write.send(Message::Close(None)).await;
                    return CloseKind::Local;
                }
                Some(ConnCommand::Open) => {}
                Some(ConnCommand::Send(event)) => {
                    match serde_json::to_string(&event) {
                        Ok(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::error!("failed to send message: {}", e);
                                return CloseKind::Remote;
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to serialize event: {}", e);
                        }
                    }
                }
            },
            message = read.next() => {
                let message = match message {
                    None => {
                        tracing::info!("connection closed by peer");
                        return CloseKind::Remote;
                    }
                    Some(Err(e)) => {
                        tracing::error!("failed to read message: {}", e);
                        return CloseKind::Remote;
                    }
                    Some(Ok(message)) => message,
                };
                match message {
                    Message::Text(text) => {
                        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
                            let event_type = json.get("type").and_then(|v| v.as_str());
                            let event_id = json.get("event_id").and_then(|v| v.as_str());
                            tracing::debug!(
                                "received message: {}, id={}",
                                event_type.unwrap_or("unknown"),
                                event_id.unwrap_or("unknown")
                            );
                        }
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                if matches!(event, ServerEvent::Pong(_)) {
                                    unanswered_pings = 0;
                                    info.send_modify(|i| i.last_pong_at = Some(Instant::now()));
                                }
                                if events.send(ConnEvent::Message(event)).await.is_err() {
                                    let _ = write.close().await;
                                    return CloseKind::Shutdown;
                                }
                            }
                            Err(e) => {
                                // Malformed payloads are logged and dropped,
                                // never fatal.
                                tracing::error!(
                                    "failed to deserialize event: {}, text=> {:?}",
                                    e,
                                    text
                                );
                            }
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        let close_event = ServerEvent::Close {
                            reason: reason.map(|v| format!("{:?}", v)),
                        };
                        let _ = events.send(ConnEvent::Message(close_event)).await;
                        return CloseKind::Remote;
                    }
                    _ => {}
                }
            },
            _ = heartbeat.tick() => {
                if unanswered_pings >= MAX_MISSED_PONGS {
                    tracing::error!("heartbeat lost, treating connection as dead");
                    return CloseKind::Remote;
                }
                unanswered_pings += 1;
                info.send_modify(|i| i.last_ping_at = Some(Instant::now()));
                let ping = ClientEvent::Ping(
                    voicelink_types::events::client::PingEvent::new(),
                );
                match serde_json::to_string(&ping) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send ping: {}", e);
                            return CloseKind::Remote;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize ping: {}", e);
                    }
                }
            },
        }
    }
}
