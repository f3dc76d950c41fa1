//! Discord gateway receive loop
//!
//! Connects to the gateway WebSocket, authenticates (Identify, or Resume
//! when a session is known), keeps the heartbeat going and hands direct
//! messages to a [`MessageHandler`]. Connection failures are retried after
//! a fixed delay until the cancellation token fires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chat::MessageHandler;
use crate::config::DiscordConfig;
use crate::error::{Error, Result};

use super::events::{
    ConnectionProperties, DiscordMessage, GatewayPayload, HelloData, IdentifyPayload, ReadyEvent,
    ResumePayload, OP_DISPATCH, OP_HEARTBEAT, OP_HEARTBEAT_ACK, OP_HELLO, OP_IDENTIFY,
    OP_INVALID_SESSION, OP_RECONNECT, OP_RESUME,
};

/// Delay before reconnecting after the connection drops
const RECONNECT_DELAY_SECS: u64 = 5;

/// Session details from READY, used to resume
#[derive(Debug, Clone)]
struct Session {
    id: String,
    resume_url: Option<String>,
}

/// What the receive loop should do after a payload
#[derive(Debug, PartialEq, Eq)]
enum Next {
    Continue,
    HeartbeatNow,
    Reconnect,
}

enum SessionEnd {
    Cancelled,
    Reconnect,
}

/// Gateway connection state for one bot
pub struct DiscordGateway {
    token: String,
    gateway_url: String,
    intents: u32,
    allow_from: Vec<String>,
    sequence: AtomicU64,
    session: Mutex<Option<Session>>,
}

impl DiscordGateway {
    pub fn new(token: String, config: &DiscordConfig) -> Self {
        Self {
            token,
            gateway_url: config.gateway_url.clone(),
            intents: config.intents,
            allow_from: config.allow_from.clone(),
            sequence: AtomicU64::new(0),
            session: Mutex::new(None),
        }
    }

    /// Run until cancelled, reconnecting on failure
    pub async fn run(
        &self,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<()> {
        info!("Discord gateway starting");

        loop {
            match self.run_session(&handler, &cancel).await {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::Reconnect) => {}
                Err(e) => error!(error = %e, "Discord gateway session failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)) => {
                    info!("Reconnecting Discord gateway");
                }
            }
        }

        info!("Discord gateway stopped");
        Ok(())
    }

    async fn run_session(
        &self,
        handler: &Arc<dyn MessageHandler>,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd> {
        let url = self
            .session
            .lock()
            .as_ref()
            .and_then(|s| s.resume_url.clone())
            .unwrap_or_else(|| self.gateway_url.clone());

        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::Chat(format!("Gateway connect failed: {}", e)))?;
        info!("Discord gateway connected");
        let (mut write, mut read) = stream.split();

        let heartbeat_interval = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.close().await;
                return Ok(SessionEnd::Cancelled);
            }
            interval = wait_for_hello(&mut read) => interval?,
        };
        debug!(interval_ms = heartbeat_interval, "Received Hello");

        send(&mut write, &self.auth_payload()?).await?;

        let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_interval));
        // The first tick completes immediately.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.close().await;
                    return Ok(SessionEnd::Cancelled);
                }
                _ = heartbeat.tick() => {
                    send(&mut write, &GatewayPayload::heartbeat(self.last_sequence())).await?;
                }
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        let payload = match serde_json::from_str::<GatewayPayload>(&text) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(error = %e, "Failed to parse gateway payload");
                                continue;
                            }
                        };
                        match self.handle_payload(payload, handler) {
                            Next::Continue => {}
                            Next::HeartbeatNow => {
                                let beat = GatewayPayload::heartbeat(self.last_sequence());
                                send(&mut write, &beat).await?;
                            }
                            Next::Reconnect => return Ok(SessionEnd::Reconnect),
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = write.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("Discord gateway closed");
                        return Ok(SessionEnd::Reconnect);
                    }
                    Some(Err(e)) => return Err(Error::Chat(format!("Gateway error: {}", e))),
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Resume when a session is known, otherwise Identify
    fn auth_payload(&self) -> Result<GatewayPayload> {
        let session = self.session.lock().clone();
        match session {
            Some(session) => {
                let seq = self.last_sequence();
                info!(session_id = %session.id, seq, "Resuming gateway session");
                let resume = ResumePayload {
                    token: self.token.clone(),
                    session_id: session.id,
                    seq,
                };
                Ok(GatewayPayload::outgoing(OP_RESUME, Some(serde_json::to_value(resume)?)))
            }
            None => {
                let identify = IdentifyPayload {
                    token: self.token.clone(),
                    intents: self.intents,
                    properties: ConnectionProperties {
                        os: std::env::consts::OS.to_string(),
                        browser: crate::APP_NAME.to_string(),
                        device: crate::APP_NAME.to_string(),
                    },
                };
                Ok(GatewayPayload::outgoing(OP_IDENTIFY, Some(serde_json::to_value(identify)?)))
            }
        }
    }

    fn handle_payload(&self, payload: GatewayPayload, handler: &Arc<dyn MessageHandler>) -> Next {
        if let Some(seq) = payload.s {
            self.sequence.store(seq, Ordering::SeqCst);
        }

        match payload.op {
            OP_DISPATCH => {
                self.handle_dispatch(payload.t.as_deref().unwrap_or_default(), payload.d, handler);
                Next::Continue
            }
            OP_HEARTBEAT => Next::HeartbeatNow,
            OP_HEARTBEAT_ACK => {
                debug!("Heartbeat acknowledged");
                Next::Continue
            }
            OP_RECONNECT => {
                info!("Gateway requested reconnect");
                Next::Reconnect
            }
            OP_INVALID_SESSION => {
                let resumable = payload.d.as_ref().and_then(|d| d.as_bool()).unwrap_or(false);
                warn!(resumable, "Gateway session invalidated");
                if !resumable {
                    *self.session.lock() = None;
                    self.sequence.store(0, Ordering::SeqCst);
                }
                Next::Reconnect
            }
            op => {
                debug!(op, "Unhandled gateway opcode");
                Next::Continue
            }
        }
    }

    fn handle_dispatch(
        &self,
        event: &str,
        data: Option<serde_json::Value>,
        handler: &Arc<dyn MessageHandler>,
    ) {
        let Some(data) = data else {
            return;
        };

        match event {
            "READY" => match serde_json::from_value::<ReadyEvent>(data) {
                Ok(ready) => {
                    info!(
                        bot_id = %ready.user.id,
                        bot_name = %ready.user.username,
                        "Discord bot authenticated"
                    );
                    *self.session.lock() = Some(Session {
                        id: ready.session_id,
                        resume_url: ready.resume_gateway_url,
                    });
                }
                Err(e) => warn!(error = %e, "Failed to parse READY"),
            },
            "RESUMED" => info!("Gateway session resumed"),
            "MESSAGE_CREATE" => match serde_json::from_value::<DiscordMessage>(data) {
                Ok(msg) if self.accepts(&msg) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        handler.on_message(msg.into()).await;
                    });
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to parse MESSAGE_CREATE"),
            },
            other => debug!(event = %other, "Unhandled dispatch event"),
        }
    }

    /// Only direct messages from permitted humans reach the handler
    fn accepts(&self, msg: &DiscordMessage) -> bool {
        if msg.author.bot || msg.guild_id.is_some() {
            return false;
        }
        if !self.allow_from.is_empty() && !self.allow_from.iter().any(|id| id == &msg.author.id) {
            warn!(sender_id = %msg.author.id, "Message from disallowed user, ignoring");
            return false;
        }
        true
    }
}

async fn wait_for_hello<S>(read: &mut S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    while let Some(frame) = read.next().await {
        let frame = frame.map_err(|e| Error::Chat(format!("Gateway error before Hello: {}", e)))?;
        if let WsMessage::Text(text) = frame {
            let payload: GatewayPayload = serde_json::from_str(&text)?;
            if payload.op == OP_HELLO {
                if let Some(d) = payload.d {
                    let hello: HelloData = serde_json::from_value(d)?;
                    return Ok(hello.heartbeat_interval);
                }
            }
        }
    }
    Err(Error::Chat("Gateway closed before Hello".to_string()))
}

async fn send<W>(write: &mut W, payload: &GatewayPayload) -> Result<()>
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    let json = serde_json::to_string(payload)?;
    write
        .send(WsMessage::Text(json))
        .await
        .map_err(|e| Error::Chat(format!("Gateway send failed: {}", e)))
}
