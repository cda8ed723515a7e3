//! WebSocket bridge to the gateway session.
//!
//! The bridge runs one tokio task that:
//! 1. Connects to the bridge endpoint (plain or TLS).
//! 2. Reports the session as started.
//! 3. Forwards every inbound text frame, parsed as an [`Event`], to the
//!    event channel.
//! 4. Writes outbound JSON frames queued by [`Transport`] calls.
//! 5. Sends periodic pings if configured.
//!
//! There is no reconnect. A failed connect is reported as
//! `SessionStartupFailure`; a lost connection as `SessionConnectionDown`
//! followed by `SessionTerminated`. Recovery is a process restart.
//!
//! # Outbound frames
//!
//! ```json
//! {"op":"openService","service":"//blp/refdata"}
//! {"op":"subscribe","subscriptions":[{"topic":"...","correlationId":2}]}
//! {"op":"sendRequest","correlationId":101,"request":{"requestType":"CreateOrderAndRoute",...}}
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::error::EtError;
use crate::event::{Event, EventSender, EventType, Message, names};
use crate::request::{OutboundRequest, Subscription};
use crate::token::CorrelationToken;
use crate::transport::Transport;

/// One outbound frame.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum BridgeFrame<'a> {
    OpenService {
        service: &'a str,
    },
    Subscribe {
        subscriptions: &'a [Subscription],
    },
    SendRequest {
        #[serde(rename = "correlationId")]
        correlation_id: CorrelationToken,
        request: &'a OutboundRequest,
    },
}

/// Live transport over a single WebSocket session.
pub struct WsBridge {
    config: BridgeConfig,
    /// Serialized frames waiting for the writer half.
    outbound_tx: mpsc::UnboundedSender<String>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WsBridge {
    /// Spawn the session task. Must be called from within a tokio runtime.
    ///
    /// Frames submitted before the connection is up are buffered and written
    /// once it is.
    pub fn start(config: BridgeConfig, events: EventSender) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let task_config = config.clone();

        let task = tokio::spawn(async move {
            session_loop(task_config, events, outbound_rx, shutdown_rx).await;
        });

        Self { config, outbound_tx, shutdown_tx, task: Mutex::new(Some(task)) }
    }

    /// Close the connection and wait for the session task to finish.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("[bridge] stopped ({})", self.config.url);
    }

    fn send_frame(&self, frame: &BridgeFrame<'_>) -> Result<(), EtError> {
        let text = serde_json::to_string(frame).map_err(|e| EtError::Parse(e.to_string()))?;
        self.outbound_tx
            .send(text)
            .map_err(|_| EtError::Transport("bridge session has ended".into()))
    }
}

impl Transport for WsBridge {
    fn name(&self) -> &str {
        "ws-bridge"
    }

    fn open_service(&self, service: &str) -> Result<(), EtError> {
        self.send_frame(&BridgeFrame::OpenService { service })
    }

    fn subscribe(&self, subscriptions: &[Subscription]) -> Result<(), EtError> {
        self.send_frame(&BridgeFrame::Subscribe { subscriptions })
    }

    fn send_request(&self, request: &OutboundRequest, token: CorrelationToken) -> Result<(), EtError> {
        self.send_frame(&BridgeFrame::SendRequest { correlation_id: token, request })
    }
}

/// Connect, pump frames both ways, and report the session's end.
async fn session_loop(
    config: BridgeConfig,
    events: EventSender,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("[bridge] connecting to {}", config.url);

    let connected = tokio::select! {
        r = connect_ws(&config) => r,
        _ = shutdown_rx.changed() => return,
    };

    let ws_stream = match connected {
        Ok(s) => s,
        Err(e) => {
            error!("[bridge] connection failed: {e}");
            emit_session_status(&events, names::SESSION_STARTUP_FAILURE, Some(e.to_string()));
            return;
        }
    };

    info!("[bridge] connected");
    emit_session_status(&events, names::SESSION_CONNECTION_UP, None);
    emit_session_status(&events, names::SESSION_STARTED, None);

    let (mut ws_write, mut ws_read) = ws_stream.split();

    let mut ping = config.ping_interval_secs.map(|s| {
        let period = Duration::from_secs(s);
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    });

    let reason = loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                info!("[bridge] shutdown signal received");
                let _ = ws_write.close().await;
                return;
            }

            msg = ws_read.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => forward_frame(&events, &text),
                    Some(Ok(WsMessage::Binary(data))) => {
                        debug!("[bridge] ignoring {}-byte binary frame", data.len());
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = ws_write.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) => break "close frame received".to_string(),
                    Some(Err(e)) => break format!("read error: {e}"),
                    None => break "stream ended".to_string(),
                    _ => {}
                }
            }

            Some(frame) = outbound_rx.recv() => {
                debug!("[bridge] >> {frame}");
                if let Err(e) = ws_write.send(WsMessage::Text(frame.into())).await {
                    break format!("send error: {e}");
                }
            }

            _ = next_ping(&mut ping) => {
                if let Err(e) = ws_write.send(WsMessage::Ping(Vec::<u8>::new().into())).await {
                    break format!("ping error: {e}");
                }
            }
        }
    };

    warn!("[bridge] session lost: {reason}");
    emit_session_status(&events, names::SESSION_CONNECTION_DOWN, Some(reason));
    emit_session_status(&events, names::SESSION_TERMINATED, None);
}

/// Resolves on the next ping tick; never, when pinging is off.
async fn next_ping(ping: &mut Option<tokio::time::Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Parse one inbound frame and hand it to the event loop.
fn forward_frame(events: &EventSender, text: &str) {
    match serde_json::from_str::<Event>(text) {
        Ok(event) => {
            if events.send(event).is_err() {
                debug!("[bridge] event receiver gone, dropping frame");
            }
        }
        Err(e) => warn!("[bridge] dropping malformed frame ({e}): {text}"),
    }
}

fn emit_session_status(events: &EventSender, name: &str, reason: Option<String>) {
    let mut msg = Message::new(name);
    if let Some(reason) = reason {
        msg = msg.with_field("reason", reason);
    }
    let _ = events.send(Event::single(EventType::SessionStatus, msg));
}

/// Open the WebSocket, adding any configured handshake headers.
async fn connect_ws(
    config: &BridgeConfig,
) -> anyhow::Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

    let mut request = config.url.as_str().into_client_request()?;
    for (key, value) in &config.extra_headers {
        request
            .headers_mut()
            .insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(value)?);
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}
