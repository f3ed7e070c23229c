//! Ledger channel: one persistent connection per organization.
//!
//! Maintains a WebSocket to the organization's ledger endpoint and provides
//! a thread-safe request/response interface over it. Responses are matched
//! to requests in order. Reconnection uses exponential backoff; the loop
//! exits for good once every handle to the channel is dropped.
//!
//! Deadlines are applied by the dispatcher, per phase, so an abandoned
//! request aborts alone without affecting other in-flight operations on the
//! same connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use crate::types::{CustodyError, Result};

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsStream = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Request/response transport to one organization's ledger endpoint.
#[async_trait]
pub trait LedgerChannel: Send + Sync {
    /// Send a frame and wait for the matching response.
    async fn request(&self, frame: Vec<u8>) -> Result<Vec<u8>>;

    /// Whether the transport currently holds a live connection.
    async fn is_connected(&self) -> bool;
}

/// Creates channels during registry initialization.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(&self, org: &str, url: &str) -> Result<Arc<dyn LedgerChannel>>;
}

/// WebSocket-backed ledger channel.
pub struct WsLedgerChannel {
    tx: mpsc::Sender<(Vec<u8>, oneshot::Sender<Vec<u8>>)>,
    connected: Arc<RwLock<bool>>,
}

impl WsLedgerChannel {
    /// Connect to a ledger endpoint and start the connection manager task.
    pub async fn connect(url: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<(Vec<u8>, oneshot::Sender<Vec<u8>>)>(1000);
        let connected = Arc::new(RwLock::new(false));

        let channel = Self {
            tx,
            connected: Arc::clone(&connected),
        };

        let loop_url = url.to_string();
        let connected_flag = Arc::clone(&connected);
        tokio::spawn(async move {
            connection_loop(loop_url, rx, connected_flag).await;
        });

        // Wait for the initial connection
        for _ in 0..50 {
            if *channel.connected.read().await {
                return Ok(channel);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(CustodyError::Ledger(format!(
            "Timeout waiting for ledger connection to {url}"
        )))
    }
}

#[async_trait]
impl LedgerChannel for WsLedgerChannel {
    async fn request(&self, frame: Vec<u8>) -> Result<Vec<u8>> {
        let (response_tx, response_rx) = oneshot::channel();

        self.tx
            .send((frame, response_tx))
            .await
            .map_err(|_| CustodyError::Ledger("Ledger connection closed".into()))?;

        response_rx
            .await
            .map_err(|_| CustodyError::Ledger("Response channel closed".into()))
    }

    async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }
}

/// Connector producing WebSocket channels.
pub struct WsLedgerConnector;

#[async_trait]
impl LedgerConnector for WsLedgerConnector {
    async fn connect(&self, org: &str, url: &str) -> Result<Arc<dyn LedgerChannel>> {
        debug!(org = %org, url = %url, "Connecting ledger channel");
        let channel = WsLedgerChannel::connect(url).await?;
        Ok(Arc::new(channel))
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop(
    url: String,
    mut rx: mpsc::Receiver<(Vec<u8>, oneshot::Sender<Vec<u8>>)>,
    connected: Arc<RwLock<bool>>,
) {
    let mut reconnect_delay = Duration::from_millis(100);
    let max_reconnect_delay = Duration::from_secs(30);

    loop {
        info!("Connecting to ledger at {}", url);

        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                let (ws_sink, ws_stream) = ws.split();
                *connected.write().await = true;
                reconnect_delay = Duration::from_millis(100);
                info!("Connected to ledger at {}", url);

                let handle_closed = handle_messages(ws_sink, ws_stream, &mut rx).await;
                *connected.write().await = false;

                if handle_closed {
                    info!("Ledger channel released, stopping connection loop");
                    return;
                }
            }
            Err(e) => {
                error!("Failed to connect to ledger at {}: {}", url, e);
            }
        }

        warn!("Reconnecting to ledger in {:?}...", reconnect_delay);
        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = (reconnect_delay * 2).min(max_reconnect_delay);
    }
}

/// Pump frames between the request queue and the WebSocket.
///
/// Returns true when every channel handle has been dropped (shutdown), false
/// when the socket itself failed and a reconnect is wanted.
async fn handle_messages(
    ws_sink: WsSink,
    mut ws_stream: WsStream,
    rx: &mut mpsc::Receiver<(Vec<u8>, oneshot::Sender<Vec<u8>>)>,
) -> bool {
    // Responses are matched to requests in send order
    let pending: Arc<Mutex<Vec<oneshot::Sender<Vec<u8>>>>> = Arc::new(Mutex::new(Vec::new()));
    let pending_for_send = Arc::clone(&pending);

    let ws_sink = Arc::new(Mutex::new(ws_sink));
    let ws_sink_for_rx = Arc::clone(&ws_sink);

    // Task to forward outgoing requests
    let request_handler = async {
        while let Some((frame, response_tx)) = rx.recv().await {
            {
                let mut pending = pending_for_send.lock().await;
                pending.push(response_tx);
            }

            let mut sink = ws_sink_for_rx.lock().await;
            if let Err(e) = sink.send(Message::Binary(frame)).await {
                error!("Failed to send to ledger: {}", e);
                let mut pending = pending_for_send.lock().await;
                pending.pop();
                return false;
            }
        }
        // Sender side gone: the registry dropped this channel
        true
    };

    // Task to route incoming responses
    let response_handler = async {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Binary(data)) => {
                    let maybe_sender = {
                        let mut pending = pending.lock().await;
                        if pending.is_empty() {
                            None
                        } else {
                            Some(pending.remove(0))
                        }
                    };

                    if let Some(sender) = maybe_sender {
                        let _ = sender.send(data.to_vec());
                    } else {
                        warn!("Received ledger response with no pending request");
                    }
                }
                Ok(Message::Ping(data)) => {
                    let mut sink = ws_sink.lock().await;
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Ok(Message::Close(frame)) => {
                    info!("Ledger closed connection: {:?}", frame);
                    break;
                }
                Err(e) => {
                    error!("Ledger WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        false
    };

    tokio::select! {
        closed = request_handler => {
            debug!("Request handler ended");
            closed
        }
        closed = response_handler => {
            debug!("Response handler ended");
            closed
        }
    }
}
