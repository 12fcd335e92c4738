//! Transport status and the tasks that own the websocket.
//!
//! The engine never touches the socket directly: a dial task performs the
//! handshake, then the stream is split into a reader task and a writer task.
//! Every task reports back through the engine's event channel, tagging each
//! event with the connection epoch it belongs to so reports from an
//! abandoned connection can be told apart from the live one.

use std::fmt;
use std::time::Duration;

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use super::event::EngineEvent;
use crate::domain::value_object::RoomId;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closing => "closing",
        };
        write!(f, "{}", label)
    }
}

/// Point-in-time view of the transport, as reported to callers.
#[derive(Debug, Clone)]
pub struct ConnectionReport {
    pub status: ConnectionStatus,
    /// Reconnect attempts since the last successful open
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub active_room: Option<RoomId>,
}

impl Default for ConnectionReport {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            retry_count: 0,
            last_error: None,
            active_room: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("connection closed by server")]
    ServerClosed,
    #[error("connection lost: {0}")]
    Lost(String),
}

/// Dial the gateway; reports an opened stream or a failed connect.
pub(crate) fn spawn_connect(
    url: String,
    epoch: u64,
    events: mpsc::UnboundedSender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match connect_async(&url).await {
            Ok((stream, _response)) => {
                let _ = events.send(EngineEvent::TransportOpened {
                    epoch,
                    stream: Box::new(stream),
                });
            }
            Err(e) => {
                let _ = events.send(EngineEvent::TransportClosed {
                    epoch,
                    error: TransportError::ConnectFailed(e.to_string()),
                });
            }
        }
    })
}

/// Pump inbound frames into the event channel until the stream ends.
pub(crate) fn spawn_reader(
    mut read: SplitStream<WsStream>,
    epoch: u64,
    events: mpsc::UnboundedSender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let frame = EngineEvent::TransportFrame {
                        epoch,
                        text: text.to_string(),
                    };
                    if events.send(frame).is_err() {
                        return;
                    }
                }
                Ok(Message::Close(_)) => {
                    let _ = events.send(EngineEvent::TransportClosed {
                        epoch,
                        error: TransportError::ServerClosed,
                    });
                    return;
                }
                // binary and ping/pong frames are not part of the protocol
                Ok(_) => {}
                Err(e) => {
                    let _ = events.send(EngineEvent::TransportClosed {
                        epoch,
                        error: TransportError::Lost(e.to_string()),
                    });
                    return;
                }
            }
        }
        let _ = events.send(EngineEvent::TransportClosed {
            epoch,
            error: TransportError::ServerClosed,
        });
    })
}

/// Drain the outbound queue into the sink. When the engine drops its sender
/// the writer finishes the queue, delivers a close frame and exits, which is
/// how a graceful disconnect gets its pending frames onto the wire.
pub(crate) fn spawn_writer(
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut sink: SplitSink<WsStream, Message>,
    epoch: u64,
    events: mpsc::UnboundedSender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = sink.send(message).await {
                let _ = events.send(EngineEvent::TransportClosed {
                    epoch,
                    error: TransportError::Lost(e.to_string()),
                });
                return;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    })
}

/// One-shot timer for the next reconnect attempt.
pub(crate) fn spawn_reconnect_timer(
    delay: Duration,
    epoch: u64,
    events: mpsc::UnboundedSender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = events.send(EngineEvent::ReconnectDue { epoch });
    })
}
