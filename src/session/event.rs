//! Messages in and out of the engine's event loop.
//!
//! Everything the engine reacts to arrives as an [`EngineEvent`] on a single
//! channel: caller commands and transport reports alike. The engine handles
//! one event to completion before taking the next, so no state is ever
//! observed mid-transition. Outcomes callers wait for travel back on the
//! per-command `reply` channel; everything observable is also broadcast as an
//! [`EngineNotice`].

use tokio::sync::oneshot;

use super::auth::AuthError;
use super::connection::{ConnectionReport, ConnectionStatus, TransportError, WsStream};
use crate::domain::{Member, Message, value_object::{RoomId, Username}};
use crate::infrastructure::dto::http::RegisterRequest;

/// A caller request, delivered through the handle.
#[derive(Debug)]
pub enum EngineCommand {
    Login {
        username: String,
        password: String,
        reply: oneshot::Sender<Result<Member, AuthError>>,
    },
    /// Adopt an existing cookie session without credentials
    AdoptSession {
        reply: oneshot::Sender<Result<Member, AuthError>>,
    },
    Logout {
        reply: oneshot::Sender<Result<(), AuthError>>,
    },
    Register {
        request: RegisterRequest,
        reply: oneshot::Sender<Result<i64, AuthError>>,
    },
    Connect,
    Disconnect,
    /// Leave the current room (if any) and join another
    SwitchRoom { room: RoomId },
    LeaveRoom { room: RoomId },
    SendChat {
        room: RoomId,
        body: String,
        reply: oneshot::Sender<bool>,
    },
    SetTyping { room: RoomId, typing: bool },
    GetStatus {
        reply: oneshot::Sender<ConnectionReport>,
    },
    GetRooms {
        reply: oneshot::Sender<Vec<RoomId>>,
    },
    GetHistory {
        room: RoomId,
        reply: oneshot::Sender<Vec<Message>>,
    },
    GetTypists {
        room: RoomId,
        reply: oneshot::Sender<Vec<Username>>,
    },
    GetMember {
        reply: oneshot::Sender<Option<Member>>,
    },
    Shutdown,
}

/// Everything the engine's event loop reacts to.
///
/// Transport events carry the epoch of the connection that produced them;
/// the engine drops any event whose epoch is not the current one.
#[derive(Debug)]
pub enum EngineEvent {
    Command(EngineCommand),
    TransportOpened { epoch: u64, stream: Box<WsStream> },
    TransportFrame { epoch: u64, text: String },
    TransportClosed { epoch: u64, error: TransportError },
    ReconnectDue { epoch: u64 },
}

/// Broadcast to every subscriber whenever observable state changes.
#[derive(Debug, Clone)]
pub enum EngineNotice {
    StatusChanged {
        status: ConnectionStatus,
        detail: Option<String>,
    },
    SessionChanged { username: Option<Username> },
    ActiveRoomChanged { room: Option<RoomId> },
    MessageAdded { message: Message },
    /// The set of typists for a room changed; query for the current set
    TypingChanged { room: RoomId },
}
