//! Cloneable handle for talking to a running engine.

use tokio::sync::{broadcast, mpsc, oneshot};

use super::auth::AuthError;
use super::connection::ConnectionReport;
use super::event::{EngineCommand, EngineEvent, EngineNotice};
use crate::domain::{
    Member, Message,
    value_object::{RoomId, Username},
};
use crate::infrastructure::dto::http::RegisterRequest;

/// The only way into a [`SessionEngine`](super::SessionEngine) once it runs.
///
/// Commands are queued onto the engine's event channel; methods that have an
/// outcome await a reply on a one-shot channel. When the engine is gone,
/// fallible calls return [`AuthError::EngineStopped`], sends report `false`
/// and queries return empty defaults.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    events: mpsc::UnboundedSender<EngineEvent>,
    notices: broadcast::Sender<EngineNotice>,
}

impl EngineHandle {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<EngineEvent>,
        notices: broadcast::Sender<EngineNotice>,
    ) -> Self {
        Self { events, notices }
    }

    /// Subscribe to state-change notices. Each subscriber gets every notice
    /// from the moment of subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineNotice> {
        self.notices.subscribe()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Member, AuthError> {
        self.query(|reply| EngineCommand::Login {
            username: username.to_string(),
            password: password.to_string(),
            reply,
        })
        .await
        .unwrap_or(Err(AuthError::EngineStopped))
    }

    /// Adopt an existing cookie session, if the backend still honors it.
    pub async fn adopt_session(&self) -> Result<Member, AuthError> {
        self.query(|reply| EngineCommand::AdoptSession { reply })
            .await
            .unwrap_or(Err(AuthError::EngineStopped))
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.query(|reply| EngineCommand::Logout { reply })
            .await
            .unwrap_or(Err(AuthError::EngineStopped))
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<i64, AuthError> {
        self.query(|reply| EngineCommand::Register { request, reply })
            .await
            .unwrap_or(Err(AuthError::EngineStopped))
    }

    pub fn connect(&self) {
        self.send(EngineCommand::Connect);
    }

    pub fn disconnect(&self) {
        self.send(EngineCommand::Disconnect);
    }

    /// Leave the current room (if any) and join `room`.
    pub fn switch_room(&self, room: RoomId) {
        self.send(EngineCommand::SwitchRoom { room });
    }

    pub fn leave_room(&self, room: RoomId) {
        self.send(EngineCommand::LeaveRoom { room });
    }

    /// Send a chat message. Resolves to whether the message was handed to
    /// the transport; `false` means it was dropped (not connected, empty or
    /// oversized body) and will not be retried.
    pub async fn send_chat(&self, room: RoomId, body: impl Into<String>) -> bool {
        let body = body.into();
        self.query(|reply| EngineCommand::SendChat { room, body, reply })
            .await
            .unwrap_or(false)
    }

    pub fn set_typing(&self, room: RoomId, typing: bool) {
        self.send(EngineCommand::SetTyping { room, typing });
    }

    pub async fn status(&self) -> ConnectionReport {
        self.query(|reply| EngineCommand::GetStatus { reply })
            .await
            .unwrap_or_default()
    }

    pub async fn rooms(&self) -> Vec<RoomId> {
        self.query(|reply| EngineCommand::GetRooms { reply })
            .await
            .unwrap_or_default()
    }

    pub async fn history(&self, room: RoomId) -> Vec<Message> {
        self.query(|reply| EngineCommand::GetHistory { room, reply })
            .await
            .unwrap_or_default()
    }

    pub async fn typists(&self, room: RoomId) -> Vec<Username> {
        self.query(|reply| EngineCommand::GetTypists { room, reply })
            .await
            .unwrap_or_default()
    }

    pub async fn member(&self) -> Option<Member> {
        self.query(|reply| EngineCommand::GetMember { reply })
            .await
            .unwrap_or_default()
    }

    /// Stop the engine after a graceful disconnect.
    pub fn shutdown(&self) {
        self.send(EngineCommand::Shutdown);
    }

    fn send(&self, command: EngineCommand) {
        if self.events.send(EngineEvent::Command(command)).is_err() {
            tracing::debug!("Command dropped: engine is gone");
        }
    }

    async fn query<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .events
            .send(EngineEvent::Command(build(reply_tx)))
            .is_err()
        {
            return None;
        }
        reply_rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{broadcast, mpsc};

    fn create_detached_handle() -> EngineHandle {
        // 受信側を即座に落とし、エンジン不在の状態を作る
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        drop(events_rx);
        let (notices_tx, _) = broadcast::channel(8);
        EngineHandle::new(events_tx, notices_tx)
    }

    #[tokio::test]
    async fn test_calls_against_a_stopped_engine_degrade() {
        // テスト項目: エンジン停止後の呼び出しが既定値に縮退する
        // given (前提条件):
        let handle = create_detached_handle();

        // when (操作) / then (期待する結果):
        assert!(matches!(
            handle.login("alice", "pw").await,
            Err(AuthError::EngineStopped)
        ));
        assert!(matches!(
            handle.logout().await,
            Err(AuthError::EngineStopped)
        ));
        assert!(!handle.send_chat(RoomId::general(), "hello").await);
        assert!(handle.rooms().await.is_empty());
        assert!(handle.history(RoomId::general()).await.is_empty());
        assert!(handle.member().await.is_none());
        let report = handle.status().await;
        assert!(report.last_error.is_none());

        // 送りっぱなし系は落ちないことだけ確認する
        handle.connect();
        handle.shutdown();
    }
}
