//! The session engine event loop.
//!
//! One task owns every piece of session state. Commands from handles and
//! reports from transport tasks arrive on the same channel and are handled
//! strictly one at a time, so there are no locks and no torn state. The
//! engine talks back to the world through per-command replies and a
//! broadcast notice channel.
//!
//! Reconnects are driven from here as well: an unexpected close schedules a
//! single timer, the timer event re-dials, and a fresh epoch orphans every
//! task of the previous connection.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use super::auth::{AuthError, CredentialBridge};
use super::connection::{self, ConnectionReport, ConnectionStatus, TransportError, WsStream};
use super::event::{EngineCommand, EngineEvent, EngineNotice};
use super::handle::EngineHandle;
use super::presence::TypingTracker;
use super::store::MessageStore;
use crate::common::time::Clock;
use crate::config::EngineConfig;
use crate::domain::{
    Member, Message, RoomEvent,
    value_object::{MessageBody, RoomId, Timestamp, Username},
};
use crate::infrastructure::dto::websocket::{ClientFrame, ProtocolError, ServerFrame};
use crate::infrastructure::storage::SnapshotStorage;

/// Lagging notice subscribers drop the oldest notices past this depth
const NOTICE_CHANNEL_CAPACITY: usize = 256;

pub struct SessionEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    bridge: CredentialBridge,
    store: MessageStore,
    typing: TypingTracker,

    status: ConnectionStatus,
    /// Bumped on every dial and every teardown; transport events carrying
    /// any other value are stale and ignored.
    epoch: u64,
    retry_count: u32,
    last_error: Option<String>,
    /// Room the gateway currently has us in (confirmed joins only)
    active_room: Option<RoomId>,
    /// Room to rejoin after an unexpected disconnect
    resume_room: Option<RoomId>,
    /// Typing indicator to clear once the transport is back
    pending_typing_reset: Option<RoomId>,
    /// Username of the logged-in member, for self-notice suppression
    self_username: Option<Username>,

    outbound: Option<mpsc::UnboundedSender<WsMessage>>,
    connect_task: Option<JoinHandle<()>>,
    read_task: Option<JoinHandle<()>>,
    write_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,

    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    notices: broadcast::Sender<EngineNotice>,
}

impl SessionEngine {
    /// Build an engine, loading persisted history through `storage`.
    ///
    /// Fails only if the configured API base URL cannot be parsed.
    pub async fn new(
        config: EngineConfig,
        storage: Box<dyn SnapshotStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let bridge = CredentialBridge::new(&config)?;
        let store = MessageStore::load(storage, config.history_cap).await;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Ok(Self {
            typing: TypingTracker::new(config.typing_ttl),
            config,
            clock,
            bridge,
            store,
            status: ConnectionStatus::Disconnected,
            epoch: 0,
            retry_count: 0,
            last_error: None,
            active_room: None,
            resume_room: None,
            pending_typing_reset: None,
            self_username: None,
            outbound: None,
            connect_task: None,
            read_task: None,
            write_task: None,
            reconnect_timer: None,
            events_tx,
            events_rx,
            notices,
        })
    }

    /// Build an engine and run it on its own task.
    pub async fn spawn(
        config: EngineConfig,
        storage: Box<dyn SnapshotStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<(EngineHandle, JoinHandle<()>), AuthError> {
        let engine = Self::new(config, storage, clock).await?;
        let handle = engine.handle();
        let task = tokio::spawn(engine.run());
        Ok((handle, task))
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle::new(self.events_tx.clone(), self.notices.clone())
    }

    /// Run until a shutdown command arrives or every handle is gone.
    pub async fn run(mut self) {
        tracing::debug!("Session engine started");
        loop {
            let Some(event) = self.events_rx.recv().await else {
                tracing::debug!("All handles dropped; stopping engine");
                break;
            };
            if self.on_event(event).await {
                break;
            }
        }
        self.cancel_reconnect_timer();
        self.abort_transport();
        tracing::debug!("Session engine stopped");
    }

    async fn on_event(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Command(command) => return self.on_command(command).await,
            EngineEvent::TransportOpened { epoch, stream } => {
                self.on_transport_opened(epoch, *stream)
            }
            EngineEvent::TransportFrame { epoch, text } => {
                self.on_transport_frame(epoch, &text).await
            }
            EngineEvent::TransportClosed { epoch, error } => {
                self.on_transport_closed(epoch, error)
            }
            EngineEvent::ReconnectDue { epoch } => self.on_reconnect_due(epoch).await,
        }
        false
    }

    async fn on_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Login {
                username,
                password,
                reply,
            } => {
                let _ = reply.send(self.do_login(&username, &password).await);
            }
            EngineCommand::AdoptSession { reply } => {
                let _ = reply.send(self.do_adopt_session().await);
            }
            EngineCommand::Logout { reply } => {
                let _ = reply.send(self.do_logout().await);
            }
            EngineCommand::Register { request, reply } => {
                let _ = reply.send(self.bridge.register(request).await);
            }
            EngineCommand::Connect => self.connect().await,
            EngineCommand::Disconnect => self.disconnect(),
            EngineCommand::SwitchRoom { room } => self.switch_room(room),
            EngineCommand::LeaveRoom { room } => self.leave_room(&room),
            EngineCommand::SendChat { room, body, reply } => {
                let sent = self.send_chat(room, body).await;
                let _ = reply.send(sent);
            }
            EngineCommand::SetTyping { room, typing } => self.set_typing(room, typing),
            EngineCommand::GetStatus { reply } => {
                let _ = reply.send(self.report());
            }
            EngineCommand::GetRooms { reply } => {
                let _ = reply.send(self.store.known_rooms());
            }
            EngineCommand::GetHistory { room, reply } => {
                let _ = reply.send(self.store.history_for(&room));
            }
            EngineCommand::GetTypists { room, reply } => {
                let now = self.now();
                let _ = reply.send(self.typing.typists(&room, now));
            }
            EngineCommand::GetMember { reply } => {
                let _ = reply.send(self.bridge.current_member());
            }
            EngineCommand::Shutdown => {
                self.disconnect();
                return true;
            }
        }
        false
    }

    // === auth ===

    async fn do_login(&mut self, username: &str, password: &str) -> Result<Member, AuthError> {
        let member = self.bridge.login(username, password).await?;
        self.self_username = Some(member.username.clone());
        self.notify(EngineNotice::SessionChanged {
            username: Some(member.username.clone()),
        });
        // a fresh session brings the transport up immediately
        self.connect().await;
        Ok(member)
    }

    async fn do_adopt_session(&mut self) -> Result<Member, AuthError> {
        let member = self.bridge.check_session().await?;
        self.self_username = Some(member.username.clone());
        self.notify(EngineNotice::SessionChanged {
            username: Some(member.username.clone()),
        });
        self.connect().await;
        Ok(member)
    }

    async fn do_logout(&mut self) -> Result<(), AuthError> {
        // tear the transport down first so no reconnect survives the logout
        self.disconnect();
        self.bridge.logout().await?;
        self.self_username = None;
        self.pending_typing_reset = None;
        self.notify(EngineNotice::SessionChanged { username: None });
        Ok(())
    }

    // === transport ===

    async fn connect(&mut self) {
        if matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Open
        ) {
            tracing::debug!("connect ignored: transport already {}", self.status);
            return;
        }
        self.cancel_reconnect_timer();
        let token = match self.bridge.mint_connection_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Connection token unavailable: {}", e);
                self.last_error = Some(e.to_string());
                self.set_status(self.status, Some(format!("connection token unavailable: {}", e)));
                return;
            }
        };
        self.epoch += 1;
        self.set_status(ConnectionStatus::Connecting, None);
        tracing::info!("Connecting to chat gateway at {}", self.config.ws_base_url);
        self.connect_task = Some(connection::spawn_connect(
            self.config.chat_endpoint(&token),
            self.epoch,
            self.events_tx.clone(),
        ));
    }

    fn disconnect(&mut self) {
        self.cancel_reconnect_timer();
        self.resume_room = None;
        match self.status {
            ConnectionStatus::Disconnected => {}
            ConnectionStatus::Connecting => {
                self.epoch += 1;
                self.abort_transport();
                self.set_status(ConnectionStatus::Disconnected, None);
            }
            ConnectionStatus::Open | ConnectionStatus::Closing => {
                self.set_status(ConnectionStatus::Closing, None);
                if let Some(room) = self.active_room.take() {
                    // best effort; the writer drains this before closing
                    self.send_frame(&ClientFrame::leave(&room));
                    self.notify(EngineNotice::ActiveRoomChanged { room: None });
                }
                self.epoch += 1;
                // dropping the sender lets the writer drain, deliver a close
                // frame and exit on its own
                self.outbound = None;
                self.write_task = None;
                if let Some(task) = self.read_task.take() {
                    task.abort();
                }
                if let Some(task) = self.connect_task.take() {
                    task.abort();
                }
                self.set_status(ConnectionStatus::Disconnected, None);
            }
        }
    }

    fn on_transport_opened(&mut self, epoch: u64, stream: WsStream) {
        if epoch != self.epoch || self.status != ConnectionStatus::Connecting {
            tracing::debug!("Dropping stale transport open (epoch {})", epoch);
            return;
        }
        self.connect_task = None;
        let (sink, read) = stream.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.read_task = Some(connection::spawn_reader(read, epoch, self.events_tx.clone()));
        self.write_task = Some(connection::spawn_writer(
            outbound_rx,
            sink,
            epoch,
            self.events_tx.clone(),
        ));
        self.outbound = Some(outbound_tx);
        self.retry_count = 0;
        self.last_error = None;
        self.set_status(ConnectionStatus::Open, None);
        tracing::info!("Connected to chat gateway");

        // pick up where we left off, or start in the default room
        let target = self
            .resume_room
            .take()
            .or_else(|| self.active_room.is_none().then(RoomId::general));
        if let Some(room) = target {
            self.send_frame(&ClientFrame::join(&room));
        }
        if let Some(room) = self.pending_typing_reset.take() {
            self.send_frame(&ClientFrame::typing(&room, false));
        }
    }

    async fn on_transport_frame(&mut self, epoch: u64, text: &str) {
        if epoch != self.epoch || self.status != ConnectionStatus::Open {
            tracing::debug!("Dropping frame from stale transport (epoch {})", epoch);
            return;
        }
        let received_at = self.now();
        let event = ServerFrame::decode(text)
            .and_then(|frame| frame.into_room_event(received_at).map_err(ProtocolError::from));
        match event {
            Ok(event) => self.apply_room_event(event).await,
            Err(e) => tracing::warn!("Dropping bad frame from gateway: {}", e),
        }
    }

    fn on_transport_closed(&mut self, epoch: u64, error: TransportError) {
        if epoch != self.epoch {
            tracing::debug!("Stale transport close (epoch {}) ignored", epoch);
            return;
        }
        if !matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Open
        ) {
            return;
        }
        tracing::warn!("Transport closed: {}", error);
        self.abort_transport();
        if let Some(room) = self.active_room.take() {
            self.resume_room = Some(room);
            self.notify(EngineNotice::ActiveRoomChanged { room: None });
        }
        self.last_error = Some(error.to_string());
        self.set_status(ConnectionStatus::Disconnected, Some(error.to_string()));
        if self.bridge.is_authenticated() {
            self.schedule_reconnect();
        }
    }

    async fn on_reconnect_due(&mut self, epoch: u64) {
        self.reconnect_timer = None;
        if epoch != self.epoch || self.status != ConnectionStatus::Disconnected {
            tracing::debug!("Reconnect timer no longer applicable");
            return;
        }
        if !self.bridge.is_authenticated() {
            tracing::debug!("Reconnect skipped: no session");
            return;
        }
        self.connect().await;
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_timer.is_some() {
            tracing::debug!("Reconnect already scheduled");
            return;
        }
        self.retry_count += 1;
        tracing::info!(
            "Reconnecting in {:?} (attempt {})",
            self.config.reconnect_delay,
            self.retry_count
        );
        self.reconnect_timer = Some(connection::spawn_reconnect_timer(
            self.config.reconnect_delay,
            self.epoch,
            self.events_tx.clone(),
        ));
    }

    fn cancel_reconnect_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    fn abort_transport(&mut self) {
        self.outbound = None;
        for task in [
            self.connect_task.take(),
            self.read_task.take(),
            self.write_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }

    // === room protocol ===

    async fn apply_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::RoomJoined { room } => {
                if self.active_room.as_ref() == Some(&room) {
                    tracing::debug!("Duplicate join confirmation for '{}' ignored", room);
                    return;
                }
                self.store.register_room(room.clone()).await;
                self.active_room = Some(room.clone());
                self.notify(EngineNotice::ActiveRoomChanged {
                    room: Some(room.clone()),
                });
                self.append_notice_message(&room, format!("joined {}", room)).await;
            }
            RoomEvent::RoomLeft { .. } => {
                // the notice lands in the room we were actually in
                let Some(previous) = self.active_room.take() else {
                    tracing::debug!("Leave confirmation with no active room ignored");
                    return;
                };
                self.notify(EngineNotice::ActiveRoomChanged { room: None });
                self.append_notice_message(&previous, format!("left {}", previous))
                    .await;
            }
            RoomEvent::Chat { message } => {
                self.store.append(message.clone()).await;
                self.notify(EngineNotice::MessageAdded { message });
            }
            RoomEvent::System { body } => {
                let Some(room) = self.active_room.clone() else {
                    tracing::debug!("System notice with no active room dropped");
                    return;
                };
                let message = Message::system(room, body, self.now());
                self.store.append(message.clone()).await;
                self.notify(EngineNotice::MessageAdded { message });
            }
            RoomEvent::Typing {
                room,
                username,
                typing,
            } => {
                if self.self_username.as_ref() == Some(&username) {
                    return;
                }
                let now = self.now();
                if self.typing.note(room.clone(), username, typing, now) {
                    self.notify(EngineNotice::TypingChanged { room });
                }
            }
        }
    }

    fn switch_room(&mut self, room: RoomId) {
        if self.status != ConnectionStatus::Open {
            tracing::debug!("Room switch to '{}' ignored: transport is {}", room, self.status);
            return;
        }
        if self.active_room.as_ref() == Some(&room) {
            tracing::debug!("Already in room '{}'", room);
            return;
        }
        // leave then join; the gateway confirms each in order
        if let Some(previous) = self.active_room.clone() {
            self.send_frame(&ClientFrame::leave(&previous));
        }
        self.send_frame(&ClientFrame::join(&room));
    }

    fn leave_room(&mut self, room: &RoomId) {
        if self.status != ConnectionStatus::Open {
            tracing::debug!("Leave ignored: transport is {}", self.status);
            return;
        }
        self.send_frame(&ClientFrame::leave(room));
    }

    async fn send_chat(&mut self, room: RoomId, body: String) -> bool {
        if self.status != ConnectionStatus::Open {
            tracing::debug!("Chat message dropped: transport is {}", self.status);
            return false;
        }
        let body = match MessageBody::new(body) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Chat message rejected: {}", e);
                return false;
            }
        };
        if !self.send_frame(&ClientFrame::chat(&room, &body)) {
            return false;
        }
        self.store.record_sent().await;
        true
    }

    fn set_typing(&mut self, room: RoomId, typing: bool) {
        if self.status != ConnectionStatus::Open {
            if !typing {
                // clear our indicator once the transport is back
                self.pending_typing_reset = Some(room);
            }
            return;
        }
        self.send_frame(&ClientFrame::typing(&room, typing));
    }

    // === shared helpers ===

    fn send_frame(&mut self, frame: &ClientFrame) -> bool {
        let Some(outbound) = &self.outbound else {
            return false;
        };
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize outbound frame: {}", e);
                return false;
            }
        };
        outbound.send(WsMessage::Text(json.into())).is_ok()
    }

    async fn append_notice_message(&mut self, room: &RoomId, text: String) {
        let Ok(body) = MessageBody::new(text) else {
            tracing::error!("Dropped membership notice with an empty body");
            return;
        };
        let message = Message::system(room.clone(), body, self.now());
        self.store.append(message.clone()).await;
        self.notify(EngineNotice::MessageAdded { message });
    }

    fn set_status(&mut self, status: ConnectionStatus, detail: Option<String>) {
        if self.status == status && detail.is_none() {
            return;
        }
        self.status = status;
        self.notify(EngineNotice::StatusChanged { status, detail });
    }

    fn report(&self) -> ConnectionReport {
        ConnectionReport {
            status: self.status,
            retry_count: self.retry_count,
            last_error: self.last_error.clone(),
            active_room: self.active_room.clone(),
        }
    }

    fn notify(&self, notice: EngineNotice) {
        // nobody listening is fine
        let _ = self.notices.send(notice);
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_utc_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::FixedClock;
    use crate::infrastructure::storage::MemorySnapshotStorage;
    use std::time::Duration;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - ルームイベント適用（参加・退室・発言・システム・typing）の状態遷移
    // - 切断時の再接続スケジューリング（1 本だけ、エポック不一致は無視）
    // - 未接続時の送信・typing の振る舞い
    //
    // 【なぜこのテストが必要か】
    // - イベントループ内の遷移はロックがない代わりに順序が全て。
    //   ハンドラ単体で呼び出して遷移の不変条件を固定する
    // - 再接続の多重予約はかつての典型的なバグ源
    //
    // 【どのようなシナリオをテストするか】
    // 1. join/leave の確認イベントと参加中ルームの追従
    // 2. 重複 join・活動ルームなしの leave の無視
    // 3. 自分の typing の抑制と他者の typing の追跡
    // 4. 現エポックの切断 → タイマー 1 本、旧エポックの切断 → 無視
    // 5. 再接続待ち中の手動 connect、送信フレームの形と件数
    //
    // 実ソケット越しの一連の流れは tests/ 配下の結合テストで検証する。
    // ========================================

    fn create_test_member(name: &str) -> Member {
        Member {
            id: 1,
            username: Username::new(name.to_string()).unwrap(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            groups: Vec::new(),
        }
    }

    fn room(name: &str) -> RoomId {
        RoomId::new(name.to_string()).unwrap()
    }

    fn user(name: &str) -> Username {
        Username::new(name.to_string()).unwrap()
    }

    async fn create_test_engine() -> SessionEngine {
        let config = EngineConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            ws_base_url: "ws://127.0.0.1:9".to_string(),
            reconnect_delay: Duration::from_millis(50),
            ..EngineConfig::default()
        };
        SessionEngine::new(
            config,
            Box::new(MemorySnapshotStorage::new()),
            Arc::new(FixedClock::new(1_000)),
        )
        .await
        .unwrap()
    }

    fn chat_event(room_name: &str, author: &str, text: &str) -> RoomEvent {
        RoomEvent::Chat {
            message: Message::user(
                room(room_name),
                user(author),
                None,
                MessageBody::new(text.to_string()).unwrap(),
                Timestamp::new(42),
            ),
        }
    }

    #[tokio::test]
    async fn test_join_confirmation_tracks_the_active_room() {
        // テスト項目: join 確認で参加中ルームが更新され通知文が残る
        // given (前提条件):
        let mut engine = create_test_engine().await;

        // when (操作):
        engine
            .apply_room_event(RoomEvent::RoomJoined { room: room("rust") })
            .await;

        // then (期待する結果):
        assert_eq!(engine.report().active_room, Some(room("rust")));
        let history = engine.store.history_for(&room("rust"));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body.as_str(), "joined rust");
        assert_eq!(history[0].author, Username::system());
    }

    #[tokio::test]
    async fn test_duplicate_join_confirmation_is_ignored() {
        // テスト項目: 同じルームへの join 確認が重複しても通知文は 1 件
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine
            .apply_room_event(RoomEvent::RoomJoined { room: room("rust") })
            .await;

        // when (操作):
        engine
            .apply_room_event(RoomEvent::RoomJoined { room: room("rust") })
            .await;

        // then (期待する結果):
        assert_eq!(engine.store.history_for(&room("rust")).len(), 1);
    }

    #[tokio::test]
    async fn test_leave_confirmation_clears_the_active_room() {
        // テスト項目: leave 確認で参加中ルームが外れ、退室文が元のルームに残る
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine
            .apply_room_event(RoomEvent::RoomJoined { room: room("rust") })
            .await;

        // when (操作):
        engine
            .apply_room_event(RoomEvent::RoomLeft { room: room("rust") })
            .await;

        // then (期待する結果):
        assert!(engine.report().active_room.is_none());
        let history = engine.store.history_for(&room("rust"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].body.as_str(), "left rust");
    }

    #[tokio::test]
    async fn test_leave_confirmation_without_active_room_is_ignored() {
        // テスト項目: 参加中ルームがないときの leave 確認は無視される
        // given (前提条件):
        let mut engine = create_test_engine().await;

        // when (操作):
        engine
            .apply_room_event(RoomEvent::RoomLeft { room: room("rust") })
            .await;

        // then (期待する結果):
        assert!(engine.store.history_for(&room("rust")).is_empty());
    }

    #[tokio::test]
    async fn test_chat_messages_land_in_their_own_room() {
        // テスト項目: 発言は参加中でないルーム宛てでもそのルームに積まれる
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine
            .apply_room_event(RoomEvent::RoomJoined { room: room("rust") })
            .await;

        // when (操作):
        engine.apply_room_event(chat_event("tokio", "bob", "hi")).await;

        // then (期待する結果):
        assert_eq!(engine.store.history_for(&room("tokio")).len(), 1);
        assert!(engine.store.contains_room(&room("tokio")));
        assert_eq!(engine.report().active_room, Some(room("rust")));
    }

    #[tokio::test]
    async fn test_system_notice_lands_in_the_active_room() {
        // テスト項目: システム通知は参加中ルームに積まれ、非参加時は捨てられる
        // given (前提条件):
        let mut engine = create_test_engine().await;

        // when (操作): 参加前
        engine
            .apply_room_event(RoomEvent::System {
                body: MessageBody::new("maintenance".to_string()).unwrap(),
            })
            .await;

        // then (期待する結果):
        assert!(engine.store.history_for(&RoomId::general()).is_empty());

        // when (操作): 参加後
        engine
            .apply_room_event(RoomEvent::RoomJoined {
                room: RoomId::general(),
            })
            .await;
        engine
            .apply_room_event(RoomEvent::System {
                body: MessageBody::new("maintenance".to_string()).unwrap(),
            })
            .await;

        // then (期待する結果):
        let history = engine.store.history_for(&RoomId::general());
        assert_eq!(history.last().unwrap().body.as_str(), "maintenance");
    }

    #[tokio::test]
    async fn test_own_typing_notices_are_suppressed() {
        // テスト項目: 自分の typing 通知は集計されない
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine.self_username = Some(user("alice"));

        // when (操作):
        engine
            .apply_room_event(RoomEvent::Typing {
                room: RoomId::general(),
                username: user("alice"),
                typing: true,
            })
            .await;
        engine
            .apply_room_event(RoomEvent::Typing {
                room: RoomId::general(),
                username: user("bob"),
                typing: true,
            })
            .await;

        // then (期待する結果):
        let now = engine.now();
        assert_eq!(
            engine.typing.typists(&RoomId::general(), now),
            vec![user("bob")]
        );
    }

    #[tokio::test]
    async fn test_send_chat_while_disconnected_returns_false() {
        // テスト項目: 未接続時の送信は失敗を返し、送信数も増えない
        // given (前提条件):
        let mut engine = create_test_engine().await;

        // when (操作):
        let sent = engine.send_chat(RoomId::general(), "hello".to_string()).await;

        // then (期待する結果):
        assert!(!sent);
        assert_eq!(engine.store.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_typing_stop_while_disconnected_is_queued() {
        // テスト項目: 未接続時の typing=false は再接続後のリセットとして残る
        // given (前提条件):
        let mut engine = create_test_engine().await;

        // when (操作):
        engine.set_typing(RoomId::general(), true);
        engine.set_typing(room("rust"), false);

        // then (期待する結果):
        // true は残らず、false だけが持ち越される
        assert_eq!(engine.pending_typing_reset, Some(room("rust")));
    }

    #[tokio::test]
    async fn test_unexpected_close_schedules_one_reconnect() {
        // テスト項目: 現エポックの切断で再接続タイマーが 1 本だけ予約される
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine.bridge.set_session_for_tests(create_test_member("alice"));
        engine.status = ConnectionStatus::Open;
        engine.active_room = Some(room("rust"));

        // when (操作):
        engine.on_transport_closed(engine.epoch, TransportError::ServerClosed);

        // then (期待する結果):
        assert_eq!(engine.status, ConnectionStatus::Disconnected);
        assert_eq!(engine.retry_count, 1);
        assert!(engine.reconnect_timer.is_some());
        assert_eq!(engine.resume_room, Some(room("rust")));
        assert!(engine.report().active_room.is_none());

        // when (操作): 同じ切断がもう一度届いても
        engine.on_transport_closed(engine.epoch, TransportError::ServerClosed);

        // then (期待する結果): 二重予約にならない
        assert_eq!(engine.retry_count, 1);
    }

    #[tokio::test]
    async fn test_manual_connect_cancels_the_pending_reconnect() {
        // テスト項目: 再接続待ちの間に connect しても二重にならない
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine.bridge.set_session_for_tests(create_test_member("alice"));
        engine.status = ConnectionStatus::Open;
        engine.on_transport_closed(engine.epoch, TransportError::ServerClosed);
        assert!(engine.reconnect_timer.is_some());

        // when (操作): トークン発行が失敗するので接続は成立しない
        engine.connect().await;

        // then (期待する結果): タイマーは取り消され、再予約もされない
        assert!(engine.reconnect_timer.is_none());
        assert_eq!(engine.status, ConnectionStatus::Disconnected);
        assert!(engine.connect_task.is_none());
    }

    #[tokio::test]
    async fn test_send_chat_queues_exactly_one_outbound_frame() {
        // テスト項目: 送信成功で outbound キューにフレームが 1 件だけ載る
        // given (前提条件):
        let mut engine = create_test_engine().await;
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        engine.status = ConnectionStatus::Open;
        engine.outbound = Some(outbound_tx);

        // when (操作):
        let sent = engine.send_chat(RoomId::general(), "hi".to_string()).await;

        // then (期待する結果):
        assert!(sent);
        assert_eq!(engine.store.sent_count(), 1);
        let frame = outbound_rx.try_recv().expect("one frame should be queued");
        let WsMessage::Text(text) = frame else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["type"], "chat_message");
        assert_eq!(value["room_id"], "general");
        assert_eq!(value["content"], "hi");
        assert!(outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_without_session_does_not_reconnect() {
        // テスト項目: セッションがなければ切断後に再接続しない
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine.status = ConnectionStatus::Open;

        // when (操作):
        engine.on_transport_closed(engine.epoch, TransportError::ServerClosed);

        // then (期待する結果):
        assert!(engine.reconnect_timer.is_none());
        assert_eq!(engine.retry_count, 0);
    }

    #[tokio::test]
    async fn test_stale_epoch_close_is_ignored() {
        // テスト項目: 旧エポックの切断イベントは状態を変えない
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine.bridge.set_session_for_tests(create_test_member("alice"));
        engine.status = ConnectionStatus::Open;
        engine.epoch = 5;

        // when (操作):
        engine.on_transport_closed(4, TransportError::ServerClosed);

        // then (期待する結果):
        assert_eq!(engine.status, ConnectionStatus::Open);
        assert!(engine.reconnect_timer.is_none());
    }

    #[tokio::test]
    async fn test_stale_reconnect_timer_does_not_dial() {
        // テスト項目: エポックが進んだ後のタイマー満了は再接続しない
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine.bridge.set_session_for_tests(create_test_member("alice"));
        engine.epoch = 5;

        // when (操作):
        engine.on_reconnect_due(4).await;

        // then (期待する結果):
        assert_eq!(engine.status, ConnectionStatus::Disconnected);
        assert!(engine.connect_task.is_none());
    }

    #[tokio::test]
    async fn test_bad_frames_are_dropped_without_state_changes() {
        // テスト項目: 壊れたフレーム・不正なフィールドのフレームは無視される
        // given (前提条件):
        let mut engine = create_test_engine().await;
        engine.status = ConnectionStatus::Open;

        // when (操作):
        engine.on_transport_frame(engine.epoch, "not json").await;
        engine
            .on_transport_frame(
                engine.epoch,
                r#"{"type":"chat_message","room_id":"","username":"a","content":"x"}"#,
            )
            .await;

        // then (期待する結果):
        assert_eq!(engine.store.known_rooms(), vec![RoomId::general()]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_run_loop() {
        // テスト項目: Shutdown コマンドでエンジンのタスクが終了する
        // given (前提条件):
        let engine = create_test_engine().await;
        let handle = engine.handle();
        let task = tokio::spawn(engine.run());

        // when (操作):
        handle.shutdown();

        // then (期待する結果):
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("engine should stop")
            .expect("engine task should not panic");
    }
}
