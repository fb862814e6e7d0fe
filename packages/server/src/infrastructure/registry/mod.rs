//! ConnectionRegistry: イベントごとのルームで WebSocket 接続を管理する
//!
//! ## 責務
//!
//! - ルームへの参加・離脱（空になったルームは削除）
//! - full / diff / refresh のブロードキャスト（1 回だけシリアライズして全員に送る）
//! - ping/pong によるハートビートと、応答しない接続の切断
//! - 猶予付きのルームクローズと、プロセス終了時の一括クローズ
//!
//! ## 設計ノート
//!
//! ソケットの書き込みは接続ごとの writer タスク（UI 層）が担当します。
//! レジストリは `ConnectionHandle`（writer タスクへの unbounded sender）だけを保持するため、
//! ブロードキャストはソケット I/O を待たずに即座に戻ります。
//! ルームの状態は 1 つの `Mutex` で保護され、join/leave・ブロードキャスト・
//! ハートビートの走査は互いに排他になります。

mod connection;

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use serde::Serialize;
use slalom_live_shared::{
    protocol::{DiffPayload, FullStatePayload, ServerMessage},
    time::{get_timestamp_millis, timestamp_to_rfc3339},
};
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};

use crate::{
    config::SyncConfig,
    domain::{ConnectionId, EventId},
};

pub use connection::{ConnectionHandle, Outbound};
use connection::TrackedConnection;

/// Room membership plus a reverse index from connection to room
#[derive(Debug, Default)]
struct Rooms {
    rooms: HashMap<EventId, HashMap<ConnectionId, TrackedConnection>>,
    index: HashMap<ConnectionId, EventId>,
}

impl Rooms {
    fn insert(&mut self, connection: TrackedConnection) {
        let id = connection.handle.id().clone();
        // A connection belongs to exactly one room
        self.remove(&id);
        self.index.insert(id.clone(), connection.room.clone());
        self.rooms
            .entry(connection.room.clone())
            .or_default()
            .insert(id, connection);
    }

    fn remove(&mut self, id: &ConnectionId) -> Option<TrackedConnection> {
        let room_id = self.index.remove(id)?;
        let members = self.rooms.get_mut(&room_id)?;
        let removed = members.remove(id);
        if members.is_empty() {
            self.rooms.remove(&room_id);
        }
        removed
    }

    fn take_room(&mut self, room_id: &EventId) -> Vec<TrackedConnection> {
        let Some(members) = self.rooms.remove(room_id) else {
            return Vec::new();
        };
        for id in members.keys() {
            self.index.remove(id);
        }
        members.into_values().collect()
    }

    fn size(&self, room_id: &EventId) -> usize {
        self.rooms.get(room_id).map_or(0, HashMap::len)
    }
}

/// Debug view of one room
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub event_id: EventId,
    pub connections: Vec<ConnectionSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub connection_id: ConnectionId,
    pub joined_at: String,
    pub alive: bool,
}

/// Registry of viewer connections grouped into per-event rooms
pub struct ConnectionRegistry {
    rooms: Mutex<Rooms>,
    config: SyncConfig,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionRegistry {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            rooms: Mutex::new(Rooms::default()),
            config,
            heartbeat_task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ========================================
    // Membership
    // ========================================

    /// Add a connection to the room of `room_id`, creating the room if needed.
    ///
    /// The connection starts out alive; pongs are reported via [`Self::record_pong`].
    pub async fn join(&self, room_id: EventId, handle: ConnectionHandle) {
        let mut rooms = self.rooms.lock().await;
        Self::track(&mut rooms, room_id, handle);
    }

    /// Queue the frame built by `initial` to the connection, then join the room.
    ///
    /// `initial` runs while the room lock is held: broadcasts issued while it
    /// runs wait for the join and arrive after the initial frame. Nothing is
    /// queued and the connection does not join if `initial` fails.
    pub async fn join_with_initial<F, Fut, E>(
        &self,
        room_id: EventId,
        handle: ConnectionHandle,
        initial: F,
    ) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<str>, E>>,
    {
        let mut rooms = self.rooms.lock().await;
        let frame = initial().await?;
        handle.send(Outbound::Text(frame));
        Self::track(&mut rooms, room_id, handle);
        Ok(())
    }

    fn track(rooms: &mut Rooms, room_id: EventId, handle: ConnectionHandle) {
        let id = handle.id().clone();
        rooms.insert(TrackedConnection::new(
            handle,
            room_id.clone(),
            get_timestamp_millis(),
        ));
        tracing::debug!(
            "Connection '{}' joined room '{}' ({} members)",
            id,
            room_id,
            rooms.size(&room_id)
        );
    }

    /// Remove a connection from its room. Returns `false` if it was not tracked.
    pub async fn leave(&self, id: &ConnectionId) -> bool {
        let mut rooms = self.rooms.lock().await;
        match rooms.remove(id) {
            Some(connection) => {
                tracing::debug!("Connection '{}' left room '{}'", id, connection.room);
                true
            }
            None => false,
        }
    }

    /// Mark a connection alive after a pong
    pub async fn record_pong(&self, id: &ConnectionId) {
        let mut rooms = self.rooms.lock().await;
        let Some(room_id) = rooms.index.get(id).cloned() else {
            return;
        };
        if let Some(connection) = rooms
            .rooms
            .get_mut(&room_id)
            .and_then(|members| members.get_mut(id))
        {
            connection.alive = true;
        }
    }

    /// `true` iff the room has fewer members than the configured capacity.
    ///
    /// The registry only reports; callers enforce the cap before upgrading.
    pub async fn can_accept(&self, room_id: &EventId) -> bool {
        self.room_size(room_id).await < self.config.room_capacity
    }

    pub async fn room_size(&self, room_id: &EventId) -> usize {
        self.rooms.lock().await.size(room_id)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.rooms.len()
    }

    pub async fn summaries(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.lock().await;
        let mut summaries: Vec<RoomSummary> = rooms
            .rooms
            .iter()
            .map(|(event_id, members)| RoomSummary {
                event_id: event_id.clone(),
                connections: members
                    .values()
                    .map(|connection| ConnectionSummary {
                        connection_id: connection.handle.id().clone(),
                        joined_at: timestamp_to_rfc3339(connection.joined_at),
                        alive: connection.alive,
                    })
                    .collect(),
            })
            .collect();
        summaries.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        summaries
    }

    // ========================================
    // Broadcast
    // ========================================

    pub async fn broadcast_full(&self, room_id: &EventId, payload: FullStatePayload) -> usize {
        self.broadcast(room_id, &ServerMessage::Full(payload)).await
    }

    /// Broadcast a diff; a diff without results, on-course data or status is not sent.
    pub async fn broadcast_diff(&self, room_id: &EventId, payload: DiffPayload) -> usize {
        if payload.is_empty() {
            tracing::debug!("Skipping empty diff for room '{}'", room_id);
            return 0;
        }
        self.broadcast(room_id, &ServerMessage::Diff(payload)).await
    }

    pub async fn broadcast_refresh(&self, room_id: &EventId) -> usize {
        self.broadcast(room_id, &ServerMessage::Refresh).await
    }

    /// Queue `message` to every open connection of the room.
    ///
    /// Returns the number of connections the frame was queued to. A missing
    /// room is a no-op and is not created; closed connections are skipped.
    async fn broadcast(&self, room_id: &EventId, message: &ServerMessage) -> usize {
        let rooms = self.rooms.lock().await;
        let Some(members) = rooms.rooms.get(room_id) else {
            tracing::debug!(
                "No viewers in room '{}', skipping {} broadcast",
                room_id,
                message.kind()
            );
            return 0;
        };

        let text: Arc<str> = match message.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!("Failed to serialize {} message: {}", message.kind(), e);
                return 0;
            }
        };

        let delivered = members
            .values()
            .filter(|connection| connection.handle.is_open())
            .filter(|connection| connection.handle.send(Outbound::Text(text.clone())))
            .count();

        tracing::debug!(
            "Broadcasted {} to {}/{} connections in room '{}'",
            message.kind(),
            delivered,
            members.len(),
            room_id
        );
        delivered
    }

    // ========================================
    // Heartbeat
    // ========================================

    /// One liveness sweep over every connection of every room.
    ///
    /// Connections that have not ponged since the previous sweep are
    /// terminated and evicted; all others are marked not-alive and pinged.
    /// Returns the number of evicted connections.
    pub async fn heartbeat_tick(&self) -> usize {
        let mut rooms = self.rooms.lock().await;

        let mut stale = Vec::new();
        for members in rooms.rooms.values_mut() {
            for (id, connection) in members.iter_mut() {
                if !connection.alive {
                    connection.handle.send(Outbound::Terminate);
                    stale.push(id.clone());
                    continue;
                }
                connection.alive = false;
                connection.handle.send(Outbound::Ping);
            }
        }

        for id in &stale {
            if let Some(connection) = rooms.remove(id) {
                tracing::info!(
                    "Terminated unresponsive connection '{}' in room '{}'",
                    id,
                    connection.room
                );
            }
        }
        stale.len()
    }

    /// Start the process-wide heartbeat task. Calling it again is a no-op.
    pub async fn start_heartbeat(self: &Arc<Self>) {
        let mut task = self.heartbeat_task.lock().await;
        if task.is_some() {
            return;
        }

        let period = self.config.heartbeat_interval;
        let registry: Weak<Self> = Arc::downgrade(self);
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.heartbeat_tick().await;
                if evicted > 0 {
                    tracing::info!("Heartbeat evicted {} connections", evicted);
                }
            }
        }));
        tracing::debug!("Heartbeat started (interval {:?})", period);
    }

    // ========================================
    // Closing
    // ========================================

    /// Close every connection of a room after the grace period.
    ///
    /// Connections stay open and reachable by broadcasts until the grace
    /// period elapses, so a final broadcast sent right before is delivered.
    pub fn close_room(
        self: &Arc<Self>,
        room_id: EventId,
        code: u16,
        reason: impl Into<String>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let reason = reason.into();
        let grace = self.config.close_grace;
        tracing::info!(
            "Closing room '{}' in {:?} (code {}, reason '{}')",
            room_id,
            grace,
            code,
            reason
        );

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let connections = registry.rooms.lock().await.take_room(&room_id);
            for connection in connections.iter().filter(|c| c.handle.is_open()) {
                connection.handle.send(Outbound::Close {
                    code,
                    reason: reason.clone(),
                });
            }
            tracing::info!(
                "Closed room '{}' ({} connections)",
                room_id,
                connections.len()
            );
        })
    }

    /// Stop the heartbeat, close every connection immediately and clear all rooms.
    pub async fn shutdown(&self) {
        if let Some(task) = self.heartbeat_task.lock().await.take() {
            task.abort();
        }

        let mut rooms = self.rooms.lock().await;
        let mut closed = 0;
        for members in rooms.rooms.values() {
            for connection in members.values() {
                connection.handle.send(Outbound::Close {
                    code: crate::config::SHUTDOWN_CLOSE_CODE,
                    reason: "Server shutting down".to_string(),
                });
                closed += 1;
            }
        }
        rooms.rooms.clear();
        rooms.index.clear();
        tracing::info!("Registry shut down ({} connections closed)", closed);
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        if let Some(task) = self.heartbeat_task.get_mut().take() {
            task.abort();
        }
    }
}
