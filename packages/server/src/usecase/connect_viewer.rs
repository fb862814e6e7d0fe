//! UseCase: 視聴者の接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectViewerUseCase::admit()（アップグレード前の判定）
//! - ConnectViewerUseCase::open_session()（full の送信とルームへの参加を 1 回のロックで行う）
//!
//! ### なぜこのテストが必要か
//! - 404 / 410 / 503 の判定は状態を作る前に行われる必要がある
//! - 接続直後に full がちょうど 1 回、他のどのメッセージよりも先に届くことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：running のイベントへの接続
//! - 異常系：存在しない / draft / official のイベント、満員のルーム、ストア障害
//! - エッジケース：切断済み接続の離脱（何もしない）

use std::sync::Arc;

use slalom_live_shared::protocol::ServerMessage;

use crate::{
    domain::{CompetitionRepository, ConnectionId, EventId, check_admission},
    infrastructure::{ConnectionHandle, ConnectionRegistry},
};

use super::{
    error::{ConnectError, LiveDataError},
    publish_state::PublishStateUseCase,
};

/// 視聴者接続のユースケース
pub struct ConnectViewerUseCase {
    repository: Arc<dyn CompetitionRepository>,
    registry: Arc<ConnectionRegistry>,
    publisher: Arc<PublishStateUseCase>,
}

impl ConnectViewerUseCase {
    pub fn new(
        repository: Arc<dyn CompetitionRepository>,
        registry: Arc<ConnectionRegistry>,
        publisher: Arc<PublishStateUseCase>,
    ) -> Self {
        Self {
            repository,
            registry,
            publisher,
        }
    }

    /// アップグレード前の判定
    ///
    /// # Returns
    ///
    /// * `Ok(())` - 接続を受け入れる
    /// * `Err(ConnectError::Rejected(_))` - 404 / 410 / 503 で拒否する
    pub async fn admit(&self, event_id: &EventId) -> Result<(), ConnectError> {
        let status = self
            .repository
            .get_event(event_id)
            .await?
            .map(|event| event.status());
        let room_size = self.registry.room_size(event_id).await;
        check_admission(status, room_size, self.registry.config().room_capacity)?;
        Ok(())
    }

    /// アップグレード後のセッション開始
    ///
    /// full スナップショットの組み立てからルームへの参加までをレジストリのロック内で行うため、
    /// その間のブロードキャストも取りこぼさず、必ず full の後に届きます。
    pub async fn open_session(
        &self,
        event_id: &EventId,
        handle: ConnectionHandle,
    ) -> Result<(), ConnectError> {
        let connection_id = handle.id().clone();
        let publisher = &self.publisher;
        self.registry
            .join_with_initial(event_id.clone(), handle, || async move {
                let full = publisher
                    .compose_full(event_id)
                    .await
                    .map_err(|e| match e {
                        LiveDataError::Repository(e) => ConnectError::Repository(e),
                        _ => ConnectError::EventNotFound(event_id.to_string()),
                    })?;
                let json = ServerMessage::Full(full)
                    .to_json()
                    .map_err(|e| ConnectError::Encode(e.to_string()))?;
                Ok::<_, ConnectError>(json.into())
            })
            .await?;

        tracing::info!(
            "Viewer '{}' joined event '{}' ({} viewers)",
            connection_id,
            event_id,
            self.registry.room_size(event_id).await
        );
        Ok(())
    }

    /// pong を受信した
    pub async fn record_pong(&self, connection_id: &ConnectionId) {
        self.registry.record_pong(connection_id).await;
    }

    /// 接続終了時の後片付け（既にレジストリから外れていれば何もしない）
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        if self.registry.leave(connection_id).await {
            tracing::info!("Viewer '{}' disconnected", connection_id);
        }
    }
}
