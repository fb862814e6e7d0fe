//! UseCase: イベントステータスの変更
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ChangeEventStatusUseCase::execute()
//!
//! ### なぜこのテストが必要か
//! - finished でコース上データが消え、official でルームが閉じられる
//! - official では refresh と close が猶予期間内に届く必要がある
//!
//! ### どのような状況を想定しているか
//! - 正常系：running → checking / finished / official
//! - 異常系：存在しないイベント

use std::sync::Arc;

use slalom_live_shared::protocol::EventStatus;

use crate::{
    config::OFFICIAL_CLOSE_CODE,
    domain::{CompetitionRepository, EventId},
    infrastructure::{ConnectionRegistry, EphemeralTrackStore},
};

use super::{error::LiveDataError, publish_state::PublishStateUseCase};

const OFFICIAL_CLOSE_REASON: &str = "Event is official";

/// ステータス変更のユースケース
pub struct ChangeEventStatusUseCase {
    repository: Arc<dyn CompetitionRepository>,
    registry: Arc<ConnectionRegistry>,
    track_store: Arc<EphemeralTrackStore>,
    publisher: Arc<PublishStateUseCase>,
}

impl ChangeEventStatusUseCase {
    pub fn new(
        repository: Arc<dyn CompetitionRepository>,
        registry: Arc<ConnectionRegistry>,
        track_store: Arc<EphemeralTrackStore>,
        publisher: Arc<PublishStateUseCase>,
    ) -> Self {
        Self {
            repository,
            registry,
            track_store,
            publisher,
        }
    }

    /// ステータスを保存して diff を配信する
    ///
    /// - `finished`: コース上データを破棄する
    /// - `official`: refresh を送ってからルームを閉じる（猶予期間後に 1000 で close）
    pub async fn execute(
        &self,
        event_id: &EventId,
        status: EventStatus,
    ) -> Result<(), LiveDataError> {
        if !self.repository.set_status(event_id, status).await? {
            return Err(LiveDataError::EventNotFound(event_id.to_string()));
        }
        tracing::info!("Event '{}' is now {}", event_id, status);

        self.publisher.broadcast_status(event_id, status).await;
        match status {
            EventStatus::Finished => self.track_store.clear(event_id).await,
            EventStatus::Official => {
                self.track_store.clear(event_id).await;
                self.publisher.broadcast_refresh(event_id).await;
                self.registry.close_room(
                    event_id.clone(),
                    OFFICIAL_CLOSE_CODE,
                    OFFICIAL_CLOSE_REASON.to_string(),
                );
            }
            _ => {}
        }
        Ok(())
    }
}
