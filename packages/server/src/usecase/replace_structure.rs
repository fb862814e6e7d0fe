//! UseCase: イベント構造の一括置き換え（再インポート）

use std::sync::Arc;

use slalom_live_shared::protocol::FullStatePayload;

use crate::domain::{CompetitionRepository, EventId, StoredEvent};

use super::{error::LiveDataError, publish_state::PublishStateUseCase};

/// 構造置き換えのユースケース
///
/// 構造の変更は diff で表せないため、保存後にルーム全体へ full を再送します。
pub struct ReplaceStructureUseCase {
    repository: Arc<dyn CompetitionRepository>,
    publisher: Arc<PublishStateUseCase>,
}

impl ReplaceStructureUseCase {
    pub fn new(
        repository: Arc<dyn CompetitionRepository>,
        publisher: Arc<PublishStateUseCase>,
    ) -> Self {
        Self {
            repository,
            publisher,
        }
    }

    /// Store the structure under `event_id` and re-send `full` to the room.
    ///
    /// The payload's `categories` are ignored; they are always re-aggregated
    /// from the classes. The event id in the payload is overwritten with the
    /// path id. Returns the number of viewers the snapshot was queued to.
    pub async fn execute(
        &self,
        event_id: &EventId,
        payload: FullStatePayload,
    ) -> Result<usize, LiveDataError> {
        let mut detail = payload.event;
        detail.event_id = event_id.to_string();
        let event = StoredEvent::new(detail, payload.classes, payload.races);

        self.repository.save_event(event_id, event).await?;
        self.publisher.broadcast_full(event_id).await
    }
}
