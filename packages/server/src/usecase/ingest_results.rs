//! UseCase: レースのリザルト表の取り込み
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - IngestResultsUseCase::execute()
//!
//! ### なぜこのテストが必要か
//! - リザルト表は raceId とセットで丸ごと配信される（クライアントは bib 単位でマージする）
//!
//! ### どのような状況を想定しているか
//! - 正常系：既存レースへの取り込み
//! - 異常系：存在しないイベント / レース

use std::sync::Arc;

use slalom_live_shared::protocol::ResultRecord;

use crate::domain::{CompetitionRepository, EventId};

use super::{error::LiveDataError, publish_state::PublishStateUseCase};

/// リザルト取り込みのユースケース
pub struct IngestResultsUseCase {
    repository: Arc<dyn CompetitionRepository>,
    publisher: Arc<PublishStateUseCase>,
}

impl IngestResultsUseCase {
    pub fn new(
        repository: Arc<dyn CompetitionRepository>,
        publisher: Arc<PublishStateUseCase>,
    ) -> Self {
        Self {
            repository,
            publisher,
        }
    }

    /// リザルト表を置き換えて、そのレースの diff を配信する
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - diff を積んだ接続数
    pub async fn execute(
        &self,
        event_id: &EventId,
        race_id: &str,
        results: Vec<ResultRecord>,
    ) -> Result<usize, LiveDataError> {
        let event = self
            .repository
            .get_event(event_id)
            .await?
            .ok_or_else(|| LiveDataError::EventNotFound(event_id.to_string()))?;
        if !event.has_race(race_id) {
            return Err(LiveDataError::RaceNotFound {
                event_id: event_id.to_string(),
                race_id: race_id.to_string(),
            });
        }

        self.repository
            .replace_results(event_id, race_id, results.clone())
            .await?;
        let delivered = self
            .publisher
            .broadcast_race_results(event_id, race_id, results)
            .await;
        tracing::debug!(
            "Published results of '{}/{}' to {} viewers",
            event_id,
            race_id,
            delivered
        );
        Ok(delivered)
    }
}
