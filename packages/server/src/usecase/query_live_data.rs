//! UseCase: ライブデータの参照（REST の bootstrap / refresh / polling 用）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - GetLiveDataUseCase の各参照メソッド
//!
//! ### なぜこのテストが必要か
//! - refresh とポーリングのフォールバックは WebSocket と同じ内容を REST から得る必要がある
//! - draft のイベントは WebSocket と同様に公開しない
//!
//! ### どのような状況を想定しているか
//! - 正常系：full / results / oncourse / run detail の取得
//! - 異常系：存在しないイベント・レース・走行、draft のイベント

use std::sync::Arc;

use slalom_live_shared::protocol::{
    EventStatus, FullStatePayload, OnCourseRecord, ResultRecord, RunDetail,
};

use crate::{
    domain::{CompetitionRepository, EventId, StoredEvent},
    infrastructure::EphemeralTrackStore,
};

use super::error::LiveDataError;

/// ライブデータ参照のユースケース
pub struct GetLiveDataUseCase {
    repository: Arc<dyn CompetitionRepository>,
    track_store: Arc<EphemeralTrackStore>,
}

impl GetLiveDataUseCase {
    pub fn new(
        repository: Arc<dyn CompetitionRepository>,
        track_store: Arc<EphemeralTrackStore>,
    ) -> Self {
        Self {
            repository,
            track_store,
        }
    }

    async fn published_event(&self, event_id: &EventId) -> Result<StoredEvent, LiveDataError> {
        match self.repository.get_event(event_id).await? {
            Some(event) if event.status() != EventStatus::Draft => Ok(event),
            _ => Err(LiveDataError::EventNotFound(event_id.to_string())),
        }
    }

    async fn published_race(
        &self,
        event_id: &EventId,
        race_id: &str,
    ) -> Result<StoredEvent, LiveDataError> {
        let event = self.published_event(event_id).await?;
        if !event.has_race(race_id) {
            return Err(LiveDataError::RaceNotFound {
                event_id: event_id.to_string(),
                race_id: race_id.to_string(),
            });
        }
        Ok(event)
    }

    /// REST bootstrap と同じ full スナップショット
    pub async fn full_state(&self, event_id: &EventId) -> Result<FullStatePayload, LiveDataError> {
        Ok(self.published_event(event_id).await?.to_full_state())
    }

    pub async fn race_results(
        &self,
        event_id: &EventId,
        race_id: &str,
    ) -> Result<Vec<ResultRecord>, LiveDataError> {
        self.published_race(event_id, race_id).await?;
        Ok(self.repository.get_results(event_id, race_id).await?)
    }

    /// コース上の選手（アクティブのみ、位置順）
    pub async fn oncourse(&self, event_id: &EventId) -> Result<Vec<OnCourseRecord>, LiveDataError> {
        self.published_event(event_id).await?;
        Ok(self.track_store.get_active(event_id).await)
    }

    /// 1 走の詳細（`None` は未完走または未記録）
    pub async fn run_detail(
        &self,
        event_id: &EventId,
        race_id: &str,
        bib: u32,
    ) -> Result<Option<RunDetail>, LiveDataError> {
        self.published_race(event_id, race_id).await?;
        Ok(self.repository.get_run_detail(event_id, race_id, bib).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::test_support::{Fixture, event_id, fixture};

    fn create_usecase(fixture: &Fixture) -> GetLiveDataUseCase {
        GetLiveDataUseCase::new(fixture.repository.clone(), fixture.track_store.clone())
    }

    #[tokio::test]
    async fn test_full_state_of_published_event() {
        // テスト項目: 公開中のイベントの full スナップショットを取得できる
        // given (前提条件):
        let fixture = fixture(EventStatus::Official).await;
        let usecase = create_usecase(&fixture);

        // when (操作):
        let full = usecase.full_state(&event_id("E1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(full.event.status, EventStatus::Official);
        assert_eq!(full.categories.len(), 1);
    }

    #[tokio::test]
    async fn test_draft_event_is_not_found() {
        // テスト項目: draft のイベントは存在しないものとして扱われる
        // given (前提条件):
        let fixture = fixture(EventStatus::Draft).await;
        let usecase = create_usecase(&fixture);

        // when (操作):
        let full = usecase.full_state(&event_id("E1")).await;
        let oncourse = usecase.oncourse(&event_id("E1")).await;

        // then (期待する結果):
        assert_eq!(full, Err(LiveDataError::EventNotFound("E1".to_string())));
        assert_eq!(
            oncourse,
            Err(LiveDataError::EventNotFound("E1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_race_results_and_unknown_race() {
        // テスト項目: 既存レースのリザルトを取得でき、存在しないレースはエラーになる
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);
        fixture
            .repository
            .replace_results(
                &event_id("E1"),
                "K1M-final",
                vec![ResultRecord {
                    bib: Some(12),
                    rnk: Some(1),
                    total: Some(8520),
                    ..ResultRecord::default()
                }],
            )
            .await
            .unwrap();

        // when (操作):
        let results = usecase.race_results(&event_id("E1"), "K1M-final").await;
        let unknown = usecase.race_results(&event_id("E1"), "C1W-final").await;

        // then (期待する結果):
        assert_eq!(results.unwrap().len(), 1);
        assert_eq!(
            unknown,
            Err(LiveDataError::RaceNotFound {
                event_id: "E1".to_string(),
                race_id: "C1W-final".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_oncourse_returns_active_records() {
        // テスト項目: コース上の一覧には完走済みの選手が含まれない
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);
        fixture
            .track_store
            .upsert_batch(
                &event_id("E1"),
                vec![
                    OnCourseRecord {
                        race_id: "K1M-final".to_string(),
                        bib: 1,
                        position: 1,
                        dt_finish: Some("10:01:00.00".to_string()),
                        ..OnCourseRecord::default()
                    },
                    OnCourseRecord {
                        race_id: "K1M-final".to_string(),
                        bib: 2,
                        position: 2,
                        ..OnCourseRecord::default()
                    },
                ],
            )
            .await;

        // when (操作):
        let oncourse = usecase.oncourse(&event_id("E1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(oncourse.len(), 1);
        assert_eq!(oncourse[0].bib, 2);
    }

    #[tokio::test]
    async fn test_run_detail_missing_run() {
        // テスト項目: 記録のない走行は None になる
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);

        // when (操作):
        let detail = usecase.run_detail(&event_id("E1"), "K1M-final", 99).await;

        // then (期待する結果):
        assert_eq!(detail, Ok(None));
    }
}
