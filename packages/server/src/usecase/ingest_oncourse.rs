//! UseCase: コース上の選手データの取り込み
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - IngestOnCourseUseCase::execute()
//!
//! ### なぜこのテストが必要か
//! - 取り込み → oncourse diff 配信 → 完走者の削除 の順序がライブ表示の前提になる
//! - 完走した選手の RunDetail が保存され、後から REST で取得できる必要がある
//!
//! ### どのような状況を想定しているか
//! - 正常系：走行中と完走済みが混在したバッチ
//! - 異常系：存在しないイベント
//! - エッジケース：空のバッチ（現在のアクティブ一覧を再配信する）

use std::sync::Arc;

use slalom_live_shared::protocol::{OnCourseRecord, RunDetail};

use crate::{
    domain::{CompetitionRepository, EventId},
    infrastructure::EphemeralTrackStore,
};

use super::{error::LiveDataError, publish_state::PublishStateUseCase};

/// Outcome of one ingestion batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct IngestSummary {
    pub accepted: usize,
    /// Competitors still on the course after the batch
    pub active: usize,
    /// Completed records purged after the broadcast
    pub removed: usize,
}

/// コース上データ取り込みのユースケース
pub struct IngestOnCourseUseCase {
    repository: Arc<dyn CompetitionRepository>,
    track_store: Arc<EphemeralTrackStore>,
    publisher: Arc<PublishStateUseCase>,
}

impl IngestOnCourseUseCase {
    pub fn new(
        repository: Arc<dyn CompetitionRepository>,
        track_store: Arc<EphemeralTrackStore>,
        publisher: Arc<PublishStateUseCase>,
    ) -> Self {
        Self {
            repository,
            track_store,
            publisher,
        }
    }

    /// バッチを取り込み、oncourse diff を配信してから完走済みの選手を削除する
    ///
    /// 完走した選手はこのバッチの diff には含まれず、次の取り込みまでに
    /// トラックストアから取り除かれます。
    pub async fn execute(
        &self,
        event_id: &EventId,
        records: Vec<OnCourseRecord>,
    ) -> Result<IngestSummary, LiveDataError> {
        if self.repository.get_event(event_id).await?.is_none() {
            return Err(LiveDataError::EventNotFound(event_id.to_string()));
        }

        let accepted = records.len();
        for record in records.iter().filter(|r| r.dt_finish.is_some()) {
            self.repository
                .save_run_detail(event_id, run_detail_of(record))
                .await?;
        }

        self.track_store.upsert_batch(event_id, records).await;
        let active = self.track_store.get_active(event_id).await.len();
        self.publisher.broadcast_oncourse(event_id).await;
        let removed = self.track_store.cleanup_finished(event_id).await;

        tracing::debug!(
            "Ingested {} on-course records for '{}' ({} active, {} finished)",
            accepted,
            event_id,
            active,
            removed
        );
        Ok(IngestSummary {
            accepted,
            active,
            removed,
        })
    }
}

fn run_detail_of(record: &OnCourseRecord) -> RunDetail {
    RunDetail {
        race_id: record.race_id.clone(),
        bib: record.bib,
        dt_start: record.dt_start.clone(),
        dt_finish: record.dt_finish.clone(),
        time: record.time,
        pen: Some(record.pen),
        total: record.total,
        gates: record.gates.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        infrastructure::{ConnectionHandle, Outbound},
        usecase::test_support::{Fixture, event_id, fixture},
    };
    use slalom_live_shared::protocol::{EventStatus, ServerMessage};

    fn create_usecase(fixture: &Fixture) -> IngestOnCourseUseCase {
        let publisher = Arc::new(PublishStateUseCase::new(
            fixture.repository.clone(),
            fixture.registry.clone(),
            fixture.track_store.clone(),
        ));
        IngestOnCourseUseCase::new(
            fixture.repository.clone(),
            fixture.track_store.clone(),
            publisher,
        )
    }

    fn record(bib: u32, position: u32, finished: bool) -> OnCourseRecord {
        OnCourseRecord {
            race_id: "K1M-final".to_string(),
            bib,
            name: format!("Athlete {}", bib),
            position,
            gates: vec![Some(0), Some(2), None],
            dt_start: Some("10:00:00.00".to_string()),
            dt_finish: finished.then(|| "10:01:25.20".to_string()),
            time: finished.then_some(8320),
            pen: 2,
            total: finished.then_some(8520),
            ..OnCourseRecord::default()
        }
    }

    #[tokio::test]
    async fn test_ingest_broadcasts_active_and_purges_finished() {
        // テスト項目: アクティブな選手だけが配信され、完走者はその後削除される
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);
        let (handle, mut rx) = ConnectionHandle::channel();
        fixture.registry.join(event_id("E1"), handle).await;

        // when (操作):
        let summary = usecase
            .execute(
                &event_id("E1"),
                vec![record(12, 1, true), record(13, 2, false)],
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            summary,
            IngestSummary {
                accepted: 2,
                active: 1,
                removed: 1
            }
        );
        let Ok(Outbound::Text(text)) = rx.try_recv() else {
            panic!("expected a text frame");
        };
        let ServerMessage::Diff(diff) = ServerMessage::parse(&text).unwrap() else {
            panic!("expected diff");
        };
        let bibs: Vec<u32> = diff.oncourse.unwrap().iter().map(|r| r.bib).collect();
        assert_eq!(bibs, vec![13]);
        assert_eq!(fixture.track_store.len(&event_id("E1")).await, 1);
    }

    #[tokio::test]
    async fn test_ingest_saves_run_detail_of_finished_competitor() {
        // テスト項目: 完走した選手の RunDetail が保存される
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);

        // when (操作):
        usecase
            .execute(&event_id("E1"), vec![record(12, 1, true), record(13, 2, false)])
            .await
            .unwrap();

        // then (期待する結果):
        let detail = fixture
            .repository
            .get_run_detail(&event_id("E1"), "K1M-final", 12)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.total, Some(8520));
        assert_eq!(detail.gates, vec![Some(0), Some(2), None]);
        assert!(
            fixture
                .repository
                .get_run_detail(&event_id("E1"), "K1M-final", 13)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_ingest_for_unknown_event() {
        // テスト項目: 存在しないイベントへの取り込みはエラーになり、何も保持されない
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);

        // when (操作):
        let result = usecase
            .execute(&event_id("E404"), vec![record(1, 1, false)])
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(LiveDataError::EventNotFound("E404".to_string()))
        );
        assert_eq!(fixture.track_store.len(&event_id("E404")).await, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_rebroadcasts_current_list() {
        // テスト項目: 空のバッチでも現在のアクティブ一覧が配信される
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);
        usecase
            .execute(&event_id("E1"), vec![record(13, 1, false)])
            .await
            .unwrap();
        let (handle, mut rx) = ConnectionHandle::channel();
        fixture.registry.join(event_id("E1"), handle).await;

        // when (操作):
        let summary = usecase.execute(&event_id("E1"), Vec::new()).await.unwrap();

        // then (期待する結果):
        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.active, 1);
        assert!(matches!(rx.try_recv(), Ok(Outbound::Text(_))));
    }
}
