//! UseCase: ライブ状態の配信（StatePublisher）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - full スナップショットの組み立て（カテゴリ集約を含む）
//! - full / diff / refresh がイベントのルームにだけ届くこと
//!
//! ### なぜこのテストが必要か
//! - 取り込み・管理操作から配信されるメッセージの形がクライアントの前提になる
//! - 存在しないイベントの扱いを明確にする
//!
//! ### どのような状況を想定しているか
//! - 正常系：視聴者がいるルームへの配信
//! - 異常系：存在しないイベント
//! - エッジケース：視聴者がいないルーム（何もしない）

use std::sync::Arc;

use slalom_live_shared::protocol::{DiffPayload, EventStatus, FullStatePayload, ResultRecord};

use crate::{
    domain::{CompetitionRepository, EventId},
    infrastructure::{ConnectionRegistry, EphemeralTrackStore},
};

use super::error::LiveDataError;

/// ライブ状態配信のユースケース
///
/// クライアントからではなく、取り込みや管理操作などのコラボレータから呼ばれます。
/// 各メソッドは送信キューに積んだ接続数を返します（配信失敗は呼び出し元に伝えません）。
pub struct PublishStateUseCase {
    repository: Arc<dyn CompetitionRepository>,
    registry: Arc<ConnectionRegistry>,
    track_store: Arc<EphemeralTrackStore>,
}

impl PublishStateUseCase {
    pub fn new(
        repository: Arc<dyn CompetitionRepository>,
        registry: Arc<ConnectionRegistry>,
        track_store: Arc<EphemeralTrackStore>,
    ) -> Self {
        Self {
            repository,
            registry,
            track_store,
        }
    }

    /// 永続ストアの現在の内容から full スナップショットを組み立てる
    pub async fn compose_full(&self, event_id: &EventId) -> Result<FullStatePayload, LiveDataError> {
        let event = self
            .repository
            .get_event(event_id)
            .await?
            .ok_or_else(|| LiveDataError::EventNotFound(event_id.to_string()))?;
        Ok(event.to_full_state())
    }

    /// full スナップショットをルーム全体に再送（一括取り込みなどの構造変更後）
    pub async fn broadcast_full(&self, event_id: &EventId) -> Result<usize, LiveDataError> {
        let full = self.compose_full(event_id).await?;
        let delivered = self.registry.broadcast_full(event_id, full).await;
        tracing::info!("Published full state of '{}' to {} viewers", event_id, delivered);
        Ok(delivered)
    }

    /// 1 レース分のリザルト表を diff として配信
    pub async fn broadcast_race_results(
        &self,
        event_id: &EventId,
        race_id: &str,
        results: Vec<ResultRecord>,
    ) -> usize {
        self.registry
            .broadcast_diff(event_id, DiffPayload::race_results(race_id, results))
            .await
    }

    /// コース上の選手一覧（アクティブのみ）を diff として配信
    pub async fn broadcast_oncourse(&self, event_id: &EventId) -> usize {
        let active = self.track_store.get_active(event_id).await;
        self.registry
            .broadcast_diff(event_id, DiffPayload::oncourse(active))
            .await
    }

    pub async fn broadcast_status(&self, event_id: &EventId, status: EventStatus) -> usize {
        self.registry
            .broadcast_diff(event_id, DiffPayload::status(status))
            .await
    }

    pub async fn broadcast_refresh(&self, event_id: &EventId) -> usize {
        self.registry.broadcast_refresh(event_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        infrastructure::{ConnectionHandle, Outbound},
        usecase::test_support::{Fixture, event_id, fixture},
    };
    use slalom_live_shared::protocol::{OnCourseRecord, ServerMessage};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn create_usecase(fixture: &Fixture) -> PublishStateUseCase {
        PublishStateUseCase::new(
            fixture.repository.clone(),
            fixture.registry.clone(),
            fixture.track_store.clone(),
        )
    }

    fn next_message(rx: &mut UnboundedReceiver<Outbound>) -> ServerMessage {
        match rx.try_recv() {
            Ok(Outbound::Text(text)) => ServerMessage::parse(&text).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compose_full_state() {
        // テスト項目: 永続ストアの内容から full スナップショットが組み立てられる
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);

        // when (操作):
        let full = usecase.compose_full(&event_id("E1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(full.event.event_id, "E1");
        assert_eq!(full.races[0].race_id, "K1M-final");
        assert_eq!(full.categories.len(), 1);
        assert_eq!(full.categories[0].category_id, "SEN");
    }

    #[tokio::test]
    async fn test_compose_full_for_unknown_event() {
        // テスト項目: 存在しないイベントは EventNotFound になる
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);

        // when (操作):
        let result = usecase.compose_full(&event_id("E404")).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(LiveDataError::EventNotFound("E404".to_string()))
        );
    }

    #[tokio::test]
    async fn test_broadcast_full_reaches_room() {
        // テスト項目: full の再送がルームの全視聴者に届く
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);
        let (handle, mut rx) = ConnectionHandle::channel();
        fixture.registry.join(event_id("E1"), handle).await;

        // when (操作):
        let delivered = usecase.broadcast_full(&event_id("E1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert!(matches!(next_message(&mut rx), ServerMessage::Full(_)));
    }

    #[tokio::test]
    async fn test_broadcast_oncourse_sends_active_records_only() {
        // テスト項目: on-course の diff にはアクティブな選手だけが含まれる
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);
        let (handle, mut rx) = ConnectionHandle::channel();
        fixture.registry.join(event_id("E1"), handle).await;
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
        usecase.broadcast_oncourse(&event_id("E1")).await;

        // then (期待する結果):
        let ServerMessage::Diff(diff) = next_message(&mut rx) else {
            panic!("expected diff");
        };
        let oncourse = diff.oncourse.unwrap();
        assert_eq!(oncourse.len(), 1);
        assert_eq!(oncourse[0].bib, 2);
        assert!(diff.results.is_none());
    }

    #[tokio::test]
    async fn test_broadcast_without_viewers_is_noop() {
        // テスト項目: 視聴者がいない場合は何もせず、ルームも作られない
        // given (前提条件):
        let fixture = fixture(EventStatus::Running).await;
        let usecase = create_usecase(&fixture);

        // when (操作):
        let delivered = usecase
            .broadcast_status(&event_id("E1"), EventStatus::Checking)
            .await
            + usecase.broadcast_refresh(&event_id("E1")).await;

        // then (期待する結果):
        assert_eq!(delivered, 0);
        assert_eq!(fixture.registry.room_count().await, 0);
    }
}
