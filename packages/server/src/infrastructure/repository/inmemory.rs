//! InMemory Competition Repository 実装
//!
//! ドメイン層が定義する `CompetitionRepository` trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//!
//! 本来の永続ストア（リレーショナル DB）の代わりに、サーバー単体での動作確認と
//! テストのために用意しています。

use std::collections::HashMap;

use async_trait::async_trait;
use slalom_live_shared::protocol::{EventStatus, ResultRecord, RunDetail};
use tokio::sync::Mutex;

use crate::domain::{CompetitionRepository, EventId, RepositoryError, StoredEvent};

#[derive(Debug)]
struct EventData {
    event: StoredEvent,
    results: HashMap<String, Vec<ResultRecord>>,
    details: HashMap<(String, u32), RunDetail>,
}

impl EventData {
    fn new(event: StoredEvent) -> Self {
        Self {
            event,
            results: HashMap::new(),
            details: HashMap::new(),
        }
    }
}

/// インメモリ Competition Repository 実装
#[derive(Debug, Default)]
pub struct InMemoryCompetitionRepository {
    events: Mutex<HashMap<EventId, EventData>>,
}

impl InMemoryCompetitionRepository {
    /// 新しい InMemoryCompetitionRepository を作成
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompetitionRepository for InMemoryCompetitionRepository {
    async fn get_event(&self, event_id: &EventId) -> Result<Option<StoredEvent>, RepositoryError> {
        let events = self.events.lock().await;
        Ok(events.get(event_id).map(|data| data.event.clone()))
    }

    async fn save_event(
        &self,
        event_id: &EventId,
        event: StoredEvent,
    ) -> Result<(), RepositoryError> {
        let mut events = self.events.lock().await;
        match events.get_mut(event_id) {
            Some(data) => data.event = event,
            None => {
                events.insert(event_id.clone(), EventData::new(event));
            }
        }
        Ok(())
    }

    async fn set_status(
        &self,
        event_id: &EventId,
        status: EventStatus,
    ) -> Result<bool, RepositoryError> {
        let mut events = self.events.lock().await;
        match events.get_mut(event_id) {
            Some(data) => {
                data.event.detail.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_results(
        &self,
        event_id: &EventId,
        race_id: &str,
    ) -> Result<Vec<ResultRecord>, RepositoryError> {
        let events = self.events.lock().await;
        Ok(events
            .get(event_id)
            .and_then(|data| data.results.get(race_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_results(
        &self,
        event_id: &EventId,
        race_id: &str,
        results: Vec<ResultRecord>,
    ) -> Result<(), RepositoryError> {
        let mut events = self.events.lock().await;
        if let Some(data) = events.get_mut(event_id) {
            data.results.insert(race_id.to_string(), results);
        }
        Ok(())
    }

    async fn get_run_detail(
        &self,
        event_id: &EventId,
        race_id: &str,
        bib: u32,
    ) -> Result<Option<RunDetail>, RepositoryError> {
        let events = self.events.lock().await;
        Ok(events
            .get(event_id)
            .and_then(|data| data.details.get(&(race_id.to_string(), bib)))
            .cloned())
    }

    async fn save_run_detail(
        &self,
        event_id: &EventId,
        detail: RunDetail,
    ) -> Result<(), RepositoryError> {
        let mut events = self.events.lock().await;
        if let Some(data) = events.get_mut(event_id) {
            data.details
                .insert((detail.race_id.clone(), detail.bib), detail);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slalom_live_shared::protocol::EventDetail;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - イベント構造の保存・取得・ステータス更新
    // - リザルトと走行詳細の保存・取得
    //
    // 【どのようなシナリオをテストするか】
    // 1. 保存したイベントを取得できる
    // 2. 存在しないイベントのステータス更新は false
    // 3. リザルトの置き換え
    // 4. 存在しないイベントへの書き込みは無視される
    // ========================================

    fn event_id(id: &str) -> EventId {
        EventId::new(id.to_string()).unwrap()
    }

    fn stored_event(id: &str, status: EventStatus) -> StoredEvent {
        StoredEvent::new(
            EventDetail {
                event_id: id.to_string(),
                main_title: "Test Cup".to_string(),
                status,
                ..EventDetail::default()
            },
            vec![],
            vec![],
        )
    }

    #[tokio::test]
    async fn test_save_and_get_event() {
        // テスト項目: 保存したイベントを取得できる
        // given (前提条件):
        let repo = InMemoryCompetitionRepository::new();

        // when (操作):
        repo.save_event(&event_id("E1"), stored_event("E1", EventStatus::Running))
            .await
            .unwrap();

        // then (期待する結果):
        let event = repo.get_event(&event_id("E1")).await.unwrap().unwrap();
        assert_eq!(event.detail.main_title, "Test Cup");
        assert!(repo.get_event(&event_id("E2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_status() {
        // テスト項目: ステータスを更新でき、存在しないイベントは false を返す
        // given (前提条件):
        let repo = InMemoryCompetitionRepository::new();
        repo.save_event(&event_id("E1"), stored_event("E1", EventStatus::Running))
            .await
            .unwrap();

        // when (操作):
        let updated = repo
            .set_status(&event_id("E1"), EventStatus::Finished)
            .await
            .unwrap();
        let missing = repo
            .set_status(&event_id("E2"), EventStatus::Finished)
            .await
            .unwrap();

        // then (期待する結果):
        assert!(updated);
        assert!(!missing);
        let event = repo.get_event(&event_id("E1")).await.unwrap().unwrap();
        assert_eq!(event.status(), EventStatus::Finished);
    }

    #[tokio::test]
    async fn test_replace_results_and_details() {
        // テスト項目: リザルトは置き換えられ、走行詳細は (raceId, bib) で取得できる
        // given (前提条件):
        let repo = InMemoryCompetitionRepository::new();
        repo.save_event(&event_id("E1"), stored_event("E1", EventStatus::Running))
            .await
            .unwrap();
        let first = vec![ResultRecord {
            bib: Some(1),
            rnk: Some(1),
            ..ResultRecord::default()
        }];
        let second = vec![ResultRecord {
            bib: Some(2),
            rnk: Some(1),
            ..ResultRecord::default()
        }];

        // when (操作):
        repo.replace_results(&event_id("E1"), "K1M", first).await.unwrap();
        repo.replace_results(&event_id("E1"), "K1M", second).await.unwrap();
        repo.save_run_detail(
            &event_id("E1"),
            RunDetail {
                race_id: "K1M".to_string(),
                bib: 2,
                total: Some(9012),
                ..RunDetail::default()
            },
        )
        .await
        .unwrap();

        // then (期待する結果):
        let results = repo.get_results(&event_id("E1"), "K1M").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bib, Some(2));
        let detail = repo
            .get_run_detail(&event_id("E1"), "K1M", 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.total, Some(9012));
    }

    #[tokio::test]
    async fn test_writes_to_unknown_event_are_ignored() {
        // テスト項目: 存在しないイベントへのリザルト書き込みは無視される
        // given (前提条件):
        let repo = InMemoryCompetitionRepository::new();

        // when (操作):
        repo.replace_results(&event_id("E9"), "K1M", vec![ResultRecord::default()])
            .await
            .unwrap();

        // then (期待する結果):
        assert!(repo.get_results(&event_id("E9"), "K1M").await.unwrap().is_empty());
    }
}
