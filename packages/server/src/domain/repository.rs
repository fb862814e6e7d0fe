//! Repository trait 定義
//!
//! 永続ストア（イベント・レース・リザルト）へのインターフェース。
//! ライブ同期層はスナップショットと差分の材料をここから読むだけで、
//! 具体的な保存方式は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;
use slalom_live_shared::protocol::{EventStatus, ResultRecord, RunDetail};

use super::{EventId, RepositoryError, StoredEvent};

/// Competition Repository trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompetitionRepository: Send + Sync {
    /// イベント構造を取得（存在しない場合は `None`）
    async fn get_event(&self, event_id: &EventId) -> Result<Option<StoredEvent>, RepositoryError>;

    /// イベント構造を保存（既存の場合は置き換え）
    async fn save_event(
        &self,
        event_id: &EventId,
        event: StoredEvent,
    ) -> Result<(), RepositoryError>;

    /// イベントのステータスを更新（イベントが存在した場合 `true`）
    async fn set_status(
        &self,
        event_id: &EventId,
        status: EventStatus,
    ) -> Result<bool, RepositoryError>;

    /// レースのリザルト一覧を取得
    async fn get_results(
        &self,
        event_id: &EventId,
        race_id: &str,
    ) -> Result<Vec<ResultRecord>, RepositoryError>;

    /// レースのリザルト一覧を置き換え
    async fn replace_results(
        &self,
        event_id: &EventId,
        race_id: &str,
        results: Vec<ResultRecord>,
    ) -> Result<(), RepositoryError>;

    /// 1 走の詳細を取得
    async fn get_run_detail(
        &self,
        event_id: &EventId,
        race_id: &str,
        bib: u32,
    ) -> Result<Option<RunDetail>, RepositoryError>;

    /// 1 走の詳細を保存
    async fn save_run_detail(
        &self,
        event_id: &EventId,
        detail: RunDetail,
    ) -> Result<(), RepositoryError>;
}
