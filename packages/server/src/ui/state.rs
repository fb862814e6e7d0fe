//! Shared application state.

use std::sync::Arc;

use crate::{
    infrastructure::ConnectionRegistry,
    usecase::{
        ChangeEventStatusUseCase, ConnectViewerUseCase, GetLiveDataUseCase,
        IngestOnCourseUseCase, IngestResultsUseCase, ReplaceStructureUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// ConnectViewerUseCase（視聴者接続のユースケース）
    pub connect_viewer_usecase: Arc<ConnectViewerUseCase>,
    /// GetLiveDataUseCase（REST 参照のユースケース）
    pub get_live_data_usecase: Arc<GetLiveDataUseCase>,
    /// IngestOnCourseUseCase（コース上データ取り込みのユースケース）
    pub ingest_oncourse_usecase: Arc<IngestOnCourseUseCase>,
    /// IngestResultsUseCase（リザルト取り込みのユースケース）
    pub ingest_results_usecase: Arc<IngestResultsUseCase>,
    /// ChangeEventStatusUseCase（ステータス変更のユースケース）
    pub change_status_usecase: Arc<ChangeEventStatusUseCase>,
    /// ReplaceStructureUseCase（構造置き換えのユースケース）
    pub replace_structure_usecase: Arc<ReplaceStructureUseCase>,
    /// ConnectionRegistry（デバッグ表示用）
    pub registry: Arc<ConnectionRegistry>,
}
