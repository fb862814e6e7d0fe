//! UseCase 層
//!
//! ライブ同期のユースケースを定義します。UI 層（HTTP / WebSocket ハンドラ）と
//! 取り込み側のコラボレータはここを経由して Repository・TrackStore・Registry を操作します。

mod change_status;
mod connect_viewer;
mod error;
mod ingest_oncourse;
mod ingest_results;
mod publish_state;
mod query_live_data;
mod replace_structure;

pub use change_status::ChangeEventStatusUseCase;
pub use connect_viewer::ConnectViewerUseCase;
pub use error::{ConnectError, LiveDataError};
pub use ingest_oncourse::{IngestOnCourseUseCase, IngestSummary};
pub use ingest_results::IngestResultsUseCase;
pub use publish_state::PublishStateUseCase;
pub use query_live_data::GetLiveDataUseCase;
pub use replace_structure::ReplaceStructureUseCase;
