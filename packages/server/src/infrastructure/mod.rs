//! Infrastructure 層
//!
//! - `registry`: WebSocket 接続をイベントごとのルームで管理し、ブロードキャストする
//! - `track_store`: コース上の選手をメモリ上で保持するエフェメラルストア
//! - `repository`: 永続ストアのインメモリ実装

pub mod registry;
pub mod repository;
pub mod track_store;

pub use registry::{ConnectionHandle, ConnectionRegistry, Outbound, RoomSummary};
pub use repository::InMemoryCompetitionRepository;
pub use track_store::EphemeralTrackStore;
