//! ドメイン層
//!
//! イベント・ルーム・接続に関する値オブジェクトと、永続ストアへの
//! インターフェース（`CompetitionRepository`）を定義します。
//! Infrastructure 層はここで定義された trait を実装します（依存性の逆転）。

pub mod admission;
pub mod entity;
pub mod error;
pub mod repository;
pub mod value_object;

pub use admission::check_admission;
pub use entity::StoredEvent;
pub use error::{RepositoryError, UpgradeRejected, ValueObjectError};
pub use repository::CompetitionRepository;
pub use value_object::{ConnectionId, EventId};
