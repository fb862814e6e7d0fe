//! EphemeralTrackStore: コース上の選手をイベントごとにメモリ上で保持する
//!
//! 永続化はしません。プロセスが再起動すると内容は失われますが、
//! 位置情報は古くなった時点で意味を持たないため許容しています。

use std::collections::HashMap;

use slalom_live_shared::protocol::OnCourseRecord;
use tokio::sync::Mutex;

use crate::domain::EventId;

/// (raceId, bib)
type TrackKey = (String, u32);

/// In-memory on-course records, per event
#[derive(Debug, Default)]
pub struct EphemeralTrackStore {
    events: Mutex<HashMap<EventId, HashMap<TrackKey, OnCourseRecord>>>,
}

impl EphemeralTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record keyed by (raceId, bib).
    ///
    /// `completed` is recomputed from the presence of a finish timestamp.
    pub async fn upsert(&self, event_id: &EventId, record: OnCourseRecord) {
        let mut events = self.events.lock().await;
        Self::upsert_locked(events.entry(event_id.clone()).or_default(), record);
    }

    /// Upsert a whole ingestion batch under one lock
    pub async fn upsert_batch(&self, event_id: &EventId, records: Vec<OnCourseRecord>) {
        if records.is_empty() {
            return;
        }
        let mut events = self.events.lock().await;
        let tracked = events.entry(event_id.clone()).or_default();
        for record in records {
            Self::upsert_locked(tracked, record);
        }
    }

    fn upsert_locked(tracked: &mut HashMap<TrackKey, OnCourseRecord>, mut record: OnCourseRecord) {
        record.completed = record.dt_finish.is_some();
        tracked.insert((record.race_id.clone(), record.bib), record);
    }

    /// Records still on the course, closest to the finish first
    pub async fn get_active(&self, event_id: &EventId) -> Vec<OnCourseRecord> {
        let events = self.events.lock().await;
        let Some(tracked) = events.get(event_id) else {
            return Vec::new();
        };

        let mut active: Vec<OnCourseRecord> = tracked
            .values()
            .filter(|record| !record.completed)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.race_id.cmp(&b.race_id))
                .then_with(|| a.bib.cmp(&b.bib))
        });
        active
    }

    /// Remove completed records of the event. Returns how many were removed.
    pub async fn cleanup_finished(&self, event_id: &EventId) -> usize {
        let mut events = self.events.lock().await;
        let Some(tracked) = events.get_mut(event_id) else {
            return 0;
        };

        let before = tracked.len();
        tracked.retain(|_, record| !record.completed);
        let removed = before - tracked.len();
        if tracked.is_empty() {
            events.remove(event_id);
        }
        if removed > 0 {
            tracing::debug!(
                "Removed {} finished on-course records for event '{}'",
                removed,
                event_id
            );
        }
        removed
    }

    pub async fn clear(&self, event_id: &EventId) {
        self.events.lock().await.remove(event_id);
    }

    pub async fn clear_all(&self) {
        self.events.lock().await.clear();
    }

    /// Number of tracked records (active and completed) for the event
    pub async fn len(&self, event_id: &EventId) -> usize {
        self.events.lock().await.get(event_id).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> EventId {
        EventId::new(id.to_string()).unwrap()
    }

    fn record(race_id: &str, bib: u32, position: u32, finished: bool) -> OnCourseRecord {
        OnCourseRecord {
            race_id: race_id.to_string(),
            bib,
            name: format!("Athlete {}", bib),
            position,
            dt_start: Some("10:00:00.00".to_string()),
            dt_finish: finished.then(|| "10:01:30.00".to_string()),
            ..OnCourseRecord::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_record_with_same_key() {
        // テスト項目: (raceId, bib) が同じレコードは上書きされる
        // given (前提条件):
        let store = EphemeralTrackStore::new();
        store.upsert(&event("E1"), record("K1M", 7, 2, false)).await;

        // when (操作):
        store.upsert(&event("E1"), record("K1M", 7, 1, false)).await;

        // then (期待する結果):
        let active = store.get_active(&event("E1")).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].position, 1);
    }

    #[tokio::test]
    async fn test_same_bib_in_different_races_are_distinct() {
        // テスト項目: 別レースの同じ bib は別レコードとして扱われる
        // given (前提条件):
        let store = EphemeralTrackStore::new();

        // when (操作):
        store
            .upsert_batch(
                &event("E1"),
                vec![record("K1M", 7, 1, false), record("C1M", 7, 2, false)],
            )
            .await;

        // then (期待する結果):
        assert_eq!(store.len(&event("E1")).await, 2);
    }

    #[tokio::test]
    async fn test_completed_is_derived_from_finish_time() {
        // テスト項目: completed は送信値ではなくフィニッシュ時刻の有無から決まる
        // given (前提条件):
        let store = EphemeralTrackStore::new();
        let mut claims_completed = record("K1M", 1, 1, false);
        claims_completed.completed = true;

        // when (操作):
        store.upsert(&event("E1"), claims_completed).await;
        store.upsert(&event("E1"), record("K1M", 2, 2, true)).await;

        // then (期待する結果):
        let active = store.get_active(&event("E1")).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].bib, 1);
        assert!(!active[0].completed);
    }

    #[tokio::test]
    async fn test_get_active_sorts_by_position() {
        // テスト項目: アクティブな選手がコース位置の昇順で返される
        // given (前提条件):
        let store = EphemeralTrackStore::new();
        store
            .upsert_batch(
                &event("E1"),
                vec![
                    record("K1M", 3, 3, false),
                    record("K1M", 1, 1, false),
                    record("K1M", 2, 2, false),
                ],
            )
            .await;

        // when (操作):
        let active = store.get_active(&event("E1")).await;

        // then (期待する結果):
        let positions: Vec<u32> = active.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cleanup_finished_removes_completed_records() {
        // テスト項目: cleanup で完走済みのレコードがフラグではなく削除される
        // given (前提条件):
        let store = EphemeralTrackStore::new();
        store
            .upsert_batch(
                &event("E1"),
                vec![record("K1M", 1, 1, true), record("K1M", 2, 2, false)],
            )
            .await;

        // when (操作):
        let removed = store.cleanup_finished(&event("E1")).await;

        // then (期待する結果):
        assert_eq!(removed, 1);
        assert_eq!(store.len(&event("E1")).await, 1);
    }

    #[tokio::test]
    async fn test_events_are_isolated_and_clearable() {
        // テスト項目: イベントごとに独立しており、clear / clearAll でリセットできる
        // given (前提条件):
        let store = EphemeralTrackStore::new();
        store.upsert(&event("E1"), record("K1M", 1, 1, false)).await;
        store.upsert(&event("E2"), record("K1M", 1, 1, false)).await;

        // when (操作):
        store.clear(&event("E1")).await;

        // then (期待する結果):
        assert!(store.get_active(&event("E1")).await.is_empty());
        assert_eq!(store.get_active(&event("E2")).await.len(), 1);

        // when (操作):
        store.clear_all().await;

        // then (期待する結果):
        assert!(store.get_active(&event("E2")).await.is_empty());
    }
}
