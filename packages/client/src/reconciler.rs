//! StateReconciler: pure reducer over the client's cached live state.
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - full / diff / refresh / REST 取得結果の適用
//!
//! ### なぜこのテストが必要か
//! - diff のリザルトは bib 単位のマージで、順位の昇順（順位なしは最後）に並ぶ必要がある
//! - finished / official で on-course が消え、refresh で派生キャッシュが消える
//! - 走行詳細のキャッシュは diff では無効化されない
//!
//! ### どのような状況を想定しているか
//! - 正常系：K1M-final のリザルト更新
//! - エッジケース：bib なしのレコード、raceId なしの results、順位なしの選手

use std::{cmp::Ordering, collections::HashMap};

use slalom_live_shared::protocol::{
    CategoryInfo, ClassInfo, DiffPayload, EventDetail, FullStatePayload, OnCourseRecord,
    RaceInfo, ResultRecord, RunDetail, ServerMessage,
};

/// (raceId, bib)
pub type RunKey = (String, u32);

/// Cached live state of one mounted event view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientLiveState {
    pub event: Option<EventDetail>,
    pub classes: Vec<ClassInfo>,
    pub races: Vec<RaceInfo>,
    pub categories: Vec<CategoryInfo>,
    /// Sorted by rank ascending, unranked last; at most one record per bib
    pub results_by_race: HashMap<String, Vec<ResultRecord>>,
    pub oncourse: Vec<OnCourseRecord>,
    /// Lazily loaded run details; only `full` and `refresh` invalidate it
    pub detailed_cache: HashMap<RunKey, RunDetail>,
}

impl ClientLiveState {
    pub fn results(&self, race_id: &str) -> &[ResultRecord] {
        self.results_by_race
            .get(race_id)
            .map_or(&[], Vec::as_slice)
    }

    pub fn detail(&self, race_id: &str, bib: u32) -> Option<&RunDetail> {
        self.detailed_cache.get(&(race_id.to_string(), bib))
    }

    fn set_structure(&mut self, full: FullStatePayload) {
        self.event = Some(full.event);
        self.classes = full.classes;
        self.races = full.races;
        self.categories = full.categories;
    }
}

/// Input of the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// REST bootstrap of the structure; cached live data is kept
    SetInitial(FullStatePayload),
    Full(FullStatePayload),
    /// Live diff, or REST results / on-course data wrapped as one
    Diff(DiffPayload),
    Refresh,
    DetailLoaded { key: RunKey, detail: RunDetail },
    /// View teardown or event change
    Reset,
}

impl From<ServerMessage> for Action {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::Full(full) => Self::Full(full),
            ServerMessage::Diff(diff) => Self::Diff(diff),
            ServerMessage::Refresh => Self::Refresh,
        }
    }
}

pub fn reduce(mut state: ClientLiveState, action: Action) -> ClientLiveState {
    match action {
        Action::SetInitial(full) => {
            state.set_structure(full);
            state
        }
        Action::Full(full) => {
            state.set_structure(full);
            state.results_by_race.clear();
            state.detailed_cache.clear();
            state
        }
        Action::Diff(diff) => apply_diff(state, diff),
        Action::Refresh => {
            state.results_by_race.clear();
            state.oncourse.clear();
            state.detailed_cache.clear();
            state
        }
        Action::DetailLoaded { key, detail } => {
            state.detailed_cache.insert(key, detail);
            state
        }
        Action::Reset => ClientLiveState::default(),
    }
}

fn apply_diff(mut state: ClientLiveState, diff: DiffPayload) -> ClientLiveState {
    match (diff.race_id, diff.results) {
        (Some(race_id), Some(incoming)) => {
            let cached = state.results_by_race.remove(&race_id).unwrap_or_default();
            state
                .results_by_race
                .insert(race_id, merge_results(cached, incoming));
        }
        (None, Some(_)) => tracing::debug!("Ignoring results diff without raceId"),
        _ => {}
    }

    if let Some(oncourse) = diff.oncourse {
        state.oncourse = oncourse;
    }

    if let Some(status) = diff.status {
        if let Some(event) = state.event.as_mut() {
            event.status = status;
        }
        if status.is_finished() {
            state.oncourse.clear();
        }
    }
    state
}

/// Bib-keyed union of cached and incoming rows (incoming wins), rows without
/// a bib dropped, sorted by rank with unranked rows last.
fn merge_results(cached: Vec<ResultRecord>, incoming: Vec<ResultRecord>) -> Vec<ResultRecord> {
    let mut by_bib: HashMap<u32, ResultRecord> = HashMap::new();
    for record in cached.into_iter().chain(incoming) {
        if let Some(bib) = record.bib {
            by_bib.insert(bib, record);
        }
    }

    let mut merged: Vec<ResultRecord> = by_bib.into_values().collect();
    merged.sort_by(|a, b| compare_rank(a.rnk, b.rnk).then_with(|| a.bib.cmp(&b.bib)));
    merged
}

fn compare_rank(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
