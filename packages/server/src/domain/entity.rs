//! エンティティ

use std::collections::HashSet;

use slalom_live_shared::protocol::{
    CategoryInfo, ClassInfo, EventDetail, EventStatus, FullStatePayload, RaceInfo,
};

/// An event's structure as held by the persistent store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub detail: EventDetail,
    pub classes: Vec<ClassInfo>,
    pub races: Vec<RaceInfo>,
}

impl StoredEvent {
    pub fn new(detail: EventDetail, classes: Vec<ClassInfo>, races: Vec<RaceInfo>) -> Self {
        Self {
            detail,
            classes,
            races,
        }
    }

    pub fn status(&self) -> EventStatus {
        self.detail.status
    }

    pub fn has_race(&self, race_id: &str) -> bool {
        self.races.iter().any(|race| race.race_id == race_id)
    }

    /// Categories of all classes, de-duplicated by id in order of first appearance.
    pub fn aggregate_categories(&self) -> Vec<CategoryInfo> {
        let mut seen = HashSet::new();
        self.classes
            .iter()
            .flat_map(|class| class.categories.iter())
            .filter(|category| seen.insert(category.category_id.clone()))
            .cloned()
            .collect()
    }

    pub fn to_full_state(&self) -> FullStatePayload {
        FullStatePayload {
            event: self.detail.clone(),
            classes: self.classes.clone(),
            races: self.races.clone(),
            categories: self.aggregate_categories(),
        }
    }
}
