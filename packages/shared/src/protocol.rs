//! Wire protocol between the live server and its viewers.
//!
//! Every frame is a tagged envelope `{"type": ..., "data": ...}`:
//!
//! - `full`: complete structural snapshot of an event
//! - `diff`: targeted replacement of one race's results, the on-course list
//!   and/or the event status
//! - `refresh`: no data, the client drops derived caches and re-fetches via REST
//!
//! The channel is server → client only.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Draft,
    Startlist,
    Running,
    Checking,
    Finished,
    Official,
}

impl EventStatus {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Startlist => "startlist",
            Self::Running => "running",
            Self::Checking => "checking",
            Self::Finished => "finished",
            Self::Official => "official",
        }
    }

    /// `finished` and `official`: no further on-course activity is possible.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished | Self::Official)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "startlist" => Ok(Self::Startlist),
            "running" => Ok(Self::Running),
            "checking" => Ok(Self::Checking),
            "finished" => Ok(Self::Finished),
            "official" => Ok(Self::Official),
            other => Err(format!("unknown event status '{}'", other)),
        }
    }
}

// ========================================
// Structure (full state)
// ========================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDetail {
    pub event_id: String,
    pub main_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub status: EventStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryInfo {
    pub category_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassInfo {
    pub class_id: String,
    pub name: String,
    pub categories: Vec<CategoryInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RaceInfo {
    pub race_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    /// Discipline / run code, e.g. "BR1", "BR2", "SF", "FA"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dis_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race_order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Numeric status as reported by the timing system
    pub race_status: u8,
}

/// Complete structural snapshot of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullStatePayload {
    pub event: EventDetail,
    #[serde(default)]
    pub classes: Vec<ClassInfo>,
    #[serde(default)]
    pub races: Vec<RaceInfo>,
    /// Categories aggregated over all classes
    #[serde(default)]
    pub categories: Vec<CategoryInfo>,
}

// ========================================
// Live data
// ========================================

/// One row of a race's result table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultRecord {
    pub bib: Option<u32>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
    pub rnk: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat_rnk: Option<u32>,
    /// Raw time in hundredths of a second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Penalty seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pen: Option<i64>,
    /// Time plus penalties, hundredths of a second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    /// DNS / DNF / DSQ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A competitor currently on the course
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnCourseRecord {
    pub race_id: String,
    pub bib: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
    /// 1 is closest to the finish
    pub position: u32,
    /// Penalty per gate passed so far (0, 2 or 50), `None` for gates not yet reached
    pub gates: Vec<Option<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt_finish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    pub pen: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    /// Provisional rank
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    /// Difference to the time-to-beat, e.g. "+1.23"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttb_diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttb_name: Option<String>,
    pub completed: bool,
}

/// Per-run detail, fetched lazily by viewers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunDetail {
    pub race_id: String,
    pub bib: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt_finish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pen: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    pub gates: Vec<Option<u8>>,
}

/// Incremental change: every field is optional and independent.
///
/// `results` always comes with `race_id` and replaces that race's table as a
/// whole; `oncourse` replaces the on-course list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oncourse: Option<Vec<OnCourseRecord>>,
    /// Unknown status strings decode as `None`; the rest of the diff still applies.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_lenient_status"
    )]
    pub status: Option<EventStatus>,
}

fn deserialize_lenient_status<'de, D>(deserializer: D) -> Result<Option<EventStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|status| match status.parse() {
        Ok(status) => Some(status),
        Err(e) => {
            tracing::warn!("Ignoring diff status: {}", e);
            None
        }
    }))
}

impl DiffPayload {
    pub fn race_results(race_id: impl Into<String>, results: Vec<ResultRecord>) -> Self {
        Self {
            race_id: Some(race_id.into()),
            results: Some(results),
            ..Self::default()
        }
    }

    pub fn oncourse(records: Vec<OnCourseRecord>) -> Self {
        Self {
            oncourse: Some(records),
            ..Self::default()
        }
    }

    pub fn status(status: EventStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_none() && self.oncourse.is_none() && self.status.is_none()
    }
}

/// Server → client envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    Full(FullStatePayload),
    Diff(DiffPayload),
    Refresh,
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Full(_) => "full",
            Self::Diff(_) => "diff",
            Self::Refresh => "refresh",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
