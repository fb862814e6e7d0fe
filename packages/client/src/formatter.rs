//! Live view formatting for terminal display.

use slalom_live_shared::{
    protocol::{OnCourseRecord, ResultRecord, RunDetail},
    time::{format_centiseconds, timestamp_to_rfc3339},
};

use crate::{connection::ConnectionState, reconciler::ClientLiveState};

const RULE: &str = "============================================================";

/// Formatter for the live view
pub struct LiveFormatter;

impl LiveFormatter {
    /// Format the connection indicator
    ///
    /// # Arguments
    ///
    /// * `state` - Current transport state
    /// * `polling` - Whether the REST polling fallback is active
    pub fn format_connection(state: ConnectionState, polling: bool) -> String {
        match (state, polling) {
            (ConnectionState::Connected, _) => "[live] connected".to_string(),
            (ConnectionState::Reconnecting, _) => "[....] reconnecting".to_string(),
            (ConnectionState::Connecting, _) => "[....] connecting".to_string(),
            (ConnectionState::Disconnected, true) => "[poll] disconnected (polling)".to_string(),
            (ConnectionState::Disconnected, false) => "[----] disconnected".to_string(),
        }
    }

    /// Format the event header: title, location and status
    pub fn format_header(state: &ClientLiveState) -> String {
        let Some(event) = state.event.as_ref() else {
            return format!("\n{}\n(event not loaded)\n{}\n", RULE, RULE);
        };

        let mut output = format!("\n{}\n{}", RULE, event.main_title);
        if let Some(sub_title) = &event.sub_title {
            output.push_str(&format!(" - {}", sub_title));
        }
        output.push('\n');
        if let Some(location) = &event.location {
            output.push_str(&format!("{}\n", location));
        }
        output.push_str(&format!(
            "status: {} | races: {} | categories: {}\n{}\n",
            event.status,
            state.races.len(),
            state.categories.len(),
            RULE
        ));
        output
    }

    /// Format a race's result table
    ///
    /// Unranked rows show `-`, missing times show their status (DNS / DNF / DSQ).
    pub fn format_results(race_id: &str, results: &[ResultRecord]) -> String {
        let mut output = format!("Results {}\n", race_id);
        if results.is_empty() {
            output.push_str("(No results)\n");
            return output;
        }

        for record in results {
            let rank = record
                .rnk
                .map_or_else(|| "-".to_string(), |rnk| format!("{}.", rnk));
            let bib = record
                .bib
                .map_or_else(|| "?".to_string(), |bib| bib.to_string());
            let total = match (record.total, record.status.as_deref()) {
                (Some(total), _) => format_centiseconds(total),
                (None, Some(status)) => status.to_string(),
                (None, None) => "".to_string(),
            };
            let pen = record
                .pen
                .map_or_else(String::new, |pen| format!(" ({})", pen));
            output.push_str(&format!(
                "{:>4} {:>4} {:<28} {:>9}{}\n",
                rank, bib, record.name, total, pen
            ));
        }
        output
    }

    /// Format the competitors on the course, closest to the finish first
    pub fn format_oncourse(records: &[OnCourseRecord]) -> String {
        let mut output = String::from("On course\n");
        if records.is_empty() {
            output.push_str("(Nobody on course)\n");
            return output;
        }

        let mut sorted: Vec<&OnCourseRecord> = records.iter().collect();
        sorted.sort_by_key(|record| record.position);
        for record in sorted {
            let ttb = record.ttb_diff.as_deref().unwrap_or("");
            output.push_str(&format!(
                "{:>2}. {:>4} {:<28} {:>2}/{:<2} pen {:>3} {}\n",
                record.position,
                record.bib,
                record.name,
                record.gates.iter().filter(|gate| gate.is_some()).count(),
                record.gates.len(),
                record.pen,
                ttb
            ));
        }
        output
    }

    /// Format a run detail with per-gate penalties
    pub fn format_detail(detail: &RunDetail) -> String {
        let gates: Vec<String> = detail
            .gates
            .iter()
            .map(|gate| gate.map_or_else(|| ".".to_string(), |pen| pen.to_string()))
            .collect();
        let total = detail.total.map(format_centiseconds).unwrap_or_default();
        format!(
            "Bib {} in {}: total {} gates [{}]\n",
            detail.bib,
            detail.race_id,
            total,
            gates.join(" ")
        )
    }

    /// Format the time of the last update
    ///
    /// # Arguments
    ///
    /// * `updated_at` - Unix timestamp (milliseconds)
    pub fn format_updated_at(updated_at: i64) -> String {
        format!("updated at {}\n", timestamp_to_rfc3339(updated_at))
    }

    /// Format the whole view
    pub fn format_view(
        state: &ClientLiveState,
        selected_race: Option<&str>,
        connection: ConnectionState,
        polling: bool,
        updated_at: i64,
    ) -> String {
        let mut output = Self::format_header(state);
        output.push_str(&Self::format_connection(connection, polling));
        output.push('\n');
        if let Some(race_id) = selected_race {
            output.push_str(&Self::format_results(race_id, state.results(race_id)));
        }
        output.push_str(&Self::format_oncourse(&state.oncourse));
        output.push_str(&Self::format_updated_at(updated_at));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slalom_live_shared::protocol::{EventDetail, EventStatus};

    #[test]
    fn test_format_connection_indicator() {
        // テスト項目: 接続状態ごとのインジケーターが表示される
        // given (前提条件):
        let cases = [
            (ConnectionState::Connected, false, "connected"),
            (ConnectionState::Reconnecting, true, "reconnecting"),
            (ConnectionState::Connecting, false, "connecting"),
            (ConnectionState::Disconnected, true, "disconnected (polling)"),
        ];

        for (state, polling, expected) in cases {
            // when (操作):
            let result = LiveFormatter::format_connection(state, polling);

            // then (期待する結果):
            assert!(result.ends_with(expected), "{} / {}", result, expected);
        }
    }

    #[test]
    fn test_format_header_without_event() {
        // テスト項目: イベント未取得の場合、その旨が表示される
        // given (前提条件):
        let state = ClientLiveState::default();

        // when (操作):
        let result = LiveFormatter::format_header(&state);

        // then (期待する結果):
        assert!(result.contains("(event not loaded)"));
    }

    #[test]
    fn test_format_header_with_event() {
        // テスト項目: タイトル・会場・ステータスが表示される
        // given (前提条件):
        let state = ClientLiveState {
            event: Some(EventDetail {
                event_id: "E1".to_string(),
                main_title: "Slalom Cup".to_string(),
                sub_title: Some("Final day".to_string()),
                location: Some("Whitewater Park".to_string()),
                status: EventStatus::Checking,
            }),
            ..ClientLiveState::default()
        };

        // when (操作):
        let result = LiveFormatter::format_header(&state);

        // then (期待する結果):
        assert!(result.contains("Slalom Cup - Final day"));
        assert!(result.contains("Whitewater Park"));
        assert!(result.contains("status: checking"));
    }

    #[test]
    fn test_format_results_table() {
        // テスト項目: 順位・bib・タイムが表示され、順位なしは "-" とステータスになる
        // given (前提条件):
        let results = vec![
            ResultRecord {
                bib: Some(7),
                name: "Anna".to_string(),
                rnk: Some(1),
                total: Some(8400),
                pen: Some(2),
                ..ResultRecord::default()
            },
            ResultRecord {
                bib: Some(30),
                name: "Ben".to_string(),
                status: Some("DNF".to_string()),
                ..ResultRecord::default()
            },
        ];

        // when (操作):
        let result = LiveFormatter::format_results("K1M-final", &results);

        // then (期待する結果):
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines[0], "Results K1M-final");
        assert!(lines[1].contains("1."));
        assert!(lines[1].contains("84.00 (2)"));
        assert!(lines[2].trim_start().starts_with('-'));
        assert!(lines[2].contains("DNF"));
    }

    #[test]
    fn test_format_empty_tables() {
        // テスト項目: 空のリザルトと on-course の表示
        // given (前提条件):

        // when (操作):
        let results = LiveFormatter::format_results("K1M-final", &[]);
        let oncourse = LiveFormatter::format_oncourse(&[]);

        // then (期待する結果):
        assert!(results.contains("(No results)"));
        assert!(oncourse.contains("(Nobody on course)"));
    }

    #[test]
    fn test_format_oncourse_sorted_by_position() {
        // テスト項目: on-course はゴールに近い順に表示され、通過ゲート数が出る
        // given (前提条件):
        let records = vec![
            OnCourseRecord {
                bib: 5,
                name: "Second".to_string(),
                position: 2,
                gates: vec![Some(0), None, None],
                ..OnCourseRecord::default()
            },
            OnCourseRecord {
                bib: 3,
                name: "First".to_string(),
                position: 1,
                gates: vec![Some(0), Some(2), None],
                pen: 2,
                ttb_diff: Some("+1.23".to_string()),
                ..OnCourseRecord::default()
            },
        ];

        // when (操作):
        let result = LiveFormatter::format_oncourse(&records);

        // then (期待する結果):
        let lines: Vec<&str> = result.lines().collect();
        assert!(lines[1].contains("First"));
        assert!(lines[1].contains("2/3"));
        assert!(lines[1].contains("+1.23"));
        assert!(lines[2].contains("Second"));
    }

    #[test]
    fn test_format_detail_and_updated_at() {
        // テスト項目: 走行詳細と更新時刻が表示される
        // given (前提条件):
        let detail = RunDetail {
            race_id: "K1M-final".to_string(),
            bib: 12,
            total: Some(8520),
            gates: vec![Some(0), Some(50), None],
            ..RunDetail::default()
        };

        // when (操作):
        let result = LiveFormatter::format_detail(&detail);
        let updated = LiveFormatter::format_updated_at(1672531200000);

        // then (期待する結果):
        assert_eq!(result, "Bib 12 in K1M-final: total 85.20 gates [0 50 .]\n");
        assert!(updated.contains("2023-01-01"));
    }
}
