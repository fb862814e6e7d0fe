//! One mounted event view.
//!
//! Ties together the REST bootstrap, the reconnecting connection, the
//! reducer and the polling fallback. The owner drives it by awaiting
//! [`LiveEventView::next_update`] and renders [`LiveEventView::state`].

use std::sync::Arc;

use slalom_live_shared::protocol::{DiffPayload, RunDetail, ServerMessage};
use tokio::sync::{mpsc, watch};

use crate::{
    api::LiveApi,
    config::ClientConfig,
    connection::{ClientOutput, ConnectionClient, ConnectionState},
    error::ClientError,
    polling::PollingFallback,
    reconciler::{Action, ClientLiveState, reduce},
};

/// What changed after one [`LiveEventView::next_update`]
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// Live state changed (full, diff, refresh or polled data)
    State,
    Connection(ConnectionState),
    /// Reported for display; the view keeps rendering last-known data
    Error(ClientError),
}

pub struct LiveEventView {
    event_id: String,
    api: Arc<dyn LiveApi>,
    state: ClientLiveState,
    selected_race: Option<String>,
    connection: ConnectionClient,
    outputs: mpsc::UnboundedReceiver<ClientOutput>,
    connection_state: watch::Receiver<ConnectionState>,
    /// Last transport state handled by `next_update`
    observed: ConnectionState,
    actions: mpsc::UnboundedReceiver<Action>,
    polling: PollingFallback,
}

impl LiveEventView {
    /// Bootstrap the structure over REST, then open the live connection.
    pub async fn mount(config: &ClientConfig, event_id: &str, api: Arc<dyn LiveApi>) -> Self {
        let mut state = ClientLiveState::default();
        match api.fetch_event(event_id).await {
            Ok(full) => state = reduce(state, Action::SetInitial(full)),
            Err(e) => tracing::warn!("Initial fetch of '{}' failed: {}", event_id, e),
        }

        let (actions_tx, actions) = mpsc::unbounded_channel();
        let polling =
            PollingFallback::new(api.clone(), event_id, config.poll_interval, actions_tx);

        let (connection, outputs) =
            ConnectionClient::spawn(config.ws_url(event_id), config.backoff.clone());
        let connection_state = connection.subscribe();
        connection.connect();

        Self {
            event_id: event_id.to_string(),
            api,
            state,
            selected_race: None,
            connection,
            outputs,
            connection_state,
            observed: ConnectionState::Disconnected,
            actions,
            polling,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn state(&self) -> &ClientLiveState {
        &self.state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.observed
    }

    pub fn selected_race(&self) -> Option<&str> {
        self.selected_race.as_deref()
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_active()
    }

    /// Select the race whose results are shown; loads them over REST.
    pub async fn select_race(&mut self, race_id: Option<String>) {
        self.selected_race = race_id;
        self.polling
            .update(self.observed, self.selected_race.as_deref());

        self.reload_selected_race().await;
    }

    /// Forward a visibility recovery to the connection
    pub fn visibility_regained(&self) {
        self.connection.visibility_regained();
    }

    /// Wait for the next change. `None` once the connection has stopped.
    pub async fn next_update(&mut self) -> Option<ViewUpdate> {
        tokio::select! {
            output = self.outputs.recv() => match output? {
                ClientOutput::Message(message) => {
                    tracing::debug!("Applying '{}' message", message.kind());
                    let refresh = matches!(message, ServerMessage::Refresh);
                    let full = matches!(message, ServerMessage::Full(_));
                    self.apply(Action::from(message));
                    if refresh {
                        self.refetch().await;
                    } else if full {
                        // full drops cached results
                        self.reload_selected_race().await;
                    }
                    Some(ViewUpdate::State)
                }
                ClientOutput::Error(e) => Some(ViewUpdate::Error(e)),
            },
            Some(action) = self.actions.recv() => {
                self.apply(action);
                Some(ViewUpdate::State)
            }
            changed = self.connection_state.changed() => {
                changed.ok()?;
                let state = *self.connection_state.borrow_and_update();
                self.observed = state;
                self.polling.update(state, self.selected_race.as_deref());
                Some(ViewUpdate::Connection(state))
            }
        }
    }

    /// Run detail of one bib, from the cache or loaded over REST
    pub async fn load_detail(
        &mut self,
        race_id: &str,
        bib: u32,
    ) -> Result<Option<RunDetail>, ClientError> {
        if let Some(detail) = self.state.detail(race_id, bib) {
            return Ok(Some(detail.clone()));
        }

        let Some(detail) = self
            .api
            .fetch_run_detail(&self.event_id, race_id, bib)
            .await?
        else {
            return Ok(None);
        };
        self.apply(Action::DetailLoaded {
            key: (race_id.to_string(), bib),
            detail: detail.clone(),
        });
        Ok(Some(detail))
    }

    /// Close the connection, stop polling and drop the cached state.
    pub async fn teardown(mut self) {
        self.polling.stop();
        self.apply(Action::Reset);
        self.connection.disconnect().await;
        tracing::info!("View of '{}' torn down", self.event_id);
    }

    fn apply(&mut self, action: Action) {
        self.state = reduce(std::mem::take(&mut self.state), action);
    }

    async fn load_race_results(&mut self, race_id: &str) {
        match self.api.fetch_race_results(&self.event_id, race_id).await {
            Ok(results) => self.apply(Action::Diff(DiffPayload::race_results(race_id, results))),
            Err(e) => tracing::warn!("Fetching results of '{}' failed: {}", race_id, e),
        }
    }

    /// Re-fetch what `refresh` dropped
    async fn refetch(&mut self) {
        match self.api.fetch_event(&self.event_id).await {
            Ok(full) => self.apply(Action::SetInitial(full)),
            Err(e) => tracing::warn!("Refresh of '{}' failed: {}", self.event_id, e),
        }
        match self.api.fetch_oncourse(&self.event_id).await {
            Ok(oncourse) => self.apply(Action::Diff(DiffPayload::oncourse(oncourse))),
            Err(e) => tracing::warn!("Refresh of on-course data failed: {}", e),
        }
        self.reload_selected_race().await;
    }

    async fn reload_selected_race(&mut self) {
        if let Some(race_id) = self.selected_race.clone() {
            self.load_race_results(&race_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockLiveApi;
    use slalom_live_shared::protocol::{
        EventDetail, EventStatus, FullStatePayload, RaceInfo, ResultRecord,
    };
    use std::time::Duration;

    fn mock_api() -> MockLiveApi {
        let mut api = MockLiveApi::new();
        api.expect_fetch_event().returning(|event_id| {
            Ok(FullStatePayload {
                event: EventDetail {
                    event_id: event_id.to_string(),
                    status: EventStatus::Running,
                    ..EventDetail::default()
                },
                classes: vec![],
                races: vec![RaceInfo {
                    race_id: "K1M-final".to_string(),
                    ..RaceInfo::default()
                }],
                categories: vec![],
            })
        });
        api.expect_fetch_race_results().returning(|_, _| {
            Ok(vec![ResultRecord {
                bib: Some(12),
                rnk: Some(1),
                total: Some(8520),
                ..ResultRecord::default()
            }])
        });
        api.expect_fetch_oncourse().returning(|_| Ok(vec![]));
        api
    }

    async fn unreachable_config() -> ClientConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        ClientConfig {
            backoff: vec![Duration::from_millis(50)],
            poll_interval: Duration::from_millis(50),
            ..ClientConfig::new(format!("http://{}", addr))
        }
    }

    #[tokio::test]
    async fn test_mount_bootstraps_and_polls_while_disconnected() {
        // テスト項目: REST で初期化され、接続できない間はポーリングで更新される
        // given (前提条件):
        let config = unreachable_config().await;
        let mut view = LiveEventView::mount(&config, "E1", Arc::new(mock_api())).await;

        // when (操作):
        view.select_race(Some("K1M-final".to_string())).await;
        let mut polled = false;
        for _ in 0..50 {
            match view.next_update().await {
                Some(ViewUpdate::State) if view.is_polling() => {
                    polled = true;
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        // then (期待する結果):
        assert!(polled);
        assert_eq!(view.state().races.len(), 1);
        assert_eq!(view.state().results("K1M-final")[0].bib, Some(12));
        assert_ne!(view.connection_state(), ConnectionState::Connected);

        view.teardown().await;
    }

    #[tokio::test]
    async fn test_load_detail_uses_cache() {
        // テスト項目: 走行詳細は 1 度だけ REST で取得され、以降はキャッシュから返る
        // given (前提条件):
        let config = unreachable_config().await;
        let mut api = mock_api();
        api.expect_fetch_run_detail()
            .times(1)
            .returning(|_, race_id, bib| {
                Ok(Some(RunDetail {
                    race_id: race_id.to_string(),
                    bib,
                    gates: vec![Some(0), Some(50)],
                    ..RunDetail::default()
                }))
            });
        let mut view = LiveEventView::mount(&config, "E1", Arc::new(api)).await;

        // when (操作):
        let first = view.load_detail("K1M-final", 12).await.unwrap();
        let second = view.load_detail("K1M-final", 12).await.unwrap();

        // then (期待する結果):
        assert_eq!(first, second);
        assert_eq!(first.unwrap().gates, vec![Some(0), Some(50)]);
        assert!(view.state().detail("K1M-final", 12).is_some());

        view.teardown().await;
    }
}
