//! REST access to the live data endpoints.
//!
//! Used for the initial bootstrap of a view, re-fetching after `refresh`,
//! the polling fallback and lazily loaded run details.

use async_trait::async_trait;
use reqwest::StatusCode;
use slalom_live_shared::protocol::{FullStatePayload, OnCourseRecord, ResultRecord, RunDetail};

use crate::error::ClientError;

/// Live data reads of one server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveApi: Send + Sync {
    /// Structure of an event (`GET /api/v1/events/{eventId}`)
    async fn fetch_event(&self, event_id: &str) -> Result<FullStatePayload, ClientError>;

    /// Result table of a race
    async fn fetch_race_results(
        &self,
        event_id: &str,
        race_id: &str,
    ) -> Result<Vec<ResultRecord>, ClientError>;

    /// Competitors currently on the course
    async fn fetch_oncourse(&self, event_id: &str) -> Result<Vec<OnCourseRecord>, ClientError>;

    /// Run detail of one bib; `None` when the server has none recorded
    async fn fetch_run_detail(
        &self,
        event_id: &str,
        race_id: &str,
        bib: u32,
    ) -> Result<Option<RunDetail>, ClientError>;
}

/// [`LiveApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpLiveApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLiveApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/api/v1/events/{}", self.base_url, event_id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, ClientError> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl LiveApi for HttpLiveApi {
    async fn fetch_event(&self, event_id: &str) -> Result<FullStatePayload, ClientError> {
        self.get_json(self.event_url(event_id)).await
    }

    async fn fetch_race_results(
        &self,
        event_id: &str,
        race_id: &str,
    ) -> Result<Vec<ResultRecord>, ClientError> {
        self.get_json(format!(
            "{}/races/{}/results",
            self.event_url(event_id),
            race_id
        ))
        .await
    }

    async fn fetch_oncourse(&self, event_id: &str) -> Result<Vec<OnCourseRecord>, ClientError> {
        self.get_json(format!("{}/oncourse", self.event_url(event_id)))
            .await
    }

    async fn fetch_run_detail(
        &self,
        event_id: &str,
        race_id: &str,
        bib: u32,
    ) -> Result<Option<RunDetail>, ClientError> {
        let url = format!(
            "{}/races/{}/results/{}",
            self.event_url(event_id),
            race_id,
            bib
        );
        tracing::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }
}
