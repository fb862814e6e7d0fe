//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, put},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::SyncConfig,
    domain::CompetitionRepository,
    infrastructure::{ConnectionRegistry, EphemeralTrackStore},
    usecase::{
        ChangeEventStatusUseCase, ConnectViewerUseCase, GetLiveDataUseCase,
        IngestOnCourseUseCase, IngestResultsUseCase, PublishStateUseCase,
        ReplaceStructureUseCase,
    },
};

use super::{
    handler::{
        change_status, debug_rooms, get_event, get_oncourse, get_race_results, get_run_detail,
        health_check, ingest_oncourse, put_race_results, replace_structure, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Live synchronization server
///
/// Owns the connection registry and wires the usecases into the axum router.
///
/// # Example
///
/// ```ignore
/// let repository = Arc::new(InMemoryCompetitionRepository::new());
/// let server = Server::new(repository, SyncConfig::default());
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    registry: Arc<ConnectionRegistry>,
    track_store: Arc<EphemeralTrackStore>,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `repository` - Persistent store of events, results and run details
    /// * `config` - Room capacity, heartbeat interval and close grace period
    pub fn new(repository: Arc<dyn CompetitionRepository>, config: SyncConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config));
        let track_store = Arc::new(EphemeralTrackStore::new());

        let publisher = Arc::new(PublishStateUseCase::new(
            repository.clone(),
            registry.clone(),
            track_store.clone(),
        ));
        let state = Arc::new(AppState {
            connect_viewer_usecase: Arc::new(ConnectViewerUseCase::new(
                repository.clone(),
                registry.clone(),
                publisher.clone(),
            )),
            get_live_data_usecase: Arc::new(GetLiveDataUseCase::new(
                repository.clone(),
                track_store.clone(),
            )),
            ingest_oncourse_usecase: Arc::new(IngestOnCourseUseCase::new(
                repository.clone(),
                track_store.clone(),
                publisher.clone(),
            )),
            ingest_results_usecase: Arc::new(IngestResultsUseCase::new(
                repository.clone(),
                publisher.clone(),
            )),
            change_status_usecase: Arc::new(ChangeEventStatusUseCase::new(
                repository.clone(),
                registry.clone(),
                track_store.clone(),
                publisher.clone(),
            )),
            replace_structure_usecase: Arc::new(ReplaceStructureUseCase::new(
                repository, publisher,
            )),
            registry: registry.clone(),
        });

        Self {
            state,
            registry,
            track_store,
        }
    }

    /// Build the router with all endpoints
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/api/v1/events/{event_id}/ws", get(websocket_handler))
            // REST 参照
            .route("/api/v1/events/{event_id}", get(get_event))
            .route(
                "/api/v1/events/{event_id}/races/{race_id}/results",
                get(get_race_results).put(put_race_results),
            )
            .route(
                "/api/v1/events/{event_id}/races/{race_id}/results/{bib}",
                get(get_run_detail),
            )
            .route(
                "/api/v1/events/{event_id}/oncourse",
                get(get_oncourse).post(ingest_oncourse),
            )
            // 取り込み・管理操作
            .route("/api/v1/events/{event_id}/status", put(change_status))
            .route("/api/v1/events/{event_id}/structure", put(replace_structure))
            // その他
            .route("/api/health", get(health_check))
            .route("/debug/rooms", get(debug_rooms))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Live server listening on {}", listener.local_addr()?);
        tracing::info!("Viewers connect to: ws://{}/api/v1/events/{{eventId}}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;
        Ok(())
    }

    /// Serve on an already bound listener until `signal` resolves.
    ///
    /// Starts the heartbeat. On shutdown every viewer is closed with 1001 and
    /// the on-course data is dropped before axum waits for the connections to drain.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.registry.start_heartbeat().await;

        let app = self.router();
        let registry = self.registry.clone();
        let track_store = self.track_store.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                signal.await;
                registry.shutdown().await;
                track_store.clear_all().await;
            })
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
