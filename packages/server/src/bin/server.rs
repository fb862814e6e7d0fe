//! Live synchronization server for canoe-slalom competitions.
//!
//! Viewers connect to `/api/v1/events/{eventId}/ws` and receive a full
//! snapshot, then diffs as results and on-course data are ingested.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin slalom-live-server
//! cargo run --bin slalom-live-server -- --host 0.0.0.0 --port 3000 --seed-demo
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use slalom_live_server::{
    config::{DEFAULT_CLOSE_GRACE, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_ROOM_CAPACITY, SyncConfig},
    domain::{CompetitionRepository, EventId, StoredEvent},
    infrastructure::InMemoryCompetitionRepository,
    ui::Server,
};
use slalom_live_shared::{
    logger::setup_logger,
    protocol::{CategoryInfo, ClassInfo, EventDetail, EventStatus, RaceInfo},
};

#[derive(Parser, Debug)]
#[command(name = "slalom-live-server")]
#[command(about = "Live result server for canoe-slalom competitions", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Maximum number of viewers per event
    #[arg(long, default_value_t = DEFAULT_ROOM_CAPACITY)]
    room_capacity: usize,

    /// Seconds between heartbeat sweeps
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_INTERVAL.as_secs())]
    heartbeat_secs: u64,

    /// Seconds between an event becoming official and its viewers being closed
    #[arg(long, default_value_t = DEFAULT_CLOSE_GRACE.as_secs())]
    close_grace_secs: u64,

    /// Seed an in-memory demo event with id "demo"
    #[arg(long)]
    seed_demo: bool,
}

impl Args {
    fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            room_capacity: self.room_capacity,
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs.max(1)),
            close_grace: Duration::from_secs(self.close_grace_secs),
        }
    }
}

fn demo_event() -> StoredEvent {
    let category = |id: &str, name: &str| CategoryInfo {
        category_id: id.to_string(),
        name: name.to_string(),
        ..CategoryInfo::default()
    };
    let race = |race_id: &str, class_id: &str, dis_id: &str, order: u32| RaceInfo {
        race_id: race_id.to_string(),
        class_id: Some(class_id.to_string()),
        dis_id: Some(dis_id.to_string()),
        race_order: Some(order),
        race_status: 1,
        ..RaceInfo::default()
    };

    StoredEvent::new(
        EventDetail {
            event_id: "demo".to_string(),
            main_title: "Demo Slalom Cup".to_string(),
            sub_title: Some("Live results demo".to_string()),
            location: Some("Whitewater Park".to_string()),
            status: EventStatus::Running,
        },
        vec![
            ClassInfo {
                class_id: "K1M".to_string(),
                name: "K1 Men".to_string(),
                categories: vec![category("SEN", "Senior"), category("U23", "Under 23")],
            },
            ClassInfo {
                class_id: "C1W".to_string(),
                name: "C1 Women".to_string(),
                categories: vec![category("SEN", "Senior"), category("JUN", "Junior")],
            },
        ],
        vec![
            race("K1M-BR1", "K1M", "BR1", 1),
            race("C1W-BR1", "C1W", "BR1", 2),
            race("K1M-final", "K1M", "FA", 3),
        ],
    )
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // 1. Create Repository (in-memory stand-in for the persistent store)
    let repository = Arc::new(InMemoryCompetitionRepository::new());
    if args.seed_demo {
        let event_id = EventId::new("demo".to_string()).expect("valid demo event id");
        if let Err(e) = repository.save_event(&event_id, demo_event()).await {
            tracing::error!("Failed to seed demo event: {}", e);
            std::process::exit(1);
        }
        tracing::info!("Seeded demo event '{}'", event_id);
    }

    // 2. Create and run the server (registry, track store and usecases are wired inside)
    let server = Server::new(repository, args.sync_config());
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
