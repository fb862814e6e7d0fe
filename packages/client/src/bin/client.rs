//! Live result viewer for the terminal.
//!
//! Bootstraps an event over REST, follows it over WebSocket and falls back to
//! REST polling while the connection is down. The view is re-printed on every
//! change.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin slalom-live-client -- --event-id demo --race-id K1M-final
//! cargo run --bin slalom-live-client -- -u http://127.0.0.1:3000 -e demo
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use slalom_live_client::{
    api::HttpLiveApi,
    config::{ClientConfig, DEFAULT_POLL_INTERVAL},
    formatter::LiveFormatter,
    view::{LiveEventView, ViewUpdate},
};
use slalom_live_shared::{logger::setup_logger, time::get_timestamp_millis};

#[derive(Parser, Debug)]
#[command(name = "slalom-live-client")]
#[command(about = "Live result viewer for canoe-slalom competitions", long_about = None)]
struct Args {
    /// Server base URL
    #[arg(short = 'u', long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Event to follow
    #[arg(short = 'e', long)]
    event_id: String,

    /// Race whose results are shown (defaults to the first race of the event)
    #[arg(short = 'r', long)]
    race_id: Option<String>,

    /// Seconds between REST polls while disconnected
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    poll_secs: u64,
}

fn render(view: &LiveEventView) {
    println!(
        "{}",
        LiveFormatter::format_view(
            view.state(),
            view.selected_race(),
            view.connection_state(),
            view.is_polling(),
            get_timestamp_millis(),
        )
    );
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = ClientConfig {
        poll_interval: Duration::from_secs(args.poll_secs.max(1)),
        ..ClientConfig::new(args.url)
    };
    let api = Arc::new(HttpLiveApi::new(config.base_url.clone()));

    let mut view = LiveEventView::mount(&config, &args.event_id, api).await;
    let race_id = args
        .race_id
        .or_else(|| view.state().races.first().map(|race| race.race_id.clone()));
    view.select_race(race_id).await;
    render(&view);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, closing the connection");
                break;
            }
            update = view.next_update() => match update {
                Some(ViewUpdate::Error(e)) => tracing::debug!("{}", e),
                Some(_) => render(&view),
                None => break,
            },
        }
    }

    view.teardown().await;
}
