mod http;
mod websocket;

pub use http::{
    change_status, debug_rooms, get_event, get_oncourse, get_race_results, get_run_detail,
    health_check, ingest_oncourse, put_race_results, replace_structure,
};
pub use websocket::websocket_handler;
