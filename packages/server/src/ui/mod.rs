//! UI 層: axum の HTTP / WebSocket エンドポイント

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
