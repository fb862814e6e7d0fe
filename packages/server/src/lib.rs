//! Live synchronization server for canoe-slalom competitions.
//!
//! Viewers connect per event over WebSocket and receive a full snapshot on
//! connect, then diffs and refresh signals as ingestion and admin actions
//! mutate the competition data.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
