//! Reconnecting live client for slalom-live.
//!
//! - `connection`: transport state machine and its async driver
//! - `reconciler`: pure reducer merging full / diff / refresh into local state
//! - `polling`: REST fallback while the live channel is down
//! - `api`: REST reads used by bootstrap, refresh, polling and run details
//! - `view`: one mounted event view tying the pieces together
//! - `formatter`: terminal rendering of a view

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod formatter;
pub mod polling;
pub mod reconciler;
pub mod view;
