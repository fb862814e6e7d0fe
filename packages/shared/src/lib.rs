//! Types and helpers shared by the slalom-live server and client.
//!
//! - `protocol`: WebSocket envelope and payload types (full / diff / refresh)
//! - `logger`: tracing subscriber setup for the binaries
//! - `time`: timestamp and race-time formatting

pub mod logger;
pub mod protocol;
pub mod time;
