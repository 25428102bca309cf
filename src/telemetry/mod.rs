//! Remote telemetry synchronization.
//!
//! This module contains:
//! - The session contract and an in-memory reading cache (resampling,
//!   differencing, time zone conversion)
//! - The Flukso HTTP client and the session built on it
//! - Wide and long frame layouts

pub mod client;
pub mod frame;
pub mod session;

// Re-export commonly used types
pub use client::{BlockingFluksoClient, FluksoClient, FluksoConfig, FluksoSession};
pub use frame::{format_timestamp, Column, Frame, Layout, NormalizedRow, TIMESTAMP_FORMAT};
pub use session::{
    DataRequest, MemorySession, Reading, ReadingCache, Resolution, TelemetryError, TelemetrySession,
    DEFAULT_TIMEZONE,
};
