//! # Utility Modules
//!
//! Supporting utilities for logging and metrics.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: per-controller atomic traffic counters

pub mod logging;
pub mod metrics;

pub use metrics::{MetricsSnapshot, SyncMetrics};
