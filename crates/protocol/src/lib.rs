//! # Codenav Protocol
//!
//! Shared leaf types for the codenav engine: cooperative cancellation,
//! the supported-language oracle, and the metrics sink.
//!
//! These live in their own member so the engine crates (ignore, history,
//! recommend, navigator) can share them without depending on each other.

mod cancel;
mod ids;
mod lang;
mod metrics;

pub use cancel::{CancelToken, Cancelled};
pub use ids::FileId;
pub use lang::{has_supported_extension, supported_extension};
pub use metrics::{MetricsSink, MetricsSnapshot};
