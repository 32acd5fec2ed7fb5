//! Common building blocks shared across Weir crates.
//!
//! - **Configuration**: Strongly typed application configuration (`config`).
//! - **Telemetry**: Tracing subscriber and optional OTLP export (`telemetry`).
pub mod config;
pub mod telemetry;
