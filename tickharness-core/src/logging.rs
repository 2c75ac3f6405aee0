//! Structured logging for simulation runs
//!
//! Everything in the harness logs through `tracing`. These helpers install a
//! `tracing-subscriber` formatter with sensible per-module defaults.
//!
//! # How to Control Terminal Logging Output
//!
//! ## 1. Pick a level in code
//! ```rust
//! use tickharness_core::init_simulation_logging_with_level;
//! init_simulation_logging_with_level("debug");
//! ```
//!
//! ## 2. Or use `RUST_LOG`, which always wins over the level argument
//! ```bash
//! RUST_LOG=debug cargo run --example arrival_demo
//! RUST_LOG=tickharness_core::scheduler=trace cargo run --example arrival_demo
//! ```
//!
//! ## Log Level Guidelines:
//! - **TRACE**: per-event submission and settlement, waiter registration
//! - **DEBUG**: clock advancement, arrival schedule start/end
//! - **INFO**: run start and completion
//! - **WARN**: stalled runs, `start` on a clock that is already running
//!
//! Initialisation uses `try_init`, so calling any of these more than once
//! (e.g. from several tests) is harmless.

use tracing::{info, Span};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{EventId, SimTime};

/// Initialize logging at INFO
pub fn init_simulation_logging() {
    init_simulation_logging_with_level("info")
}

/// Initialize logging with a specific level
///
/// # Arguments
/// * `level` - Log level: "trace", "debug", "info", "warn", or "error"
pub fn init_simulation_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{level},tickharness_core::scheduler={quiet},tickharness_core::async_runtime={quiet}",
            quiet = quieter(level)
        )
        .into()
    });

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Simulation logging initialized at level: {}", level);
    }
}

/// Initialize logging with everything at TRACE, pretty-printed
pub fn init_detailed_simulation_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "trace".into());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        info!("Detailed simulation logging initialized");
    }
}

// The clock and runtime log on every advance; keep them a level below the rest
// unless the caller asked for trace.
fn quieter(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "info",
        "info" => "warn",
        "warn" => "warn",
        _ => "error",
    }
}

/// Create a span for tracking one simulation run
pub fn simulation_span(name: &str) -> Span {
    tracing::info_span!("simulation", name = name)
}

/// Create a span for tracking one event
pub fn event_span(event_id: EventId, time: SimTime) -> Span {
    tracing::trace_span!("event", id = %event_id, time = %time)
}
