//! Runner Configuration Module
//!
//! Provides the operator-tunable configuration for the irrigation scheduler,
//! replacing hardcoded thresholds (reading quality ages, regeneration
//! adjustment ratios, scheduler cadence) with TOML values.
//!
//! ## Loading Order
//!
//! 1. `FARM_RUNNER_CONFIG` environment variable (path to TOML file)
//! 2. `farm_runner.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(FarmRunnerConfig::load());
//!
//! // Anywhere in the codebase:
//! let max_age = config::get().quality_thresholds.fair_max_age_hours;
//! ```

mod runner_config;
pub mod defaults;

pub use runner_config::*;

use std::sync::OnceLock;

/// Global runner configuration, initialized once at startup.
static RUNNER_CONFIG: OnceLock<FarmRunnerConfig> = OnceLock::new();

/// Initialize the global runner configuration.
///
/// Must be called exactly once before any calls to `get()`.
pub fn init(config: FarmRunnerConfig) {
    if RUNNER_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global runner configuration.
///
/// Panics if `init()` has not been called. This is by design — a missing
/// config is a fatal startup error, not a recoverable condition.
pub fn get() -> &'static FarmRunnerConfig {
    RUNNER_CONFIG
        .get()
        .expect("config::get() called before config::init() — this is a startup bug")
}

/// Check whether the config has been initialized. Useful for tests.
pub fn is_initialized() -> bool {
    RUNNER_CONFIG.get().is_some()
}
