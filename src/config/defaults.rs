//! System-wide default constants.
//!
//! Centralizes magic numbers referenced by more than one module.

// ============================================================================
// Water-level quality / ingestion
// ============================================================================

/// Water level readings must fall within this band (mm) or they are
/// always admitted as `quality = Invalid` and excluded from planning.
pub const MIN_WATER_LEVEL_MM: f64 = 0.0;
pub const MAX_WATER_LEVEL_MM: f64 = 1000.0;

/// Maximum readings retained per field history ring buffer.
pub const MAX_READINGS_PER_FIELD: usize = 100;

// ============================================================================
// Plan Builder
// ============================================================================

/// Water volume (m^3) per mu per mm of target depth: 1 mu = 666.667 m^2,
/// so 1mm of depth over 1 mu is 0.666667 m^3.
pub const M3_PER_MU_PER_MM: f64 = 0.666667;

// ============================================================================
// Scheduler
// ============================================================================

/// Minimum tick cadence for the batch scheduler's cooperative loop.
pub const DEFAULT_TICK_INTERVAL_S: u64 = 30;

/// Default pre-execution buffer (minutes) before a batch's scheduled start.
pub const DEFAULT_PRE_BUFFER_MINUTES: f64 = 5.0;

/// Default completion-monitor poll interval (seconds).
pub const DEFAULT_COMPLETION_POLL_INTERVAL_S: u64 = 15;
