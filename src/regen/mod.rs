//! Plan Regenerator — per-batch command re-derivation from fresh readings.

pub mod changes;
pub mod error;
pub mod regenerator;

pub use changes::{assess_impact, BatchRegenerationResult, PlanChange, PlanChangeImpact, PlanChangeType};
pub use error::RegenerationError;
pub use regenerator::regenerate_batch;
