//! Farm Model — pure data, no I/O. Owns the domain types from the data
//! model and the helpers that parse/recognize them (gate-id parsing,
//! regulator-kind recognition).

pub mod error;
pub mod farm_config;
pub mod field;
pub mod gate;
pub mod ids;
pub mod pump;
pub mod segment;

pub use error::FarmModelError;
pub use farm_config::FarmConfig;
pub use field::Field;
pub use gate::{Gate, GateKind};
pub use ids::{parse_gate_id, FieldId, GateId, PumpId, SegmentId};
pub use pump::Pump;
pub use segment::{Segment, SegmentKind};
