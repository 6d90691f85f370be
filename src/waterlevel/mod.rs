//! Water-Level Store and Water-Level Source — history tracking, persistence,
//! and the live-API/cache/config fallback chain.

pub mod error;
pub mod history;
pub mod reading;
pub mod source;
pub mod store;

pub use error::WaterLevelError;
pub use history::FieldHistory;
pub use reading::{derive_quality, ReadingQuality, ReadingSource, WaterLevelReading};
pub use source::{RawSensorReading, SensorApi, SensorApiError, WaterLevelSource};
pub use store::{FieldSummaryEntry, IdFormat, StoreSummary, WaterLevelStore};
