//! WaterLevelReading — one observation of a field's water depth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::defaults::{MAX_WATER_LEVEL_MM, MIN_WATER_LEVEL_MM};
use crate::model::FieldId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    Api,
    Manual,
    Config,
    Interpolated,
    Cached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterLevelReading {
    pub field_id: FieldId,
    pub value_mm: f64,
    pub timestamp: DateTime<Utc>,
    pub source: ReadingSource,
    pub quality: ReadingQuality,
    pub confidence: f64,
    /// Free-form provenance bag (sensor id, raw payload fields, etc.).
    #[serde(default)]
    pub provenance: serde_json::Value,
}

impl WaterLevelReading {
    /// Age of this reading relative to `now`, in hours. Negative if the
    /// reading's timestamp is in the future (clock skew); callers should
    /// treat negative age the same as zero.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_milliseconds() as f64 / 3_600_000.0
    }

    /// A reading is admissible to planning iff its quality is not `Invalid`
    /// and its value falls within the configured band. Out-of-band or NaN
    /// values are always dropped, never "sometimes kept".
    pub fn is_admissible(&self) -> bool {
        self.quality != ReadingQuality::Invalid
            && self.value_mm.is_finite()
            && self.value_mm >= MIN_WATER_LEVEL_MM
            && self.value_mm <= MAX_WATER_LEVEL_MM
    }
}

/// Derive a reading's quality from its source and age, using the
/// configured thresholds. Out-of-band or non-finite values are always
/// `Invalid` regardless of source/age.
pub fn derive_quality(
    source: ReadingSource,
    value_mm: f64,
    age_hours: f64,
    thresholds: &crate::config::QualityThresholds,
) -> ReadingQuality {
    if !value_mm.is_finite()
        || value_mm < thresholds.min_water_level_mm
        || value_mm > thresholds.max_water_level_mm
    {
        return ReadingQuality::Invalid;
    }

    match source {
        ReadingSource::Config => ReadingQuality::Fair,
        _ => {
            if age_hours <= thresholds.excellent_max_age_hours {
                ReadingQuality::Excellent
            } else if age_hours <= thresholds.good_max_age_hours {
                ReadingQuality::Good
            } else if age_hours <= thresholds.fair_max_age_hours {
                ReadingQuality::Fair
            } else {
                ReadingQuality::Poor
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityThresholds;

    #[test]
    fn out_of_band_value_is_always_invalid() {
        let t = QualityThresholds::default();
        assert_eq!(
            derive_quality(ReadingSource::Api, 1500.0, 0.1, &t),
            ReadingQuality::Invalid
        );
        assert_eq!(
            derive_quality(ReadingSource::Api, -5.0, 0.1, &t),
            ReadingQuality::Invalid
        );
        assert_eq!(
            derive_quality(ReadingSource::Api, f64::NAN, 0.1, &t),
            ReadingQuality::Invalid
        );
    }

    #[test]
    fn api_within_one_hour_is_excellent() {
        let t = QualityThresholds::default();
        assert_eq!(
            derive_quality(ReadingSource::Api, 50.0, 0.5, &t),
            ReadingQuality::Excellent
        );
    }

    #[test]
    fn cached_over_a_day_is_poor() {
        let t = QualityThresholds::default();
        assert_eq!(
            derive_quality(ReadingSource::Cached, 50.0, 30.0, &t),
            ReadingQuality::Poor
        );
    }

    #[test]
    fn config_default_is_always_fair() {
        let t = QualityThresholds::default();
        assert_eq!(
            derive_quality(ReadingSource::Config, 50.0, 1000.0, &t),
            ReadingQuality::Fair
        );
    }
}
