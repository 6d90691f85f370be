//! FieldHistory — a newest-first, size-capped ring of readings for one
//! field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reading::WaterLevelReading;
use crate::config::defaults::MAX_READINGS_PER_FIELD;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldHistory {
    readings: Vec<WaterLevelReading>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for FieldHistory {
    fn default() -> Self {
        Self {
            readings: Vec::new(),
            last_updated: None,
        }
    }
}

impl FieldHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reading in newest-first order (by timestamp — the newer
    /// timestamp wins regardless of arrival order, the documented ordering rule
    /// guarantee), then cap at `MAX_READINGS_PER_FIELD`.
    pub fn insert(&mut self, reading: WaterLevelReading) {
        let pos = self
            .readings
            .iter()
            .position(|r| r.timestamp <= reading.timestamp)
            .unwrap_or(self.readings.len());
        self.readings.insert(pos, reading);
        self.readings.truncate(MAX_READINGS_PER_FIELD);
        self.last_updated = Some(Utc::now());
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn readings(&self) -> &[WaterLevelReading] {
        &self.readings
    }

    /// Newest admitted reading, if any.
    pub fn latest(&self) -> Option<&WaterLevelReading> {
        self.readings.iter().find(|r| r.is_admissible())
    }

    /// Linear trend (mm/h) across admitted readings within `window_h` of
    /// now. `None` if fewer than 2 valid samples, or the time span between
    /// the oldest and newest sample in the window is zero.
    pub fn trend(&self, window_h: f64, now: DateTime<Utc>) -> Option<f64> {
        let cutoff = now - chrono::Duration::milliseconds((window_h * 3_600_000.0) as i64);
        let samples: Vec<&WaterLevelReading> = self
            .readings
            .iter()
            .filter(|r| r.is_admissible() && r.timestamp >= cutoff)
            .collect();

        if samples.len() < 2 {
            return None;
        }

        let newest_ts = samples.iter().map(|r| r.timestamp).max()?;
        let oldest_ts = samples.iter().map(|r| r.timestamp).min()?;
        let span_h = (newest_ts - oldest_ts).num_milliseconds() as f64 / 3_600_000.0;
        if span_h == 0.0 {
            return None;
        }

        // Simple linear regression of value against elapsed hours since the
        // oldest sample in the window.
        let points: Vec<(f64, f64)> = samples
            .iter()
            .map(|r| {
                let x = (r.timestamp - oldest_ts).num_milliseconds() as f64 / 3_600_000.0;
                (x, r.value_mm)
            })
            .collect();

        let n = points.len() as f64;
        let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
        let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
        let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
        let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

        let denom = n * sum_xx - sum_x * sum_x;
        if denom == 0.0 {
            return None;
        }

        Some((n * sum_xy - sum_x * sum_y) / denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldId;
    use crate::waterlevel::reading::{ReadingQuality, ReadingSource};

    fn reading(field: &str, value: f64, ts: DateTime<Utc>) -> WaterLevelReading {
        WaterLevelReading {
            field_id: FieldId::from(field),
            value_mm: value,
            timestamp: ts,
            source: ReadingSource::Api,
            quality: ReadingQuality::Excellent,
            confidence: 0.9,
            provenance: serde_json::Value::Null,
        }
    }

    #[test]
    fn caps_at_max_size() {
        let mut h = FieldHistory::new();
        let base = Utc::now();
        for i in 0..(MAX_READINGS_PER_FIELD + 20) {
            h.insert(reading("F1", 50.0, base + chrono::Duration::minutes(i as i64)));
        }
        assert_eq!(h.len(), MAX_READINGS_PER_FIELD);
    }

    #[test]
    fn newest_first_regardless_of_insertion_order() {
        let mut h = FieldHistory::new();
        let base = Utc::now();
        h.insert(reading("F1", 10.0, base));
        h.insert(reading("F1", 20.0, base + chrono::Duration::hours(2)));
        h.insert(reading("F1", 15.0, base + chrono::Duration::hours(1)));
        let values: Vec<f64> = h.readings().iter().map(|r| r.value_mm).collect();
        assert_eq!(values, vec![20.0, 15.0, 10.0]);
    }

    #[test]
    fn trend_none_with_fewer_than_two_samples() {
        let mut h = FieldHistory::new();
        h.insert(reading("F1", 10.0, Utc::now()));
        assert!(h.trend(24.0, Utc::now()).is_none());
    }

    #[test]
    fn trend_positive_slope_when_rising() {
        let mut h = FieldHistory::new();
        let base = Utc::now() - chrono::Duration::hours(2);
        h.insert(reading("F1", 10.0, base));
        h.insert(reading("F1", 30.0, base + chrono::Duration::hours(2)));
        let slope = h.trend(24.0, base + chrono::Duration::hours(2)).unwrap();
        assert!(slope > 0.0);
    }
}
