//! WaterLevelStore — the `field_id -> FieldHistory` table and its
//! persistence/summary operations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::WaterLevelError;
use super::history::FieldHistory;
use super::reading::{derive_quality, ReadingQuality, ReadingSource, WaterLevelReading};
use crate::config::QualityThresholds;
use crate::model::FieldId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFormat {
    Numeric,
    Sgf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WaterLevelStore {
    histories: BTreeMap<String, FieldHistory>,
}

#[derive(Debug, Serialize)]
pub struct FieldSummaryEntry {
    pub field_id: String,
    pub value_mm: Option<f64>,
    pub age_hours: Option<f64>,
    pub quality: Option<ReadingQuality>,
    pub source: Option<ReadingSource>,
    pub confidence: Option<f64>,
    pub sample_count: usize,
}

#[derive(Debug, Serialize)]
pub struct StoreSummary {
    pub fields_with_data: usize,
    pub fields_without_data: usize,
    pub quality_distribution: BTreeMap<String, usize>,
    pub source_distribution: BTreeMap<String, usize>,
    pub fields: Vec<FieldSummaryEntry>,
}

impl WaterLevelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, stamp quality from source+age, and insert newest-first
    /// (capped at 100). Readings outside the 0-1000mm band or non-finite
    /// are always stamped `Invalid` and still stored (so `summary()` can
    /// report on rejected data) but never returned by `latest`/`trend`.
    pub fn add(&mut self, mut reading: WaterLevelReading, thresholds: &QualityThresholds) {
        let age_hours = reading.age_hours(Utc::now());
        reading.quality = derive_quality(reading.source, reading.value_mm, age_hours, thresholds);

        if reading.quality == ReadingQuality::Invalid {
            warn!(
                field_id = %reading.field_id,
                value_mm = reading.value_mm,
                "rejected water-level reading as invalid"
            );
        } else {
            debug!(
                field_id = %reading.field_id,
                value_mm = reading.value_mm,
                quality = ?reading.quality,
                "admitted water-level reading"
            );
        }

        self.histories
            .entry(reading.field_id.as_str().to_string())
            .or_default()
            .insert(reading);
    }

    pub fn latest(&self, field_id: &FieldId) -> Option<&WaterLevelReading> {
        self.histories.get(field_id.as_str())?.latest()
    }

    pub fn trend(&self, field_id: &FieldId, window_h: f64) -> Option<f64> {
        self.histories
            .get(field_id.as_str())?
            .trend(window_h, Utc::now())
    }

    pub fn history(&self, field_id: &FieldId) -> Option<&FieldHistory> {
        self.histories.get(field_id.as_str())
    }

    pub fn persist(&self, path: &Path) -> Result<(), WaterLevelError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| WaterLevelError::PersistIo(path.to_path_buf(), e))
    }

    pub fn load(path: &Path) -> Result<Self, WaterLevelError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| WaterLevelError::LoadIo(path.to_path_buf(), e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Summarize the store's contents. `field_ids` restricts the summary to
    /// a subset; `None` summarizes everything known to the store.
    pub fn summary(&self, field_ids: Option<&[FieldId]>, id_format: IdFormat) -> StoreSummary {
        let ids: Vec<String> = match field_ids {
            Some(ids) => ids.iter().map(|f| f.as_str().to_string()).collect(),
            None => self.histories.keys().cloned().collect(),
        };

        let mut quality_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut source_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut fields = Vec::with_capacity(ids.len());
        let mut with_data = 0usize;
        let mut without_data = 0usize;

        for id in &ids {
            let history = self.histories.get(id);
            let latest = history.and_then(|h| h.latest());

            match latest {
                Some(reading) => {
                    with_data += 1;
                    *quality_distribution
                        .entry(format!("{:?}", reading.quality))
                        .or_insert(0) += 1;
                    *source_distribution
                        .entry(format!("{:?}", reading.source))
                        .or_insert(0) += 1;

                    fields.push(FieldSummaryEntry {
                        field_id: Self::format_id(id, id_format),
                        value_mm: Some(reading.value_mm),
                        age_hours: Some(reading.age_hours(Utc::now())),
                        quality: Some(reading.quality),
                        source: Some(reading.source),
                        confidence: Some(reading.confidence),
                        sample_count: history.map(|h| h.len()).unwrap_or(0),
                    });
                }
                None => {
                    without_data += 1;
                    fields.push(FieldSummaryEntry {
                        field_id: Self::format_id(id, id_format),
                        value_mm: None,
                        age_hours: None,
                        quality: None,
                        source: None,
                        confidence: None,
                        sample_count: history.map(|h| h.len()).unwrap_or(0),
                    });
                }
            }
        }

        StoreSummary {
            fields_with_data: with_data,
            fields_without_data: without_data,
            quality_distribution,
            source_distribution,
            fields,
        }
    }

    /// The store itself only ever holds SGF-format ids; `id_format` only
    /// affects display in the summary. Numeric `sectionID` conversion is
    /// the caller's job at the boundary — this is a pass-through
    /// placeholder until a section-id map is wired in by the caller.
    fn format_id(id: &str, id_format: IdFormat) -> String {
        match id_format {
            IdFormat::Sgf => id.to_string(),
            IdFormat::Numeric => id.to_string(),
        }
    }
}
