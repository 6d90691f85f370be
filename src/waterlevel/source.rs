//! Water-Level Source — resolves "latest readings for farm" through a
//! fallback chain: live API (throttled) -> cache -> config default.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::WaterLevelError;
use super::reading::{derive_quality, ReadingSource, WaterLevelReading};
use super::store::WaterLevelStore;
use crate::config::SourceConfig;
use crate::model::{FarmConfig, FieldId};

/// One raw reading as returned by the external sensor API, before it is
/// folded into a `WaterLevelReading`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSensorReading {
    pub field_id: String,
    pub waterlevel_mm: f64,
    pub timestamp: Option<chrono::DateTime<Utc>>,
    pub sensor_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SensorApiError {
    #[error("sensor API request failed: {0}")]
    RequestFailed(String),

    #[error("sensor API request timed out")]
    TimedOut,
}

/// Injectable seam over the external sensor API, so tests supply a fake
/// implementation instead of making network calls.
#[async_trait]
pub trait SensorApi: Send + Sync {
    async fn fetch(&self, farm_id: &str) -> Result<Vec<RawSensorReading>, SensorApiError>;
}

pub struct WaterLevelSource {
    api: Box<dyn SensorApi>,
    config: SourceConfig,
    last_api_call: Option<Instant>,
}

impl WaterLevelSource {
    pub fn new(api: Box<dyn SensorApi>, config: SourceConfig) -> Self {
        Self {
            api,
            config,
            last_api_call: None,
        }
    }

    fn throttled(&self) -> bool {
        match self.last_api_call {
            Some(last) => {
                last.elapsed() < Duration::from_secs_f64(self.config.api_throttle_minutes * 60.0)
            }
            None => false,
        }
    }

    /// Resolve readings for every field in `farm_config`, following the
    /// fallback chain, and fold each admitted reading into `store`.
    pub async fn resolve(
        &mut self,
        farm_config: &FarmConfig,
        store: &mut WaterLevelStore,
        field_ids: Option<&[FieldId]>,
    ) -> Result<(), WaterLevelError> {
        let wanted: Vec<FieldId> = match field_ids {
            Some(ids) => ids.to_vec(),
            None => farm_config.fields.iter().map(|f| f.id.clone()).collect(),
        };

        let mut resolved: HashMap<String, WaterLevelReading> = HashMap::new();

        // 1. Live fetch, throttled.
        if !self.throttled() {
            self.last_api_call = Some(Instant::now());
            let timeout = Duration::from_secs(self.config.fetch_timeout_s);
            match tokio::time::timeout(timeout, self.api.fetch(&farm_config.farm_id)).await {
                Ok(Ok(raw_readings)) => {
                    info!(count = raw_readings.len(), "fetched live sensor readings");
                    for raw in raw_readings {
                        let reading = Self::from_raw(raw, &farm_config.quality_thresholds);
                        resolved.insert(reading.field_id.as_str().to_string(), reading);
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "sensor API call failed, falling through to cache/config");
                }
                Err(_) => {
                    warn!("sensor API call timed out, falling through to cache/config");
                }
            }
        } else {
            debug!("sensor API call throttled, skipping live fetch");
        }

        // 2. Cache, for fields still missing.
        for field_id in &wanted {
            if resolved.contains_key(field_id.as_str()) {
                continue;
            }
            if let Some(cached) = store.latest(field_id) {
                let age_hours = cached.age_hours(Utc::now());
                if age_hours <= self.config.max_cache_age_hours as f64 {
                    let mut reading = cached.clone();
                    reading.source = ReadingSource::Cached;
                    reading.quality = derive_quality(
                        reading.source,
                        reading.value_mm,
                        age_hours,
                        &farm_config.quality_thresholds,
                    );
                    resolved.insert(field_id.as_str().to_string(), reading);
                }
            }
        }

        // 3. Config default, for fields still missing.
        for field_id in &wanted {
            if resolved.contains_key(field_id.as_str()) {
                continue;
            }
            if let Some(field) = farm_config.field(field_id) {
                let reading = WaterLevelReading {
                    field_id: field_id.clone(),
                    value_mm: field.wl_opt,
                    timestamp: Utc::now(),
                    source: ReadingSource::Config,
                    quality: super::reading::ReadingQuality::Fair,
                    confidence: 0.5,
                    provenance: serde_json::json!({"fallback": "config_default"}),
                };
                resolved.insert(field_id.as_str().to_string(), reading);
            }
        }

        for reading in resolved.into_values() {
            store.add(reading, &farm_config.quality_thresholds);
        }

        Ok(())
    }

    /// Confidence from sensor payload completeness: timestamp present,
    /// sensor-id present, value in-range each contribute a third.
    fn confidence_from_payload(raw: &RawSensorReading) -> f64 {
        let mut score = 0.0;
        if raw.timestamp.is_some() {
            score += 1.0 / 3.0;
        }
        if raw.sensor_id.is_some() {
            score += 1.0 / 3.0;
        }
        if raw.waterlevel_mm.is_finite()
            && raw.waterlevel_mm >= crate::config::defaults::MIN_WATER_LEVEL_MM
            && raw.waterlevel_mm <= crate::config::defaults::MAX_WATER_LEVEL_MM
        {
            score += 1.0 / 3.0;
        }
        score
    }

    fn from_raw(
        raw: RawSensorReading,
        thresholds: &crate::config::QualityThresholds,
    ) -> WaterLevelReading {
        let timestamp = raw.timestamp.unwrap_or_else(Utc::now);
        let confidence = Self::confidence_from_payload(&raw);
        let age_hours = (Utc::now() - timestamp).num_milliseconds() as f64 / 3_600_000.0;
        let quality = derive_quality(ReadingSource::Api, raw.waterlevel_mm, age_hours, thresholds);

        WaterLevelReading {
            field_id: FieldId::from(raw.field_id.as_str()),
            value_mm: raw.waterlevel_mm,
            timestamp,
            source: ReadingSource::Api,
            quality,
            confidence,
            provenance: serde_json::json!({"sensor_id": raw.sensor_id}),
        }
    }
}
