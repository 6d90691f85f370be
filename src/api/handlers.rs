//! HTTP control surface handlers — one per scheduler control-surface
//! operation, wrapped in the `{success, data?, error?}` envelope.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{FarmRunnerConfig, RegenerationRules};
use crate::dispatch::DeviceControl;
use crate::model::{FarmConfig, FieldId};
use crate::plan::{build_plan, build_scenarios, Plan, ReadingResolutionMode};
use crate::scheduler::{BatchScheduler, StatusSnapshot};
use crate::waterlevel::{IdFormat, StoreSummary, WaterLevelSource, WaterLevelStore};

use super::{ApiError, Envelope};

/// Shared state handed to every handler, wrapping the app's mutable
/// pieces behind `Arc<RwLock<_>>`.
#[derive(Clone)]
pub struct ApiState {
    farm_config: Arc<tokio::sync::RwLock<Option<FarmConfig>>>,
    scheduler: Arc<tokio::sync::RwLock<Option<Arc<BatchScheduler>>>>,
    runner_config: FarmRunnerConfig,
    device_control: Arc<dyn DeviceControl>,
    cache_path: std::path::PathBuf,
}

impl ApiState {
    pub fn new(
        farm_config: Option<FarmConfig>,
        runner_config: FarmRunnerConfig,
        device_control: Arc<dyn DeviceControl>,
        cache_path: std::path::PathBuf,
    ) -> Self {
        Self {
            farm_config: Arc::new(tokio::sync::RwLock::new(farm_config)),
            scheduler: Arc::new(tokio::sync::RwLock::new(None)),
            runner_config,
            device_control,
            cache_path,
        }
    }
}

fn field_ids_from(values: &Option<Vec<String>>) -> Option<Vec<FieldId>> {
    values
        .as_ref()
        .map(|v| v.iter().map(|s| FieldId::from(s.as_str())).collect())
}

// ============================================================================
// POST /execution/start
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartExecutionRequest {
    pub plan_path: String,
    pub farm_id: String,
    #[serde(default)]
    pub enable_realtime: bool,
    #[serde(default)]
    pub pre_buffer_min: Option<f64>,
}

pub async fn start_execution(
    State(state): State<ApiState>,
    Json(req): Json<StartExecutionRequest>,
) -> Result<Json<Envelope<StatusSnapshot>>, ApiError> {
    let farm_config = {
        let guard = state.farm_config.read().await;
        guard
            .clone()
            .ok_or_else(|| ApiError::bad_request("no farm config loaded on this server"))?
    };
    if farm_config.farm_id != req.farm_id {
        return Err(ApiError::bad_request(format!(
            "farm_id mismatch: server is serving {} not {}",
            farm_config.farm_id, req.farm_id
        )));
    }

    {
        let existing = state.scheduler.read().await;
        if let Some(sched) = existing.as_ref() {
            let status = sched.status().await;
            if status.status == crate::scheduler::ExecutionStatus::Running {
                return Err(ApiError::from(crate::scheduler::SchedulerError::AlreadyRunning));
            }
        }
    }

    let plan_json = std::fs::read_to_string(&req.plan_path)
        .map_err(|e| ApiError::bad_request(format!("failed to read {}: {e}", req.plan_path)))?;
    let plan: Plan = serde_json::from_str(&plan_json)
        .map_err(|e| ApiError::bad_request(format!("failed to parse plan: {e}")))?;

    let store = WaterLevelStore::load(&state.cache_path)?;
    let source = WaterLevelSource::new(
        Box::new(super::devices::EmptySensorApi),
        state.runner_config.source.clone(),
    );

    let mut scheduler_config = state.runner_config.scheduler.clone();
    if let Some(pre_buffer) = req.pre_buffer_min {
        scheduler_config.pre_buffer_minutes = pre_buffer;
    }

    let scheduler = BatchScheduler::new(
        farm_config,
        plan,
        store,
        source,
        state.device_control.clone(),
        scheduler_config,
    )?;
    let scheduler = Arc::new(scheduler);

    if req.enable_realtime {
        scheduler.update_water_levels(None).await?;
    }

    scheduler.start();
    info!(farm_id = %req.farm_id, "execution started via HTTP control surface");

    *state.scheduler.write().await = Some(scheduler.clone());
    Ok(Envelope::ok(scheduler.status().await))
}

// ============================================================================
// POST /execution/stop
// ============================================================================

pub async fn stop_execution(
    State(state): State<ApiState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let guard = state.scheduler.read().await;
    let scheduler = guard
        .as_ref()
        .ok_or(crate::scheduler::SchedulerError::NoActiveExecution)?;
    scheduler.stop();
    Ok(Envelope::ok(()))
}

// ============================================================================
// GET /execution/status
// ============================================================================

pub async fn get_status(
    State(state): State<ApiState>,
) -> Result<Json<Envelope<StatusSnapshot>>, ApiError> {
    let guard = state.scheduler.read().await;
    let scheduler = guard
        .as_ref()
        .ok_or(crate::scheduler::SchedulerError::NoActiveExecution)?;
    Ok(Envelope::ok(scheduler.status().await))
}

// ============================================================================
// POST /execution/batches/:index/regenerate
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegenerateBatchRequest {
    #[serde(default)]
    pub custom_water_levels: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub custom_standards: Option<RegenerationRules>,
}

pub async fn regenerate_batch(
    State(state): State<ApiState>,
    Path(index): Path<usize>,
    Json(req): Json<RegenerateBatchRequest>,
) -> Result<Json<Envelope<crate::regen::BatchRegenerationResult>>, ApiError> {
    let guard = state.scheduler.read().await;
    let scheduler = guard
        .as_ref()
        .ok_or(crate::scheduler::SchedulerError::NoActiveExecution)?;

    let custom_water_levels = req.custom_water_levels.map(|map| {
        map.into_iter()
            .map(|(k, v)| (FieldId::from(k.as_str()), v))
            .collect::<HashMap<FieldId, f64>>()
    });

    let result = scheduler
        .manual_regenerate_batch(index, custom_water_levels, req.custom_standards)
        .await?;
    Ok(Envelope::ok(result))
}

// ============================================================================
// POST /waterlevels/refresh
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RefreshWaterLevelsRequest {
    pub farm_id: String,
    #[serde(default)]
    pub field_ids: Option<Vec<String>>,
}

pub async fn refresh_water_levels(
    State(state): State<ApiState>,
    Json(req): Json<RefreshWaterLevelsRequest>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let guard = state.scheduler.read().await;
    let scheduler = guard
        .as_ref()
        .ok_or(crate::scheduler::SchedulerError::NoActiveExecution)?;
    if scheduler.farm_config().farm_id != req.farm_id {
        return Err(ApiError::bad_request("farm_id does not match active execution"));
    }

    let ids = field_ids_from(&req.field_ids);
    scheduler.update_water_levels(ids.as_deref()).await?;
    Ok(Envelope::ok(()))
}

// ============================================================================
// GET /waterlevels/summary
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default)]
    pub field_ids: Option<String>,
    #[serde(default)]
    pub id_format: Option<String>,
}

pub async fn waterlevels_summary(
    State(state): State<ApiState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Envelope<StoreSummary>>, ApiError> {
    let guard = state.scheduler.read().await;
    let scheduler = guard
        .as_ref()
        .ok_or(crate::scheduler::SchedulerError::NoActiveExecution)?;

    let ids: Option<Vec<FieldId>> = query
        .field_ids
        .as_ref()
        .map(|csv| csv.split(',').map(FieldId::from).collect());
    let id_format = match query.id_format.as_deref() {
        Some("numeric") => IdFormat::Numeric,
        _ => IdFormat::Sgf,
    };

    let summary = scheduler.store_summary(ids.as_deref(), id_format).await;
    Ok(Envelope::ok(summary))
}

// ============================================================================
// POST /plan/build
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BuildPlanQuery {
    #[serde(default)]
    pub scenarios: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BuildPlanResponse {
    Single(Plan),
    Scenarios(crate::plan::ScenarioComparison),
}

pub async fn build_plan_handler(
    Query(query): Query<BuildPlanQuery>,
    Json(farm_config): Json<FarmConfig>,
) -> Result<Json<Envelope<BuildPlanResponse>>, ApiError> {
    if query.scenarios.unwrap_or(false) {
        let comparison = build_scenarios(&farm_config, 1, ReadingResolutionMode::PurelyConfigured, None)?;
        Ok(Envelope::ok(BuildPlanResponse::Scenarios(comparison)))
    } else {
        let plan = build_plan(&farm_config, ReadingResolutionMode::PurelyConfigured, None, None)?;
        Ok(Envelope::ok(BuildPlanResponse::Single(plan)))
    }
}
