//! End-to-end Plan Builder -> Batch Scheduler integration tests. No HTTP, no
//! binary spawn — exercises the driver loop directly against a small
//! synthetic farm, driving the real async loop instead of mocking it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use farm_irrigation_scheduler::config::SchedulerConfig;
use farm_irrigation_scheduler::dispatch::{DeviceCommand, DeviceControl};
use farm_irrigation_scheduler::model::{Field, FieldId, Gate, GateId, GateKind, Pump, PumpId, Segment, SegmentId, SegmentKind};
use farm_irrigation_scheduler::plan::{build_plan, ReadingResolutionMode};
use farm_irrigation_scheduler::scheduler::{BatchScheduler, ExecutionStatus};
use farm_irrigation_scheduler::waterlevel::{SensorApi, SensorApiError, WaterLevelSource, WaterLevelStore};
use farm_irrigation_scheduler::{FarmConfig};

struct RecordingDeviceControl {
    calls: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl DeviceControl for RecordingDeviceControl {
    async fn actuate(&self, cmd: &DeviceCommand) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{:?}:{}:{:?}", cmd.device_type, cmd.device_id, cmd.action));
        true
    }
}

struct EmptyApi;

#[async_trait]
impl SensorApi for EmptyApi {
    async fn fetch(
        &self,
        _farm_id: &str,
    ) -> Result<Vec<farm_irrigation_scheduler::waterlevel::RawSensorReading>, SensorApiError> {
        Ok(Vec::new())
    }
}

fn small_farm() -> FarmConfig {
    FarmConfig {
        farm_id: "FARM-1".to_string(),
        t_win_h: 20.0,
        d_target_mm: 90.0,
        pumps: vec![Pump {
            id: PumpId::from("P1"),
            q_rated_m3ph: 400.0,
            efficiency: 1.0,
            power_kw: 15.0,
            electricity_price: 1.0,
        }],
        segments: vec![Segment {
            id: SegmentId::from("S1"),
            canal_id: "C1".to_string(),
            distance_rank: 0,
            kind: SegmentKind::Main,
            regulator_gate_ids: vec![GateId::from("S1-G1")],
            feed_by: vec![],
        }],
        gates: vec![Gate {
            id: GateId::from("S1-G1"),
            kind: GateKind::MainRegulator,
            q_max_m3ph: 1000.0,
        }],
        fields: vec![Field {
            id: FieldId::from("F1"),
            section_id: 1,
            area_mu: 10.0,
            segment_id: SegmentId::from("S1"),
            distance_rank: 0,
            inlet_gate_id: GateId::from("S1-G2"),
            wl_mm: Some(40.0),
            wl_low: 20.0,
            wl_opt: 60.0,
            wl_high: 90.0,
            has_drain_gate: false,
            rel_to_regulator: 1,
        }],
        active_pump_ids: vec![PumpId::from("P1")],
        allowed_zone_segment_ids: None,
        quality_thresholds: Default::default(),
        regeneration_rules: Default::default(),
    }
}

/// A one-field, one-batch plan should drive through preparing -> executing
/// -> completed within a handful of ticks, and dispatch pump-start,
/// regulator and pump-stop commands in the documented order.
#[tokio::test]
async fn single_batch_plan_runs_to_completion() {
    let farm = small_farm();
    let plan = build_plan(&farm, ReadingResolutionMode::PurelyConfigured, None, None).unwrap();
    assert_eq!(plan.batches.len(), 1);

    let store = WaterLevelStore::new();
    let source = WaterLevelSource::new(Box::new(EmptyApi), Default::default());
    let control = Arc::new(RecordingDeviceControl {
        calls: std::sync::Mutex::new(Vec::new()),
    });

    let mut scheduler_config = SchedulerConfig::default();
    scheduler_config.tick_interval_s = 1;
    scheduler_config.pre_buffer_minutes = 0.0;

    let scheduler = BatchScheduler::new(
        farm,
        plan,
        store,
        source,
        control.clone(),
        scheduler_config,
    )
    .unwrap();

    let handle = scheduler.start();

    // The store starts empty, so prepare's resolve call falls back to the
    // field's configured optimum as its reading, which already satisfies
    // the completion monitor's threshold on the very first poll.
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("scheduler did not finish in time")
        .unwrap();

    let status = scheduler.status().await;
    assert_eq!(status.status, ExecutionStatus::Completed);

    let calls = control.calls.lock().unwrap().clone();
    assert!(calls.iter().any(|c| c.contains("Pump") && c.contains("Start")));
    assert!(calls.iter().any(|c| c.contains("FieldInletGate")));
    assert!(calls.iter().any(|c| c.contains("Pump") && c.contains("Stop")));
}

/// `new` refuses a plan with zero batches instead of building an executor
/// around nothing to run.
#[test]
fn scheduler_refuses_empty_plan() {
    let farm = small_farm();
    let empty_plan = farm_irrigation_scheduler::plan::Plan::empty(
        0.0,
        farm.t_win_h,
        farm.d_target_mm,
        0.0,
        vec![],
        vec![],
    );
    let store = WaterLevelStore::new();
    let source = WaterLevelSource::new(Box::new(EmptyApi), Default::default());
    let control: Arc<dyn DeviceControl> = Arc::new(RecordingDeviceControl {
        calls: std::sync::Mutex::new(Vec::new()),
    });

    let result = BatchScheduler::new(
        farm,
        empty_plan,
        store,
        source,
        control,
        SchedulerConfig::default(),
    );
    assert!(result.is_err());
}
