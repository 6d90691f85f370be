//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the control surface using `tower::ServiceExt::oneshot()`. No binary
//! spawn, no network port.

use farm_irrigation_scheduler::api::devices::LoggingDeviceControl;
use farm_irrigation_scheduler::api::{create_app, ApiState};
use farm_irrigation_scheduler::config::FarmRunnerConfig;
use farm_irrigation_scheduler::dispatch::DeviceControl;
use farm_irrigation_scheduler::model::{
    Field, FieldId, Gate, GateId, GateKind, Pump, PumpId, Segment, SegmentId, SegmentKind,
};
use farm_irrigation_scheduler::FarmConfig;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

fn test_farm_config() -> FarmConfig {
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

fn test_state(farm_config: Option<FarmConfig>) -> ApiState {
    let device_control: Arc<dyn DeviceControl> = Arc::new(LoggingDeviceControl);
    ApiState::new(
        farm_config,
        FarmRunnerConfig::default(),
        device_control,
        std::env::temp_dir().join("farm_scheduler_api_regression_cache.json"),
    )
}

/// Every endpoint that reads execution state before any execution has been
/// started should fail clean with 400, not panic or 500.
#[tokio::test]
async fn test_execution_endpoints_without_active_run_return_400() {
    let endpoints_get = ["/execution/status", "/waterlevels/summary"];

    for endpoint in &endpoints_get {
        let app = create_app(test_state(None));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri(*endpoint)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.status(),
            StatusCode::BAD_REQUEST,
            "GET {endpoint} should be 400 with no active execution"
        );
    }

    let app = create_app(test_state(None));
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/execution/stop")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// `/execution/start` rejects a request naming a farm_id that does not match
/// the config this server was started with.
#[tokio::test]
async fn test_start_execution_rejects_farm_id_mismatch() {
    let app = create_app(test_state(Some(test_farm_config())));

    let body = serde_json::json!({
        "plan_path": "/nonexistent/plan.json",
        "farm_id": "SOME-OTHER-FARM",
    });

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .header("content-type", "application/json")
                .uri("/execution/start")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("farm_id mismatch"));
}

/// `/execution/start` with no farm config loaded on the server fails clean
/// rather than panicking on an unwrap of a missing config.
#[tokio::test]
async fn test_start_execution_without_loaded_config_returns_400() {
    let app = create_app(test_state(None));

    let body = serde_json::json!({
        "plan_path": "/tmp/whatever.json",
        "farm_id": "FARM-1",
    });

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .header("content-type", "application/json")
                .uri("/execution/start")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// `/plan/build` builds a plan from a posted farm config and returns it
/// wrapped in the success envelope.
#[tokio::test]
async fn test_build_plan_returns_plan_in_envelope() {
    let app = create_app(test_state(None));

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .header("content-type", "application/json")
                .uri("/plan/build")
                .body(Body::from(serde_json::to_string(&test_farm_config()).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["data"]["batches"].is_array());
}

/// `/plan/build?scenarios=true` returns the multi-scenario comparison shape
/// instead of a single plan.
#[tokio::test]
async fn test_build_plan_scenarios_returns_comparison() {
    let app = create_app(test_state(None));

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .header("content-type", "application/json")
                .uri("/plan/build?scenarios=true")
                .body(Body::from(serde_json::to_string(&test_farm_config()).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["data"]["scenarios"].is_array());
}

/// Invalid JSON syntax in the request body is a 400 (axum's JSON extractor
/// rejection), not a 500 reaching into the handler.
#[tokio::test]
async fn test_build_plan_rejects_invalid_json_syntax() {
    let app = create_app(test_state(None));

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .header("content-type", "application/json")
                .uri("/plan/build")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// Well-formed JSON missing required `FarmConfig` fields is a 422
/// (deserialize failure), distinguishing it from a syntax error.
#[tokio::test]
async fn test_build_plan_rejects_incomplete_farm_config() {
    let app = create_app(test_state(None));

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .header("content-type", "application/json")
                .uri("/plan/build")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
