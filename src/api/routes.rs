//! Route table for the control surface.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};

pub fn control_routes(state: ApiState) -> Router {
    Router::new()
        .route("/execution/start", post(handlers::start_execution))
        .route("/execution/stop", post(handlers::stop_execution))
        .route("/execution/status", get(handlers::get_status))
        .route(
            "/execution/batches/:index/regenerate",
            post(handlers::regenerate_batch),
        )
        .route("/waterlevels/refresh", post(handlers::refresh_water_levels))
        .route("/waterlevels/summary", get(handlers::waterlevels_summary))
        .route("/plan/build", post(handlers::build_plan_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> ApiState {
        ApiState::new(
            None,
            crate::config::FarmRunnerConfig::default(),
            Arc::new(super::super::devices::LoggingDeviceControl),
            std::env::temp_dir().join("farm_scheduler_test_cache.json"),
        )
    }

    #[tokio::test]
    async fn status_without_active_execution_is_bad_request() {
        let app = control_routes(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/execution/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn build_plan_rejects_empty_body() {
        let app = control_routes(test_state());
        let response = app
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
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
