//! HTTP control surface — an `axum::Router` exposing the Batch
//! Scheduler's control surface as JSON endpoints.

pub mod devices;
pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete control-surface router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .merge(routes::control_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// `{success, data?, error?}` response envelope used by every handler.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> axum::Json<Self> {
        axum::Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// Uniform error type for every handler, mapped to a JSON envelope on the
/// way out.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, axum::Json(body)).into_response()
    }
}

impl From<crate::scheduler::SchedulerError> for ApiError {
    fn from(e: crate::scheduler::SchedulerError) -> Self {
        let status = match e {
            crate::scheduler::SchedulerError::NoActiveExecution
            | crate::scheduler::SchedulerError::BatchIndexOutOfRange(_)
            | crate::scheduler::SchedulerError::EmptyPlan
            | crate::scheduler::SchedulerError::AlreadyRunning => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<crate::plan::PlanBuildError> for ApiError {
    fn from(e: crate::plan::PlanBuildError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        }
    }
}

impl From<crate::waterlevel::WaterLevelError> for ApiError {
    fn from(e: crate::waterlevel::WaterLevelError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}
