//! Defines the Axum API routes and handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{error, info};

use crate::camera::CameraSource;
use crate::messages::MotionRequest;
use crate::motor::{MotionError, MotionErrorKind, MotionReport, Sequencer};
use crate::web::models::{DriveRequest, StatusResponse};

/// Shared state handed to every handler
pub struct AppStateInner {
    pub sequencer: Sequencer,
    /// Backend for `/camera`
    pub camera: CameraSource,
    /// Backend for `/camera2`
    pub snapshot: CameraSource,
}

pub type AppState = Arc<AppStateInner>;

/// Creates the Axum router with all the API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/forward/{distance_cm}", post(forward))
        .route("/backward/{distance_cm}", post(backward))
        .route("/left/{degrees}", post(left))
        .route("/right/{degrees}", post(right))
        .route("/stop", post(stop))
        .route("/drive", post(drive))
        .route("/camera", get(camera))
        .route("/camera2", get(camera2))
        .with_state(state)
}

type MotionResponse = (StatusCode, Json<StatusResponse>);

fn status_for(kind: MotionErrorKind) -> StatusCode {
    match kind {
        MotionErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        MotionErrorKind::TransportUnavailable
        | MotionErrorKind::StartFailed
        | MotionErrorKind::StopFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_response(outcome: Result<MotionReport, MotionError>) -> MotionResponse {
    match outcome {
        Ok(report) => (StatusCode::OK, Json(StatusResponse::ok(report.description))),
        Err(e) => (status_for(e.kind()), Json(StatusResponse::error(e.to_string()))),
    }
}

async fn run(state: &AppState, request: MotionRequest) -> MotionResponse {
    into_response(state.sequencer.execute(request).await)
}

/// Simple ping to check the server is up.
async fn index() -> &'static str {
    "Rover serial bridge ready!"
}

/// Malformed path or body, answered in the same shape as other failures
fn bad_request(route: &str, detail: String) -> MotionResponse {
    info!("Rejected {}: {}", route, detail);
    (
        StatusCode::BAD_REQUEST,
        Json(StatusResponse::error(format!("Invalid request: {}", detail))),
    )
}

type PathValue = Result<Path<i64>, PathRejection>;

async fn forward(State(state): State<AppState>, distance_cm: PathValue) -> MotionResponse {
    let Path(distance_cm) = match distance_cm {
        Ok(path) => path,
        Err(e) => return bad_request("/forward", e.body_text()),
    };
    info!("Received request: /forward/{} cm", distance_cm);
    run(&state, MotionRequest::Forward(distance_cm as f64)).await
}

async fn backward(State(state): State<AppState>, distance_cm: PathValue) -> MotionResponse {
    let Path(distance_cm) = match distance_cm {
        Ok(path) => path,
        Err(e) => return bad_request("/backward", e.body_text()),
    };
    info!("Received request: /backward/{} cm", distance_cm);
    run(&state, MotionRequest::Backward(distance_cm as f64)).await
}

async fn left(State(state): State<AppState>, degrees: PathValue) -> MotionResponse {
    let Path(degrees) = match degrees {
        Ok(path) => path,
        Err(e) => return bad_request("/left", e.body_text()),
    };
    info!("Received request: /left/{} deg", degrees);
    run(&state, MotionRequest::TurnLeft(degrees as f64)).await
}

async fn right(State(state): State<AppState>, degrees: PathValue) -> MotionResponse {
    let Path(degrees) = match degrees {
        Ok(path) => path,
        Err(e) => return bad_request("/right", e.body_text()),
    };
    info!("Received request: /right/{} deg", degrees);
    run(&state, MotionRequest::TurnRight(degrees as f64)).await
}

async fn stop(State(state): State<AppState>) -> MotionResponse {
    info!("Received request: /stop");
    run(&state, MotionRequest::Stop).await
}

async fn drive(
    State(state): State<AppState>,
    body: Result<Json<DriveRequest>, JsonRejection>,
) -> MotionResponse {
    let Json(body) = match body {
        Ok(json) => json,
        Err(e) => return bad_request("/drive", e.body_text()),
    };
    info!("Received request: /drive L={} R={}", body.left, body.right);
    run(
        &state,
        MotionRequest::DirectDrive {
            left: body.left,
            right: body.right,
        },
    )
    .await
}

async fn capture(source: &CameraSource, route: &str) -> Response {
    info!("Received request: {}", route);
    match source.capture_base64().await {
        Ok(encoded) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            encoded,
        )
            .into_response(),
        Err(e) => {
            error!("{} failed: {}", route, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::error(format!("Camera error: {}", e))),
            )
                .into_response()
        }
    }
}

async fn camera(State(state): State<AppState>) -> Response {
    capture(&state.camera, "/camera").await
}

async fn camera2(State(state): State<AppState>) -> Response {
    capture(&state.snapshot, "/camera2").await
}
