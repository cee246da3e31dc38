use std::sync::Arc;

use admission::{AdmissionError, AdmissionOutcome};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{AdmissionRequest, AdmissionResponse},
};
use tracing::{error, info_span, Instrument};
use uuid::Uuid;

use crate::app_state::AppState;

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/calls/join", post(join_call))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn join_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AdmissionRequest>, JsonRejection>,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let Json(req) = payload.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, rejection.body_text())),
        )
    })?;
    let span = info_span!(
        "admission",
        request_id = %Uuid::new_v4(),
        requester = %req.requester,
        mode = %req.mode,
    );
    let outcome = state
        .engine
        .request_admission(req)
        .instrument(span)
        .await
        .map_err(error_response)?;

    Ok(match outcome {
        AdmissionOutcome::Admitted(grant) => {
            (StatusCode::OK, Json(AdmissionResponse::Admitted(grant))).into_response()
        }
        AdmissionOutcome::Rejected(reason) => (
            StatusCode::CONFLICT,
            Json(AdmissionResponse::Rejected { reason }),
        )
            .into_response(),
    })
}

fn error_response(err: AdmissionError) -> (StatusCode, Json<ApiError>) {
    match err {
        AdmissionError::InvalidRequest(message) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, message)),
        ),
        AdmissionError::Collaborator { stage, source } => {
            error!(%stage, error = %format!("{source:#}"), "call backend failure");
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiError::new(
                    ErrorCode::Upstream,
                    format!("call backend failed while {stage}"),
                )),
            )
        }
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
