use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use relist_core::models::{ConfirmOutcome, DecisionKind, WizardSession};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CustomerClaims;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/wizard/sessions", post(start_session))
        .route("/v1/wizard/sessions/{id}", get(get_session))
        .route("/v1/wizard/sessions/{id}/decisions", post(record_decision))
        .route("/v1/wizard/sessions/{id}/confirm", post(confirm_session))
        .route("/v1/wizard/sessions/{id}/cancel", post(cancel_session))
}

#[derive(Debug, Deserialize)]
struct StartSessionRequest {
    list_id: Uuid,
}

async fn start_session(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<WizardSession>), AppError> {
    let session = state.orchestrator.start(req.list_id, &claims.sub).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardSession>, AppError> {
    let session = state.orchestrator.get(id, &claims.sub).await?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    item_id: Uuid,
    kind: DecisionKind,
    candidate_id: Option<Uuid>,
}

async fn record_decision(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<WizardSession>, AppError> {
    let session = state
        .orchestrator
        .decide(id, &claims.sub, req.item_id, req.kind, req.candidate_id)
        .await?;
    Ok(Json(session))
}

async fn confirm_session(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ConfirmOutcome>, AppError> {
    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|h| h.to_str().ok());
    let outcome = state
        .confirmation
        .confirm(id, &claims.sub, idempotency_key)
        .await?;
    Ok(Json(outcome))
}

async fn cancel_session(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardSession>, AppError> {
    let session = state.orchestrator.cancel(id, &claims.sub).await?;
    Ok(Json(session))
}
