//! Co-simulation group management and synchronization schemes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use simbench_domain::CosimSessionId;
use simbench_shared::{
    CosimInfo, CreateCosimRequest, InjectEventRequest, SyncStepRequest, SyncTimeRequest,
};

use crate::infrastructure::http::error::ApiError;
use crate::state::AppState;

pub async fn create_cosim(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCosimRequest>,
) -> Result<(StatusCode, Json<CosimInfo>), ApiError> {
    let group = state.cosim.create(request.members).await?;
    Ok((StatusCode::CREATED, Json(CosimInfo::from(&group))))
}

pub async fn get_cosim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CosimInfo>, ApiError> {
    let group = state.cosim.get(CosimSessionId::from_uuid(id)).await?;
    Ok(Json(CosimInfo::from(&group)))
}

pub async fn delete_cosim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.cosim.delete(CosimSessionId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_cosim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CosimInfo>, ApiError> {
    let group = state.cosim.start(CosimSessionId::from_uuid(id)).await?;
    Ok(Json(CosimInfo::from(&group)))
}

pub async fn stop_cosim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CosimInfo>, ApiError> {
    let group = state.cosim.stop(CosimSessionId::from_uuid(id)).await?;
    Ok(Json(CosimInfo::from(&group)))
}

pub async fn sync_step(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SyncStepRequest>,
) -> Result<Json<CosimInfo>, ApiError> {
    let group = state
        .cosim
        .sync_step(CosimSessionId::from_uuid(id), request.steps)
        .await?;
    Ok(Json(CosimInfo::from(&group)))
}

pub async fn sync_time(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SyncTimeRequest>,
) -> Result<Json<CosimInfo>, ApiError> {
    let group = state
        .cosim
        .sync_time(CosimSessionId::from_uuid(id), request.duration_ns)
        .await?;
    Ok(Json(CosimInfo::from(&group)))
}

pub async fn inject_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<InjectEventRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .cosim
        .inject_event(
            CosimSessionId::from_uuid(id),
            request.member_id,
            &request.event,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
