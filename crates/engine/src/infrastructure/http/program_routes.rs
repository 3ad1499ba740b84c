//! Program upload and management.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use simbench_domain::ProgramId;
use simbench_shared::{ProgramInfo, UploadProgramQuery};

use crate::infrastructure::http::error::ApiError;
use crate::state::AppState;

pub async fn upload_program(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadProgramQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<ProgramInfo>), ApiError> {
    let program = state
        .programs
        .upload(query.name, query.format, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(ProgramInfo::from(&program))))
}

pub async fn list_programs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProgramInfo>>, ApiError> {
    let programs = state.programs.list().await?;
    Ok(Json(programs.iter().map(ProgramInfo::from).collect()))
}

pub async fn get_program(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProgramInfo>, ApiError> {
    let program = state.programs.get(ProgramId::from_uuid(id)).await?;
    Ok(Json(ProgramInfo::from(&program)))
}

pub async fn delete_program(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.programs.delete(ProgramId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
