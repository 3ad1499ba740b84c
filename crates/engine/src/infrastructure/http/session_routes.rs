//! Session CRUD, power control, program load, snapshots, and coverage.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use simbench_domain::{SessionId, SnapshotId};
use simbench_shared::{
    CreateSessionRequest, CreateSnapshotRequest, LoadProgramRequest, PageQuery, SessionInfo,
    SessionListResponse, SnapshotInfo,
};

use crate::application::services::CreateSession;
use crate::infrastructure::http::error::ApiError;
use crate::state::AppState;

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionInfo>), ApiError> {
    let session = state
        .sessions
        .create(
            CreateSession {
                name: request.name,
                backend: request.backend,
                board: request.board,
                owner: request.owner,
            },
            CancellationToken::new(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(SessionInfo::from(&session))))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let (sessions, total) = state.sessions.list(page.page, page.page_size).await?;
    Ok(Json(SessionListResponse {
        sessions: sessions.iter().map(SessionInfo::from).collect(),
        total,
        page: page.page,
        page_size: page.page_size,
    }))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = state.sessions.get(SessionId::from_uuid(id)).await?;
    Ok(Json(SessionInfo::from(&session)))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.delete(SessionId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn power_on(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = state.sessions.power_on(SessionId::from_uuid(id)).await?;
    Ok(Json(SessionInfo::from(&session)))
}

pub async fn power_off(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = state.sessions.power_off(SessionId::from_uuid(id)).await?;
    Ok(Json(SessionInfo::from(&session)))
}

pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.reset(SessionId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pause_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = state.sessions.pause(SessionId::from_uuid(id)).await?;
    Ok(Json(SessionInfo::from(&session)))
}

pub async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = state.sessions.resume(SessionId::from_uuid(id)).await?;
    Ok(Json(SessionInfo::from(&session)))
}

pub async fn load_program(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<LoadProgramRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .load_program(
            SessionId::from_uuid(id),
            request.program_id,
            CancellationToken::new(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateSnapshotRequest>,
) -> Result<(StatusCode, Json<SnapshotInfo>), ApiError> {
    let snapshot = state
        .sessions
        .create_snapshot(SessionId::from_uuid(id), request.name, request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(SnapshotInfo::from(&snapshot))))
}

pub async fn list_snapshots(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SnapshotInfo>>, ApiError> {
    let snapshots = state
        .sessions
        .list_snapshots(SessionId::from_uuid(id))
        .await?;
    Ok(Json(snapshots.iter().map(SnapshotInfo::from).collect()))
}

pub async fn restore_snapshot(
    State(state): State<Arc<AppState>>,
    Path((id, snapshot_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .restore_snapshot(SessionId::from_uuid(id), SnapshotId::from_uuid(snapshot_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStarted {
    trace_path: String,
}

pub async fn start_coverage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CoverageStarted>, ApiError> {
    let path = state
        .sessions
        .start_coverage(SessionId::from_uuid(id))
        .await?;
    Ok(Json(CoverageStarted {
        trace_path: path.display().to_string(),
    }))
}

pub async fn stop_coverage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .stop_coverage(SessionId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
