//! HTTP/WebSocket surface over the application services.

pub mod capability_routes;
pub mod console_ws;
pub mod cosim_routes;
pub mod error;
pub mod program_routes;
pub mod session_routes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Firmware images can be sizeable; everything else stays on the default.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/capabilities", get(capability_routes::list_capabilities))
        // Sessions
        .route(
            "/api/sessions",
            post(session_routes::create_session).get(session_routes::list_sessions),
        )
        .route(
            "/api/sessions/{id}",
            get(session_routes::get_session).delete(session_routes::delete_session),
        )
        .route("/api/sessions/{id}/power/on", post(session_routes::power_on))
        .route("/api/sessions/{id}/power/off", post(session_routes::power_off))
        .route("/api/sessions/{id}/reset", post(session_routes::reset_session))
        .route("/api/sessions/{id}/pause", post(session_routes::pause_session))
        .route("/api/sessions/{id}/resume", post(session_routes::resume_session))
        .route("/api/sessions/{id}/program", post(session_routes::load_program))
        .route(
            "/api/sessions/{id}/snapshots",
            post(session_routes::create_snapshot).get(session_routes::list_snapshots),
        )
        .route(
            "/api/sessions/{id}/snapshots/{snapshot_id}/restore",
            post(session_routes::restore_snapshot),
        )
        .route(
            "/api/sessions/{id}/coverage/start",
            post(session_routes::start_coverage),
        )
        .route(
            "/api/sessions/{id}/coverage/stop",
            post(session_routes::stop_coverage),
        )
        .route("/api/sessions/{id}/console", get(console_ws::console_ws))
        // Programs
        .route(
            "/api/programs",
            post(program_routes::upload_program).get(program_routes::list_programs),
        )
        .route(
            "/api/programs/{id}",
            get(program_routes::get_program).delete(program_routes::delete_program),
        )
        // Co-simulation
        .route("/api/cosim", post(cosim_routes::create_cosim))
        .route(
            "/api/cosim/{id}",
            get(cosim_routes::get_cosim).delete(cosim_routes::delete_cosim),
        )
        .route("/api/cosim/{id}/start", post(cosim_routes::start_cosim))
        .route("/api/cosim/{id}/stop", post(cosim_routes::stop_cosim))
        .route("/api/cosim/{id}/sync/step", post(cosim_routes::sync_step))
        .route("/api/cosim/{id}/sync/time", post(cosim_routes::sync_time))
        .route("/api/cosim/{id}/events", post(cosim_routes::inject_event))
        // Firmware uploads need room; everything else is small JSON.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
