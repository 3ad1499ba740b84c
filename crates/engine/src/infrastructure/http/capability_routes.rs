//! Backend capability enumeration.

use std::sync::Arc;

use axum::{extract::State, Json};

use simbench_domain::CapabilityDescriptor;

use crate::state::AppState;

pub async fn list_capabilities(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<CapabilityDescriptor>> {
    Json(state.backends.descriptors())
}
