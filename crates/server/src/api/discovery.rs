//! Library discovery and path validation handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use subfetch_core::{
    discovery::{self, DiscoveryError, LibraryInfo, ValidationReport},
    Classify, ErrorKind,
};
use tracing::error;

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LibrariesResponse {
    pub libraries: Vec<LibraryInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidatePathsBody {
    /// Plex-side paths. Empty means "use the configured test file".
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidatePathsResponse {
    #[serde(flatten)]
    pub report: ValidationReport,
    pub path_mappings: BTreeMap<String, String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: DiscoveryError) -> ApiError {
    let status = match e.kind() {
        ErrorKind::Configuration => StatusCode::BAD_REQUEST,
        ErrorKind::MediaServer | ErrorKind::NotFound => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!(error = %e, "Discovery request failed");
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// List Plex libraries with their locations as seen locally.
pub async fn list_libraries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LibrariesResponse>, ApiError> {
    let libraries = discovery::list_libraries(state.media_server())
        .await
        .map_err(api_error)?;
    Ok(Json(LibrariesResponse { libraries }))
}

/// Check that Plex paths are reachable through the configured mappings.
pub async fn validate_paths(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ValidatePathsBody>,
) -> Result<Json<ValidatePathsResponse>, ApiError> {
    let report = discovery::validate_paths(
        state.media_server(),
        state.pool(),
        &body.paths,
        state.config().discovery.test_file.as_deref(),
    )
    .await
    .map_err(api_error)?;

    Ok(Json(ValidatePathsResponse {
        report,
        path_mappings: state.config().plex.path_mappings.clone(),
    }))
}
