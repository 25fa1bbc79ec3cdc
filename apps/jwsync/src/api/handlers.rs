//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Uploads arrive as `multipart/form-data`. The merge itself is CPU and
//! disk bound, so it runs on the blocking pool.

use super::{
    AppState,
    types::{ErrorResponse, HealthResponse},
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use jwsync_core::{ErrorKind, SyncError, inspect, merge, schema::jw_library::catalog};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// A failed request: status and JSON body.
pub type Rejection = (StatusCode, Json<ErrorResponse>);

/// Part names accepted for the primary backup.
const PRIMARY_PARTS: &[&str] = &["primary", "dest_file"];

/// Part names accepted for the secondary backup.
const SECONDARY_PARTS: &[&str] = &["secondary", "source_file"];

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for a merge failure.
///
/// Bad inputs are the caller's fault (400). Inputs that are individually
/// valid but cannot be merged without breaking integrity get 422. Host
/// failures get 500.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::CorruptArchive | ErrorKind::UnsupportedSchema | ErrorKind::MissingTable => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::UnresolvedReference
        | ErrorKind::IdentityAmbiguity
        | ErrorKind::CyclicSchema
        | ErrorKind::KeySpaceExhausted => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidConfig | ErrorKind::Database | ErrorKind::Io => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn reject(error: &SyncError) -> Rejection {
    (
        status_for(error.kind()),
        Json(ErrorResponse::from_error(error)),
    )
}

// =============================================================================
// MULTIPART
// =============================================================================

/// Read every named part of the body. The first part with a given name wins.
async fn collect_parts(mut multipart: Multipart) -> Result<BTreeMap<String, Vec<u8>>, Rejection> {
    let mut parts = BTreeMap::new();

    loop {
        let field = multipart.next_field().await.map_err(|e| {
            (
                e.status(),
                Json(ErrorResponse::invalid_request(format!(
                    "Malformed upload: {}",
                    e.body_text()
                ))),
            )
        })?;
        let Some(field) = field else { break };

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| {
            (
                e.status(),
                Json(ErrorResponse::invalid_request(format!(
                    "Cannot read part '{}': {}",
                    name,
                    e.body_text()
                ))),
            )
        })?;

        parts.entry(name).or_insert_with(|| bytes.to_vec());
    }

    Ok(parts)
}

/// Remove the first part found under any of `names`.
fn take_part(parts: &mut BTreeMap<String, Vec<u8>>, names: &[&str]) -> Result<Vec<u8>, Rejection> {
    names
        .iter()
        .find_map(|name| parts.remove(*name))
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::invalid_request(format!(
                    "Missing upload part '{}'",
                    names.join("' or '")
                ))),
            )
        })
}

fn join_failed(e: &tokio::task::JoinError) -> Rejection {
    tracing::error!(error = %e, "blocking task failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::internal("Merge task failed")),
    )
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// MERGE HANDLER
// =============================================================================

/// Merge the uploaded `primary` and `secondary` backups.
///
/// Responds with the merged container as an attachment.
pub async fn merge_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, Rejection> {
    let mut parts = collect_parts(multipart).await?;
    let primary = take_part(&mut parts, PRIMARY_PARTS)?;
    let secondary = take_part(&mut parts, SECONDARY_PARTS)?;

    let options = state.config.merge;
    let completed_at = OffsetDateTime::now_utc();

    tracing::info!(
        primary_bytes = primary.len(),
        secondary_bytes = secondary.len(),
        "merge requested"
    );

    let outcome = tokio::task::spawn_blocking(move || {
        merge(&primary, &secondary, options, completed_at)
    })
    .await
    .map_err(|e| join_failed(&e))?
    .map_err(|e| reject(&e))?;

    let disposition = format!("attachment; filename=\"{}\"", outcome.file_name);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        outcome.container,
    )
        .into_response())
}

// =============================================================================
// INSPECT HANDLER
// =============================================================================

/// Summarise the uploaded `file` backup.
pub async fn inspect_handler(multipart: Multipart) -> Result<Response, Rejection> {
    let mut parts = collect_parts(multipart).await?;
    let container = take_part(&mut parts, &["file"])?;

    let inspection = tokio::task::spawn_blocking(move || inspect(&container, &catalog()))
        .await
        .map_err(|e| join_failed(&e))?
        .map_err(|e| reject(&e))?;

    Ok((StatusCode::OK, Json(inspection)).into_response())
}

// =============================================================================
// TESTS
// =============================================================================
