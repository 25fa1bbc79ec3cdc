//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use jwsync_core::{MergeOutcome, MergeReport, SyncError};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Stable snake_case discriminant: an error kind of the merge engine,
    /// or `invalid_request` / `internal` for transport failures.
    pub kind: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn from_error(error: &SyncError) -> Self {
        Self {
            success: false,
            kind: error.kind().as_str().to_string(),
            message: error.to_string(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: "invalid_request".to_string(),
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: "internal".to_string(),
            message: msg.into(),
        }
    }
}

// =============================================================================
// MERGE SUMMARY
// =============================================================================

/// What a finished merge produced, minus the container bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSummary {
    pub success: bool,
    pub file_name: String,
    pub name: String,
    pub hash: String,
    pub schema_version: u32,
    pub size: u64,
    pub report: MergeReport,
}

impl MergeSummary {
    pub fn from_outcome(outcome: &MergeOutcome) -> Self {
        let backup = &outcome.manifest.user_data_backup;
        Self {
            success: true,
            file_name: outcome.file_name.clone(),
            name: outcome.manifest.name.clone(),
            hash: backup.hash.clone(),
            schema_version: backup.schema_version,
            size: outcome.container.len() as u64,
            report: outcome.report.clone(),
        }
    }
}
