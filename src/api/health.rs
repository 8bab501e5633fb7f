// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::config::Settings;
use crate::probe::{count_rows_within, DataProbe, ProbeError};
use crate::state::AppState;

/// Value of `status` in every health body; the handler itself never fails.
pub const HEALTHY: &str = "healthy";

/// Reachability of the data store as seen by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    /// Always "healthy" while the process can answer.
    pub status: String,
    /// API version string.
    pub version: String,
    /// Deployment environment name.
    pub environment: String,
    /// Data store reachability. Omitted when no probe is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseStatus>,
    /// Probe failure description. Present only when disconnected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,
}

impl HealthStatus {
    pub fn for_settings(settings: &Settings) -> Self {
        Self {
            status: HEALTHY.to_string(),
            version: settings.api_version.clone(),
            environment: settings.environment.clone(),
            database: None,
            database_error: None,
        }
    }

    /// Record a probe outcome. Failures become data, never errors.
    pub fn with_probe_result(mut self, result: Result<u64, ProbeError>) -> Self {
        match result {
            Ok(_) => {
                self.database = Some(DatabaseStatus::Connected);
                self.database_error = None;
            }
            Err(e) => {
                self.database = Some(DatabaseStatus::Disconnected);
                self.database_error = Some(e.to_string());
            }
        }
        self
    }
}

/// Build the health body, probing the data store if a probe is available.
pub async fn check_health(settings: &Settings, probe: Option<&dyn DataProbe>) -> HealthStatus {
    let status = HealthStatus::for_settings(settings);
    let Some(probe) = probe else {
        return status;
    };

    let result = count_rows_within(
        probe,
        &settings.health_probe_table,
        settings.health_probe_timeout(),
    )
    .await;

    match &result {
        Ok(count) => debug!(table = %settings.health_probe_table, count, "Data store reachable"),
        Err(e) => warn!(table = %settings.health_probe_table, error = %e, "Data store probe failed"),
    }

    status.with_probe_result(result)
}

/// Health check endpoint handler.
///
/// Always returns 200. Data store problems are reported in the
/// `database` and `database_error` fields so monitors can still reach the
/// endpoint during an outage.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive; database field reports data store reachability", body = HealthStatus)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(check_health(&state.settings, state.probe.as_deref()).await)
}
