// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

//! Supabase (PostgREST) implementation of [`DataProbe`].
//!
//! Issues `GET /rest/v1/{collection}?select=id&limit=0` with
//! `Prefer: count=exact` using the service-role key, and reads the total
//! from the `Content-Range` header. No rows are transferred.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;
use url::Url;

use super::{DataProbe, ProbeError};
use crate::config::{SecretString, Settings};

/// Longest error body echoed back into [`ProbeError::Status`].
const MAX_ERROR_BODY_LEN: usize = 200;

#[derive(Clone)]
pub struct SupabaseProbe {
    rest_base: String,
    service_role_key: SecretString,
    http: Client,
}

impl SupabaseProbe {
    /// Create a probe against `project_url` authenticated with the service-role key.
    pub fn new(
        project_url: &Url,
        service_role_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            rest_base: format!("{}/rest/v1", project_url.as_str().trim_end_matches('/')),
            service_role_key,
            http,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ProbeError> {
        Self::new(
            &settings.supabase_url,
            settings.supabase_service_role_key.clone(),
            settings.health_probe_timeout(),
        )
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.rest_base, collection)
    }
}

#[async_trait]
impl DataProbe for SupabaseProbe {
    async fn count_rows(&self, collection: &str) -> Result<u64, ProbeError> {
        let key = self.service_role_key.expose();
        let response = self
            .http
            .get(self.collection_url(collection))
            .query(&[("select", "id"), ("limit", "0")])
            .header("apikey", key)
            .header(header::AUTHORIZATION, format!("Bearer {key}"))
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProbeError::Status {
                status: status.as_u16(),
                body: truncate(body.trim(), MAX_ERROR_BODY_LEN),
            });
        }

        let content_range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .ok_or_else(|| ProbeError::MalformedResponse("missing Content-Range header".into()))?
            .to_str()
            .map_err(|_| ProbeError::MalformedResponse("non-ASCII Content-Range header".into()))?;

        let count = parse_content_range_total(content_range)?;
        debug!(collection, count, "Data store probe succeeded");
        Ok(count)
    }
}

/// Total from a PostgREST `Content-Range` value such as `*/42` or `0-9/42`.
fn parse_content_range_total(value: &str) -> Result<u64, ProbeError> {
    value
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
        .ok_or_else(|| {
            ProbeError::MalformedResponse(format!("unexpected Content-Range value {value:?}"))
        })
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
