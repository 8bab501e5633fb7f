// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

//! # Data Store Probe
//!
//! The health endpoint only needs one thing from the data store: "count the
//! rows of this collection without returning any". Everything that can go
//! wrong while asking is folded into [`ProbeError`].

pub mod supabase;

use std::time::Duration;

use async_trait::async_trait;

pub use supabase::SupabaseProbe;

/// Failure while probing the data store.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Connection, TLS or request-level failure.
    #[error("request to data store failed: {0}")]
    Transport(String),

    /// The store answered with a non-success status.
    #[error("data store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The store answered but the count could not be read.
    #[error("malformed response from data store: {0}")]
    MalformedResponse(String),

    /// No answer within the probe deadline.
    #[error("data store did not respond within {}s", .0.as_secs_f32())]
    Timeout(Duration),
}

/// Minimal read capability required from the data store.
#[async_trait]
pub trait DataProbe: Send + Sync {
    /// Row count of `collection`, with zero rows materialised.
    async fn count_rows(&self, collection: &str) -> Result<u64, ProbeError>;
}

/// Run `count_rows` with an upper bound on how long it may take.
pub async fn count_rows_within(
    probe: &dyn DataProbe,
    collection: &str,
    limit: Duration,
) -> Result<u64, ProbeError> {
    match tokio::time::timeout(limit, probe.count_rows(collection)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(limit)),
    }
}
