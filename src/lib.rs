// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

//! Timeless API - Service Shell
//!
//! Resolves process settings from the environment and tier override files,
//! and serves an unauthenticated health endpoint that reports data store
//! reachability without ever failing itself.
//!
//! ## Modules
//!
//! - `config` - Settings resolution and the process-wide handle
//! - `probe` - Data store reachability probe (Supabase PostgREST)
//! - `api` - HTTP API handlers (Axum)
//! - `server` - Serving and graceful shutdown

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod server;
pub mod state;
