// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

//! # Runtime Configuration
//!
//! Settings are resolved once per process from the environment plus
//! tier-specific override files, validated, and then shared read-only.
//!
//! ## Override Files
//!
//! | `ENVIRONMENT` | Tier file |
//! |---------------|-----------|
//! | `production` | `.env.production` |
//! | `staging` | `.env.staging` |
//! | `test` | `.env.test` |
//! | `development` (default) | `.env.local` |
//! | anything else | `.env` |
//!
//! The tier file overrides the process environment; `.env` only fills gaps.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SUPABASE_URL` | Supabase project URL | Required |
//! | `SUPABASE_ANON_KEY` | Public anon key | Required |
//! | `SUPABASE_SERVICE_ROLE_KEY` | Service-role key (health probe) | Required |
//! | `SUPABASE_JWT_SECRET` | Supabase token signing secret | Required |
//! | `JWT_SECRET_KEY` | API token signing secret | Required |
//! | `JWT_ALGORITHM` | Token signing algorithm | `HS256` |
//! | `DEBUG` | `true` enables debug behaviour | `false` |
//! | `API_VERSION` | Version path segment | `v1` |
//! | `CORS_ORIGINS` | Comma-separated allowed origins | `http://localhost:5173,http://localhost:3000` |
//! | `HOST` / `PORT` | Server bind address | `0.0.0.0` / `8000` |
//! | `REQUEST_TIMEOUT_SECONDS` | Per-request timeout | `30` |
//! | `HEALTH_PROBE_TABLE` | Table counted by the health probe | `family_units` |
//! | `HEALTH_PROBE_TIMEOUT_SECONDS` | Upper bound on the health probe | `5` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=info` |
//!
//! The full field list lives on [`Settings`].

pub mod env_files;
pub mod error;
pub mod settings;

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

pub use env_files::{
    resolve_env, selector_from, tier_file_name, EnvLayer, ResolvedEnv, DEFAULT_ENVIRONMENT,
    DEFAULT_ENV_FILE, ENVIRONMENT_ENV,
};
pub use error::{ConfigError, FieldIssue};
pub use settings::{SecretString, Settings};

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=info";

/// One-time initialisation guard around a shared [`Settings`].
///
/// Concurrent first callers block until a single loader run finishes and
/// then all observe the same `Arc`. A failed load leaves the cell empty.
pub struct SettingsCell {
    cell: OnceCell<Arc<Settings>>,
}

impl SettingsCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Return the stored settings, running `load` if none are stored yet.
    pub fn get_or_try_init<F>(&self, load: F) -> Result<Arc<Settings>, ConfigError>
    where
        F: FnOnce() -> Result<Settings, ConfigError>,
    {
        self.cell.get_or_try_init(|| load().map(Arc::new)).cloned()
    }

    pub fn get(&self) -> Option<Arc<Settings>> {
        self.cell.get().cloned()
    }
}

impl Default for SettingsCell {
    fn default() -> Self {
        Self::new()
    }
}

static SETTINGS: SettingsCell = SettingsCell::new();

/// Process-wide settings, resolved from the working directory on first call.
///
/// Later calls return the same instance; changed variables or files are
/// only picked up by a new process.
pub fn get_settings() -> Result<Arc<Settings>, ConfigError> {
    SETTINGS.get_or_try_init(|| load_settings(Path::new("."), EnvLayer::from_process()))
}

/// Resolve override files in `dir` on top of `process_env` and build settings.
pub fn load_settings(dir: &Path, process_env: EnvLayer) -> Result<Settings, ConfigError> {
    let selector = selector_from(&process_env);
    let resolved = resolve_env(&selector, dir, process_env)?;

    for file in &resolved.loaded_files {
        debug!(path = %file.display(), "Loaded env file");
    }

    let settings = Settings::from_env(&resolved.layer)?;
    info!(
        selector = %resolved.selector,
        environment = %settings.environment,
        api_version = %settings.api_version,
        debug = settings.is_debug(),
        env_files = resolved.loaded_files.len(),
        "Settings resolved"
    );
    Ok(settings)
}
