// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

//! Environment-tier override files.
//!
//! Resolution never touches the process environment. The process variables
//! are captured once into an [`EnvLayer`], the tier file and the generic
//! `.env` are merged on top of that snapshot, and the result is handed to
//! [`Settings::from_env`](super::Settings::from_env).
//!
//! ## Precedence (highest first)
//!
//! 1. Tier file selected by `ENVIRONMENT` (overrides the process environment)
//! 2. Process environment
//! 3. Generic `.env` (only fills keys nobody else set)

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::ConfigError;

/// Variable selecting the environment tier.
pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";

/// Tier used when `ENVIRONMENT` is not set.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Generic fallback file, lowest precedence.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Map a tier selector to its override file name.
///
/// Matching is exact; unknown selectors fall back to the generic `.env`.
pub fn tier_file_name(selector: &str) -> &'static str {
    match selector {
        "production" => ".env.production",
        "staging" => ".env.staging",
        "test" => ".env.test",
        "development" => ".env.local",
        _ => DEFAULT_ENV_FILE,
    }
}

/// Ordered key/value set with case-insensitive lookup.
///
/// Keys keep the spelling of the first source that defined them; later
/// overrides replace the value in place so iteration order stays stable.
#[derive(Clone, Default)]
pub struct EnvLayer {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl EnvLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        Self::from_pairs(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut layer = Self::new();
        for (key, value) in pairs {
            layer.set(key, value);
        }
        layer
    }

    /// Insert or override a key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key.to_ascii_lowercase()) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index
                    .insert(key.to_ascii_lowercase(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Insert a key only if no source has set it yet. Returns whether it was applied.
    pub fn fill(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.set(key, value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(&key.to_ascii_lowercase())
            .map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(&key.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// Values are secrets more often than not; only key names are printed.
impl fmt::Debug for EnvLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.entries.iter().map(|(k, _)| k))
            .finish()
    }
}

/// Result of merging the override files onto a process snapshot.
#[derive(Debug)]
pub struct ResolvedEnv {
    /// Tier selector that drove file selection.
    pub selector: String,
    /// Files that existed and were merged, in merge order.
    pub loaded_files: Vec<PathBuf>,
    /// Merged key/value set.
    pub layer: EnvLayer,
}

/// Read the tier selector from a snapshot, defaulting to `development`.
///
/// Trimmed the same way as [`Settings::environment`](super::Settings) so the
/// selected tier and the reported environment agree.
pub fn selector_from(env: &EnvLayer) -> String {
    env.get(ENVIRONMENT_ENV)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ENVIRONMENT)
        .to_string()
}

/// Merge the tier file and the generic `.env` found in `dir` onto `process_env`.
///
/// Missing files are skipped. A file that exists but cannot be read is a
/// configuration error.
pub fn resolve_env(
    selector: &str,
    dir: &Path,
    process_env: EnvLayer,
) -> Result<ResolvedEnv, ConfigError> {
    let mut layer = process_env;
    let mut loaded_files = Vec::new();

    let tier_name = tier_file_name(selector);
    let tier_path = dir.join(tier_name);
    if let Some(pairs) = read_env_file(&tier_path)? {
        for (key, value) in pairs {
            layer.set(key, value);
        }
        loaded_files.push(tier_path);
    }

    // Unknown selectors already merged `.env` as the tier file above.
    if tier_name != DEFAULT_ENV_FILE {
        let default_path = dir.join(DEFAULT_ENV_FILE);
        if let Some(pairs) = read_env_file(&default_path)? {
            for (key, value) in pairs {
                layer.fill(key, value);
            }
            loaded_files.push(default_path);
        }
    }

    Ok(ResolvedEnv {
        selector: selector.to_string(),
        loaded_files,
        layer,
    })
}

/// Parse a dotenv file without exporting anything. `Ok(None)` when absent.
///
/// Lines dotenvy rejects (typically unquoted values containing spaces, such
/// as `CORS_ORIGINS=http://a, http://b`) are re-read leniently: the value is
/// the trimmed text after the first `=`. Lines without a usable key are
/// skipped with a warning. Only an unreadable file is an error.
fn read_env_file(path: &Path) -> Result<Option<Vec<(String, String)>>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;

    // Whole-file parse keeps multi-line quoted values intact.
    let strict: Result<Vec<_>, _> = dotenvy::from_read_iter(contents.as_bytes()).collect();
    if let Ok(pairs) = strict {
        return Ok(Some(pairs));
    }

    let mut pairs = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        match dotenvy::from_read_iter(line.as_bytes()).collect::<Result<Vec<_>, _>>() {
            Ok(parsed) => pairs.extend(parsed),
            Err(e) => match parse_lenient_line(line) {
                Some(pair) => {
                    debug!(
                        path = %path.display(),
                        line = number + 1,
                        key = %pair.0,
                        "Read env line leniently"
                    );
                    pairs.push(pair);
                }
                None => warn!(
                    path = %path.display(),
                    line = number + 1,
                    error = %e,
                    "Skipping unparsable env file line"
                ),
            },
        }
    }
    Ok(Some(pairs))
}

/// `KEY=rest of line` with an optional `export ` prefix and trailing ` #` comment.
fn parse_lenient_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;

    let key = key.trim();
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid_key {
        return None;
    }

    let value = match value.find(" #") {
        Some(idx) => &value[..idx],
        None => value,
    };
    Some((key.to_string(), value.trim().to_string()))
}
